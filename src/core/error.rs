use chrono::NaiveDate;
use thiserror::Error;

pub type EngineResult<T> = Result<T, ProjectionError>;

/// Rejections raised by the projection engine.
///
/// Both variants are user-correctable: the caller fixes the offending value
/// and runs the projection again.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error(
        "you have already reached or passed retirement age (retirement date {retirement_date}, as of {as_of})"
    )]
    AlreadyRetired {
        retirement_date: NaiveDate,
        as_of: NaiveDate,
    },
}

impl ProjectionError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}
