mod engine;
mod error;
mod types;

pub use engine::{
    ContributionSchedule, age_on, compute_retirement_date, contribution_for_month,
    derive_summary, months_between, run_projection, simulate, total_invested,
};
pub use error::{EngineResult, ProjectionError};
pub use types::{DEFAULT_ANNUITY_RATE, ProjectionInput, ProjectionResult, Snapshot};
