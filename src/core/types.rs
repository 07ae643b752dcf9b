use chrono::NaiveDate;
use serde::Serialize;

pub const DEFAULT_ANNUITY_RATE: f64 = 0.06;

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionInput {
    pub birth_date: NaiveDate,
    pub current_balance: f64,
    pub monthly_contribution: f64,
    pub annuity_ratio: f64,
    pub annual_return_rate: f64,
    pub annual_increase_rate: f64,
    pub retirement_age: u32,
    pub annuity_rate: f64,
    pub inflation_rate: f64,
}

impl ProjectionInput {
    /// Input with the optional knobs at their defaults: no escalation, no
    /// inflation and a 6% annuity rate.
    pub fn new(
        birth_date: NaiveDate,
        current_balance: f64,
        monthly_contribution: f64,
        annuity_ratio: f64,
        annual_return_rate: f64,
        retirement_age: u32,
    ) -> Self {
        Self {
            birth_date,
            current_balance,
            monthly_contribution,
            annuity_ratio,
            annual_return_rate,
            annual_increase_rate: 0.0,
            retirement_age,
            annuity_rate: DEFAULT_ANNUITY_RATE,
            inflation_rate: 0.0,
        }
    }
}

/// Corpus value at the end of a simulated month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub month: u32,
    pub date: NaiveDate,
    pub corpus: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub as_of: NaiveDate,
    pub retirement_date: NaiveDate,
    pub months_to_retirement: u32,
    pub current_age: u32,
    pub years_to_retirement: u32,
    pub total_corpus: f64,
    pub annuity_corpus: f64,
    pub lump_sum: f64,
    pub monthly_pension: f64,
    pub real_monthly_pension: f64,
    pub total_invested: f64,
    pub growth: f64,
    #[serde(skip)]
    pub monthly_trajectory: Vec<Snapshot>,
    pub yearly_trajectory: Vec<Snapshot>,
}
