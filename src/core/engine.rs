use chrono::{Datelike, Months, NaiveDate};
use tracing::debug;

use super::error::{EngineResult, ProjectionError};
use super::types::{ProjectionInput, ProjectionResult, Snapshot};

/// Monthly contribution stream. The amount escalates by the annual increase
/// rate once every 12 months, after the 12th, 24th, ... payment.
#[derive(Debug, Clone)]
pub struct ContributionSchedule {
    current: f64,
    growth: f64,
    month: u32,
}

impl ContributionSchedule {
    pub fn new(input: &ProjectionInput) -> Self {
        Self {
            current: input.monthly_contribution,
            growth: input.annual_increase_rate,
            month: 0,
        }
    }
}

impl Iterator for ContributionSchedule {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.month > 0 && self.month % 12 == 0 {
            self.current *= 1.0 + self.growth;
        }
        self.month += 1;
        Some(self.current)
    }
}

/// Contribution paid in simulated month `month` (1-based).
pub fn contribution_for_month(input: &ProjectionInput, month: u32) -> f64 {
    let index = month.saturating_sub(1) as usize;
    ContributionSchedule::new(input)
        .nth(index)
        .unwrap_or(input.monthly_contribution)
}

/// Last calendar day of the birth month in the year the subject turns
/// `retirement_age`.
pub fn compute_retirement_date(
    birth_date: NaiveDate,
    retirement_age: u32,
) -> EngineResult<NaiveDate> {
    let out_of_range = || {
        ProjectionError::invalid(
            "retirement_age",
            "retirement date falls outside the supported calendar range",
        )
    };

    let year = i32::try_from(retirement_age)
        .ok()
        .and_then(|age| birth_date.year().checked_add(age))
        .ok_or_else(out_of_range)?;
    let (next_year, next_month) = if birth_date.month() == 12 {
        (year.checked_add(1).ok_or_else(out_of_range)?, 1)
    } else {
        (year, birth_date.month() + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .ok_or_else(out_of_range)
}

/// Whole calendar months from `as_of` to `retirement_date`. Day of month is
/// ignored.
pub fn months_between(as_of: NaiveDate, retirement_date: NaiveDate) -> EngineResult<u32> {
    let months = (i64::from(retirement_date.year()) - i64::from(as_of.year())) * 12
        + i64::from(retirement_date.month())
        - i64::from(as_of.month());

    if months <= 0 {
        return Err(ProjectionError::AlreadyRetired {
            retirement_date,
            as_of,
        });
    }

    u32::try_from(months).map_err(|_| {
        ProjectionError::invalid("retirement_age", "too many months until retirement")
    })
}

/// Age in completed years on `on`.
pub fn age_on(birth_date: NaiveDate, on: NaiveDate) -> u32 {
    on.years_since(birth_date).unwrap_or(0)
}

/// Total paid in: the starting balance plus every scheduled contribution.
///
/// Without escalation the stream is constant and collapses to
/// `monthly_contribution * months`.
pub fn total_invested(input: &ProjectionInput, months: u32) -> f64 {
    if input.annual_increase_rate == 0.0 {
        return input.current_balance + input.monthly_contribution * f64::from(months);
    }

    input.current_balance
        + ContributionSchedule::new(input)
            .take(months as usize)
            .sum::<f64>()
}

pub fn run_projection(input: &ProjectionInput, as_of: NaiveDate) -> EngineResult<ProjectionResult> {
    validate_input(input, as_of)?;

    let retirement_date = compute_retirement_date(input.birth_date, input.retirement_age)?;
    let months = months_between(as_of, retirement_date)?;
    debug!(
        %as_of,
        %retirement_date,
        months,
        "running projection"
    );

    let monthly_trajectory = simulate(input, as_of, months)?;
    Ok(derive_summary(
        input,
        as_of,
        retirement_date,
        monthly_trajectory,
    ))
}

/// Month-by-month compounding. Returns one snapshot per month, in order.
pub fn simulate(
    input: &ProjectionInput,
    as_of: NaiveDate,
    months: u32,
) -> EngineResult<Vec<Snapshot>> {
    let monthly_rate = input.annual_return_rate / 12.0;
    let mut corpus = input.current_balance;
    let mut trajectory = Vec::with_capacity(months as usize);

    for (month, contribution) in (1..=months).zip(ContributionSchedule::new(input)) {
        corpus = corpus * (1.0 + monthly_rate) + contribution;
        let date = as_of.checked_add_months(Months::new(month)).ok_or_else(|| {
            ProjectionError::invalid(
                "retirement_age",
                "projection runs past the supported calendar range",
            )
        })?;
        trajectory.push(Snapshot {
            month,
            date,
            corpus,
            contribution,
        });
    }

    Ok(trajectory)
}

pub fn derive_summary(
    input: &ProjectionInput,
    as_of: NaiveDate,
    retirement_date: NaiveDate,
    monthly_trajectory: Vec<Snapshot>,
) -> ProjectionResult {
    let months_to_retirement = monthly_trajectory.len() as u32;
    let total_corpus = monthly_trajectory
        .last()
        .map_or(input.current_balance, |snapshot| snapshot.corpus);

    let annuity_corpus = total_corpus * input.annuity_ratio;
    let lump_sum = total_corpus * (1.0 - input.annuity_ratio);
    let monthly_pension = annuity_corpus * input.annuity_rate / 12.0;

    // Exponent counts whole years of age, independent of the month count.
    let current_age = age_on(input.birth_date, as_of);
    let years_to_retirement = input.retirement_age.saturating_sub(current_age);
    let real_monthly_pension =
        monthly_pension / (1.0 + input.inflation_rate).powi(years_to_retirement as i32);

    let total_invested = total_invested(input, months_to_retirement);
    let growth = total_corpus - total_invested;

    let yearly_trajectory = monthly_trajectory
        .iter()
        .filter(|s| s.month % 12 == 0 || s.month == months_to_retirement)
        .copied()
        .collect();

    ProjectionResult {
        as_of,
        retirement_date,
        months_to_retirement,
        current_age,
        years_to_retirement,
        total_corpus,
        annuity_corpus,
        lump_sum,
        monthly_pension,
        real_monthly_pension,
        total_invested,
        growth,
        monthly_trajectory,
        yearly_trajectory,
    }
}

fn validate_input(input: &ProjectionInput, as_of: NaiveDate) -> EngineResult<()> {
    for (field, value) in [
        ("current_balance", input.current_balance),
        ("monthly_contribution", input.monthly_contribution),
        ("annuity_ratio", input.annuity_ratio),
        ("annual_return_rate", input.annual_return_rate),
        ("annual_increase_rate", input.annual_increase_rate),
        ("annuity_rate", input.annuity_rate),
        ("inflation_rate", input.inflation_rate),
    ] {
        if !value.is_finite() {
            return Err(ProjectionError::invalid(field, "must be a finite number"));
        }
    }

    if input.current_balance < 0.0 {
        return Err(ProjectionError::invalid("current_balance", "must be >= 0"));
    }

    if input.monthly_contribution < 0.0 {
        return Err(ProjectionError::invalid(
            "monthly_contribution",
            "must be >= 0",
        ));
    }

    if !(0.0..=1.0).contains(&input.annuity_ratio) {
        return Err(ProjectionError::invalid(
            "annuity_ratio",
            "must be between 0 and 1",
        ));
    }

    if input.annual_return_rate <= -1.0 {
        return Err(ProjectionError::invalid(
            "annual_return_rate",
            "must be > -1",
        ));
    }

    if input.birth_date > as_of {
        return Err(ProjectionError::invalid(
            "birth_date",
            format!("must not be after {as_of}"),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_rel(actual: f64, expected: f64, tol: f64) {
        let scale = expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= tol * scale,
            "expected {expected}, got {actual}, relative tolerance {tol}"
        );
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    fn sample_input() -> ProjectionInput {
        ProjectionInput::new(date(1990, 1, 15), 100_000.0, 5_000.0, 0.40, 0.10, 60)
    }

    #[test]
    fn retirement_date_is_last_day_of_birth_month() {
        assert_eq!(
            compute_retirement_date(date(1990, 1, 15), 60).unwrap(),
            date(2050, 1, 31)
        );
        assert_eq!(
            compute_retirement_date(date(1975, 4, 30), 55).unwrap(),
            date(2030, 4, 30)
        );
    }

    #[test]
    fn retirement_date_rolls_december_into_next_year() {
        assert_eq!(
            compute_retirement_date(date(1985, 12, 5), 60).unwrap(),
            date(2045, 12, 31)
        );
    }

    #[test]
    fn retirement_date_handles_february_in_leap_and_common_years() {
        assert_eq!(
            compute_retirement_date(date(1990, 2, 28), 60).unwrap(),
            date(2050, 2, 28)
        );
        assert_eq!(
            compute_retirement_date(date(2000, 2, 29), 60).unwrap(),
            date(2060, 2, 29)
        );
        assert_eq!(
            compute_retirement_date(date(2000, 2, 29), 61).unwrap(),
            date(2061, 2, 28)
        );
    }

    #[test]
    fn months_between_ignores_day_of_month() {
        assert_eq!(months_between(date(2024, 1, 31), date(2024, 2, 1)).unwrap(), 1);
        assert_eq!(
            months_between(date(2024, 1, 15), date(2050, 1, 31)).unwrap(),
            312
        );
    }

    #[test]
    fn months_between_rejects_same_or_past_month() {
        let err = months_between(date(2024, 6, 1), date(2024, 6, 30)).unwrap_err();
        assert_eq!(
            err,
            ProjectionError::AlreadyRetired {
                retirement_date: date(2024, 6, 30),
                as_of: date(2024, 6, 1),
            }
        );
        assert!(months_between(date(2025, 1, 1), date(2024, 6, 30)).is_err());
    }

    #[test]
    fn already_retired_produces_no_trajectory() {
        let mut input = sample_input();
        input.birth_date = date(1960, 3, 10);
        let err = run_projection(&input, date(2024, 1, 15)).unwrap_err();
        assert!(matches!(err, ProjectionError::AlreadyRetired { .. }));
    }

    #[test]
    fn oracle_three_month_compounding_matches_hand_calculation() {
        // 1% a month: 100 -> 111 -> 122.11 -> 133.3311
        let input = ProjectionInput::new(date(1990, 4, 10), 100.0, 10.0, 0.5, 0.12, 34);
        let result = run_projection(&input, date(2024, 1, 15)).unwrap();

        assert_eq!(result.months_to_retirement, 3);
        let corpus: Vec<f64> = result.monthly_trajectory.iter().map(|s| s.corpus).collect();
        assert_approx(corpus[0], 111.0);
        assert_approx(corpus[1], 122.11);
        assert_approx(corpus[2], 133.3311);
        assert_approx(result.total_corpus, 133.3311);
        assert_approx(result.annuity_corpus, 66.66555);
        assert_approx(result.lump_sum, 66.66555);
        assert_approx(result.monthly_pension, 66.66555 * 0.06 / 12.0);
        assert_approx(result.total_invested, 130.0);
        assert_approx(result.growth, 3.3311);
    }

    #[test]
    fn end_to_end_scenario_matches_closed_form_reference() {
        let input = sample_input();
        let result = run_projection(&input, date(2024, 1, 15)).unwrap();

        assert_eq!(result.retirement_date, date(2050, 1, 31));
        assert_eq!(result.months_to_retirement, 312);
        assert_eq!(result.current_age, 34);
        assert_eq!(result.years_to_retirement, 26);

        let r: f64 = 0.10 / 12.0;
        let n = 312;
        let growth_factor = (1.0 + r).powi(n);
        let reference = 100_000.0 * growth_factor + 5_000.0 * (growth_factor - 1.0) / r;
        assert_rel(result.total_corpus, reference, 1e-9);

        assert_eq!(result.annuity_corpus, 0.4 * result.total_corpus);
        assert_eq!(result.monthly_pension, result.annuity_corpus * 0.06 / 12.0);
        assert_eq!(result.total_invested, 100_000.0 + 5_000.0 * 312.0);
        assert_eq!(result.real_monthly_pension, result.monthly_pension);
    }

    #[test]
    fn yearly_trajectory_keeps_year_ends_and_final_partial_year() {
        let input = sample_input();
        // 2024-03 -> 2050-01 is 310 months: 25 full years plus 10 months.
        let result = run_projection(&input, date(2024, 3, 1)).unwrap();
        assert_eq!(result.months_to_retirement, 310);
        assert_eq!(result.monthly_trajectory.len(), 310);
        assert_eq!(result.yearly_trajectory.len(), 26);
        assert_eq!(result.yearly_trajectory[0].month, 12);
        assert_eq!(result.yearly_trajectory[24].month, 300);
        assert_eq!(result.yearly_trajectory[25].month, 310);
        assert_eq!(
            result.yearly_trajectory.last().map(|s| s.corpus),
            Some(result.total_corpus)
        );
    }

    #[test]
    fn yearly_trajectory_does_not_duplicate_final_year_end() {
        let input = sample_input();
        let result = run_projection(&input, date(2024, 1, 15)).unwrap();
        assert_eq!(result.yearly_trajectory.len(), 26);
        assert_eq!(result.yearly_trajectory[25].month, 312);
    }

    #[test]
    fn snapshot_dates_advance_one_calendar_month_and_clamp_to_month_end() {
        let input = sample_input();
        let result = run_projection(&input, date(2024, 1, 31)).unwrap();
        assert_eq!(result.monthly_trajectory[0].date, date(2024, 2, 29));
        assert_eq!(result.monthly_trajectory[1].date, date(2024, 3, 31));
        assert_eq!(result.monthly_trajectory[11].date, date(2025, 1, 31));
    }

    #[test]
    fn contribution_escalates_once_per_completed_year() {
        let mut input = sample_input();
        input.annual_increase_rate = 0.05;

        assert_eq!(contribution_for_month(&input, 1), 5_000.0);
        assert_eq!(contribution_for_month(&input, 12), 5_000.0);
        assert_approx(contribution_for_month(&input, 13), 5_000.0 * 1.05);
        assert_approx(contribution_for_month(&input, 24), 5_000.0 * 1.05);
        assert_approx(contribution_for_month(&input, 25), 5_000.0 * 1.05 * 1.05);

        let result = run_projection(&input, date(2024, 1, 15)).unwrap();
        assert_approx(result.monthly_trajectory[12].contribution, 5_000.0 * 1.05);
        assert_approx(
            result.monthly_trajectory[24].contribution,
            5_000.0 * 1.05_f64.powi(2),
        );
    }

    #[test]
    fn escalated_total_invested_sums_the_actual_stream() {
        let mut input = sample_input();
        input.current_balance = 0.0;
        input.monthly_contribution = 1_000.0;
        input.annual_increase_rate = 0.10;

        // 12 * 1000 + 12 * 1100 + 6 * 1210
        assert_approx(total_invested(&input, 30), 12_000.0 + 13_200.0 + 7_260.0);
    }

    #[test]
    fn closed_form_invested_total_agrees_with_iterative_sum() {
        let mut input = sample_input();
        input.monthly_contribution = 1_234.56;
        let iterative: f64 = input.current_balance
            + ContributionSchedule::new(&input).take(317).sum::<f64>();
        assert_rel(total_invested(&input, 317), iterative, 1e-12);
    }

    #[test]
    fn inflation_discounts_pension_by_whole_years_to_retirement() {
        let mut input = sample_input();
        input.inflation_rate = 0.05;
        let result = run_projection(&input, date(2024, 1, 15)).unwrap();
        assert_eq!(result.years_to_retirement, 26);
        assert_rel(
            result.real_monthly_pension,
            result.monthly_pension / 1.05_f64.powi(26),
            1e-12,
        );
    }

    #[test]
    fn age_counts_completed_years_only() {
        assert_eq!(age_on(date(1990, 6, 20), date(2024, 6, 19)), 33);
        assert_eq!(age_on(date(1990, 6, 20), date(2024, 6, 20)), 34);
        assert_eq!(age_on(date(2030, 1, 1), date(2024, 1, 1)), 0);
    }

    #[test]
    fn validation_rejects_negative_amounts_and_bad_ratio() {
        let as_of = date(2024, 1, 15);

        let mut input = sample_input();
        input.current_balance = -1.0;
        let err = run_projection(&input, as_of).unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::InvalidInput { field: "current_balance", .. }
        ));

        let mut input = sample_input();
        input.monthly_contribution = -0.01;
        assert!(matches!(
            run_projection(&input, as_of).unwrap_err(),
            ProjectionError::InvalidInput { field: "monthly_contribution", .. }
        ));

        let mut input = sample_input();
        input.annuity_ratio = 1.2;
        assert!(matches!(
            run_projection(&input, as_of).unwrap_err(),
            ProjectionError::InvalidInput { field: "annuity_ratio", .. }
        ));

        let mut input = sample_input();
        input.annual_return_rate = f64::NAN;
        assert!(matches!(
            run_projection(&input, as_of).unwrap_err(),
            ProjectionError::InvalidInput { field: "annual_return_rate", .. }
        ));
    }

    #[test]
    fn validation_rejects_birth_date_after_as_of() {
        let mut input = sample_input();
        input.birth_date = date(2025, 1, 1);
        let err = run_projection(&input, date(2024, 1, 15)).unwrap_err();
        assert!(err.to_string().contains("birth_date"));
    }

    #[test]
    fn reruns_with_same_inputs_are_identical_and_changed_inputs_are_not_stale() {
        let input = sample_input();
        let as_of = date(2024, 1, 15);
        let first = run_projection(&input, as_of).unwrap();
        let second = run_projection(&input, as_of).unwrap();
        assert_eq!(first.total_corpus, second.total_corpus);
        assert_eq!(first.monthly_trajectory, second.monthly_trajectory);

        let mut changed = input.clone();
        changed.monthly_contribution = 6_000.0;
        let third = run_projection(&changed, as_of).unwrap();
        assert!(third.total_corpus > first.total_corpus);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_split_and_growth_identities_hold(
            balance in 0.0f64..5_000_000.0,
            contribution in 0.0f64..200_000.0,
            ratio in 0.0f64..=1.0,
            annual_return in 0.01f64..0.20,
            increase in 0.0f64..0.20,
            retirement_age in 40u32..=80,
            birth_year in 1950i32..2000,
            birth_month in 1u32..=12,
        ) {
            let birth_date = date(birth_year, birth_month, 1);
            let mut input = ProjectionInput::new(
                birth_date,
                balance,
                contribution,
                ratio,
                annual_return,
                retirement_age,
            );
            input.annual_increase_rate = increase;
            let result = run_projection(&input, birth_date).unwrap();
            let split = result.annuity_corpus + result.lump_sum;
            prop_assert!((split - result.total_corpus).abs() <= 1e-6 * result.total_corpus.max(1.0));
            prop_assert_eq!(result.growth, result.total_corpus - result.total_invested);
            prop_assert_eq!(result.monthly_trajectory.len() as u32, result.months_to_retirement);
        }

        #[test]
        fn prop_corpus_is_monotone_with_non_negative_flows(
            balance in 0.0f64..1_000_000.0,
            contribution in 0.0f64..50_000.0,
            annual_return in 0.0f64..0.20,
            increase in 0.0f64..0.20,
            retirement_age in 40u32..=80,
        ) {
            let mut input = ProjectionInput::new(
                date(1985, 7, 4),
                balance,
                contribution,
                0.4,
                annual_return,
                retirement_age,
            );
            input.annual_increase_rate = increase;

            let result = run_projection(&input, date(2024, 1, 15)).unwrap();
            let mut previous = balance;
            for snapshot in &result.monthly_trajectory {
                prop_assert!(snapshot.corpus >= previous);
                previous = snapshot.corpus;
            }
        }

        #[test]
        fn prop_zero_escalation_invested_total_is_exact(
            balance in 0.0f64..1_000_000.0,
            contribution in 0.0f64..50_000.0,
            retirement_age in 40u32..=80,
        ) {
            let input = ProjectionInput::new(
                date(1985, 7, 4),
                balance,
                contribution,
                0.4,
                0.08,
                retirement_age,
            );
            let result = run_projection(&input, date(2024, 1, 15)).unwrap();
            prop_assert_eq!(
                result.total_invested,
                balance + contribution * f64::from(result.months_to_retirement)
            );
        }

        #[test]
        fn prop_zero_inflation_leaves_pension_unchanged(
            contribution in 0.0f64..50_000.0,
            retirement_age in 40u32..=80,
        ) {
            let input = ProjectionInput::new(
                date(1985, 7, 4),
                0.0,
                contribution,
                0.4,
                0.08,
                retirement_age,
            );
            let result = run_projection(&input, date(2024, 1, 15)).unwrap();
            prop_assert_eq!(result.real_monthly_pension, result.monthly_pension);
        }
    }
}
