//! Views over a finished projection: sampled trajectories, the year-by-year
//! table and chart series. Nothing here recomputes the simulation.

mod export;
mod format;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::core::{ProjectionInput, ProjectionResult, Snapshot, age_on};

pub use export::{
    LINES_PER_PAGE, REPORT_FOOTER, REPORT_TITLE, ReportError, ReportOptions, TextEncoding,
    export_report,
};
pub use format::{RUPEE, RUPEE_ASCII, amount_in_words, format_amount, format_amount_long};

pub const CONDENSED_TABLE_ROWS: usize = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Sampling {
    Monthly,
    Quarterly,
    Yearly,
}

/// Coarser view of the monthly trajectory. The final month is always kept.
pub fn sample_trajectory(result: &ProjectionResult, sampling: Sampling) -> Vec<Snapshot> {
    let last = result.months_to_retirement;
    match sampling {
        Sampling::Monthly => result.monthly_trajectory.clone(),
        Sampling::Quarterly => result
            .monthly_trajectory
            .iter()
            .filter(|s| s.month % 3 == 0 || s.month == last)
            .copied()
            .collect(),
        Sampling::Yearly => result.yearly_trajectory.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRow {
    pub year: i32,
    pub age: u32,
    pub corpus: f64,
    pub monthly_contribution: f64,
}

/// One row per yearly snapshot: calendar year, age on the snapshot date,
/// corpus and the monthly contribution paid during that year.
pub fn yearly_table(input: &ProjectionInput, result: &ProjectionResult) -> Vec<YearRow> {
    result
        .yearly_trajectory
        .iter()
        .map(|snapshot| YearRow {
            year: snapshot.date.year(),
            age: age_on(input.birth_date, snapshot.date),
            corpus: snapshot.corpus,
            monthly_contribution: snapshot.contribution,
        })
        .collect()
}

/// Roughly `target_rows` evenly spaced rows, always ending with the final
/// row.
pub fn condensed_table(rows: &[YearRow], target_rows: usize) -> Vec<YearRow> {
    let step = (rows.len() / target_rows.max(1)).max(1);
    let mut condensed: Vec<YearRow> = rows.iter().step_by(step).cloned().collect();
    if let Some(last) = rows.last() {
        if (rows.len() - 1) % step != 0 {
            condensed.push(last.clone());
        }
    }
    condensed
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarEntry {
    pub label: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieChart {
    pub lump_sum: f64,
    pub annuity_corpus: f64,
    pub lump_sum_percent: f64,
    pub annuity_percent: f64,
    pub monthly_pension: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub corpus: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChart {
    pub yearly: Vec<ChartPoint>,
    pub quarterly: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub bar: Vec<BarEntry>,
    pub pie: PieChart,
    pub line: LineChart,
}

pub fn chart_data(result: &ProjectionResult) -> ChartData {
    let bar = vec![
        BarEntry {
            label: "Total Invested",
            value: result.total_invested,
        },
        BarEntry {
            label: "Growth",
            value: result.growth,
        },
        BarEntry {
            label: "Total Corpus",
            value: result.total_corpus,
        },
        BarEntry {
            label: "Monthly Pension",
            value: result.monthly_pension,
        },
    ];

    let split_total = result.lump_sum + result.annuity_corpus;
    let percent = |part: f64| {
        if split_total > 0.0 {
            part / split_total * 100.0
        } else {
            0.0
        }
    };
    let pie = PieChart {
        lump_sum: result.lump_sum,
        annuity_corpus: result.annuity_corpus,
        lump_sum_percent: percent(result.lump_sum),
        annuity_percent: percent(result.annuity_corpus),
        monthly_pension: result.monthly_pension,
    };

    let points = |snapshots: Vec<Snapshot>| {
        snapshots
            .into_iter()
            .map(|s| ChartPoint {
                date: s.date,
                corpus: s.corpus,
            })
            .collect()
    };
    let line = LineChart {
        yearly: points(sample_trajectory(result, Sampling::Yearly)),
        quarterly: points(sample_trajectory(result, Sampling::Quarterly)),
    };

    ChartData { bar, pie, line }
}
