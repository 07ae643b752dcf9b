use thiserror::Error;
use tracing::warn;

use super::format::{RUPEE, RUPEE_ASCII, amount_in_words, format_amount_long};
use super::yearly_table;
use crate::core::{ProjectionInput, ProjectionResult};

pub const REPORT_TITLE: &str = "NPS Pension Projection Summary";
pub const REPORT_FOOTER: &str = "Generated by the NPS pension projection calculator";
pub const LINES_PER_PAGE: usize = 40;

const PAGE_BREAK: &str = "\u{c}\n";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Latin1,
}

impl TextEncoding {
    fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Latin1 => "Latin-1",
        }
    }

    pub fn encode(self, text: &str) -> Result<Vec<u8>, ReportError> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Latin1 => text
                .chars()
                .map(|glyph| {
                    u8::try_from(u32::from(glyph)).map_err(|_| ReportError::Encoding {
                        glyph,
                        encoding: self.name(),
                    })
                })
                .collect(),
        }
    }

    fn encode_lossy(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|glyph| u8::try_from(u32::from(glyph)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("cannot encode {glyph:?} as {encoding}")]
    Encoding { glyph: char, encoding: &'static str },
}

#[derive(Copy, Clone, Debug)]
pub struct ReportOptions {
    pub encoding: TextEncoding,
    pub include_words: bool,
    pub include_table: bool,
    pub lines_per_page: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            encoding: TextEncoding::Utf8,
            include_words: true,
            include_table: true,
            lines_per_page: LINES_PER_PAGE,
        }
    }
}

/// Render the paginated summary document.
///
/// When the target encoding cannot carry the rupee glyph the document is
/// rendered again with the ASCII fallback; encoding problems never reach the
/// caller.
pub fn export_report(
    input: &ProjectionInput,
    result: &ProjectionResult,
    options: ReportOptions,
) -> Vec<u8> {
    let document = render_document(input, result, &options, RUPEE);
    match options.encoding.encode(&document) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%err, "re-rendering report with ASCII currency symbol");
            let fallback = render_document(input, result, &options, RUPEE_ASCII);
            options.encoding.encode(&fallback).unwrap_or_else(|err| {
                warn!(%err, "replacing unencodable characters in report");
                options.encoding.encode_lossy(&fallback)
            })
        }
    }
}

fn render_document(
    input: &ProjectionInput,
    result: &ProjectionResult,
    options: &ReportOptions,
    symbol: &str,
) -> String {
    let body = body_lines(input, result, options, symbol);
    let per_page = options.lines_per_page.max(1);
    let chunks: Vec<&[String]> = body.chunks(per_page).collect();
    let page_count = chunks.len().max(1);

    let mut pages = Vec::with_capacity(page_count);
    for index in 0..page_count {
        let mut page = format!("{REPORT_TITLE}\nPage {} of {page_count}\n\n", index + 1);
        for line in chunks.get(index).copied().unwrap_or_default() {
            page.push_str(line);
            page.push('\n');
        }
        if index + 1 == page_count {
            page.push('\n');
            page.push_str(REPORT_FOOTER);
            page.push('\n');
        }
        pages.push(page);
    }

    pages.join(PAGE_BREAK)
}

fn body_lines(
    input: &ProjectionInput,
    result: &ProjectionResult,
    options: &ReportOptions,
    symbol: &str,
) -> Vec<String> {
    let mut lines = vec![
        format!("Date of Birth: {}", input.birth_date.format("%d-%m-%Y")),
        format!("Current Age: {} years", result.current_age),
        format!("Retirement Age: {} years", input.retirement_age),
        format!(
            "Retirement Date: {}",
            result.retirement_date.format("%d-%m-%Y")
        ),
        format!("Months to Retirement: {}", result.months_to_retirement),
        String::new(),
    ];

    let pension_label = format!(
        "Estimated Monthly Pension (annuity rate {:.1}%)",
        input.annuity_rate * 100.0
    );
    let real_pension_label = format!(
        "Inflation-adjusted Monthly Pension ({:.1}% inflation)",
        input.inflation_rate * 100.0
    );
    let mut amounts = vec![
        ("Total Retirement Corpus", result.total_corpus),
        ("Annuity Corpus", result.annuity_corpus),
        ("Lump Sum", result.lump_sum),
        (pension_label.as_str(), result.monthly_pension),
    ];
    if input.inflation_rate > 0.0 {
        amounts.push((real_pension_label.as_str(), result.real_monthly_pension));
    }
    amounts.push(("Total Invested", result.total_invested));
    amounts.push(("Growth", result.growth));

    for (label, value) in amounts {
        let amount = format_amount_long(value, symbol);
        if options.include_words {
            lines.push(format!("{label}: {amount} ({})", amount_in_words(value)));
        } else {
            lines.push(format!("{label}: {amount}"));
        }
    }

    if options.include_table {
        lines.push(String::new());
        lines.push("Yearly Projection".to_string());
        lines.push(format!(
            "{:<6} {:>4} {:>20} {:>24}",
            "Year", "Age", "Corpus Value", "Monthly Contribution"
        ));
        for row in yearly_table(input, result) {
            lines.push(format!(
                "{:<6} {:>4} {:>20} {:>24}",
                row.year,
                row.age,
                format!("{symbol}{:.2}", row.corpus),
                format!("{symbol}{:.2}", row.monthly_contribution),
            ));
        }
    }

    lines
}
