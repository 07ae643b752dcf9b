use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{ProjectionInput, ProjectionResult, run_projection};
use crate::report::{
    CONDENSED_TABLE_ROWS, ChartData, RUPEE, ReportOptions, TextEncoding, YearRow, chart_data,
    condensed_table, export_report, format_amount, yearly_table,
};

const MIN_BIRTH_YEAR: i32 = 1940;
const DEFAULT_ANNUITY_RATE_PERCENT: f64 = 6.0;
const REPORT_FILE_NAME: &str = "nps_summary.txt";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
enum CliEncoding {
    #[default]
    Utf8,
    Latin1,
}

impl From<CliEncoding> for TextEncoding {
    fn from(value: CliEncoding) -> Self {
        match value {
            CliEncoding::Utf8 => TextEncoding::Utf8,
            CliEncoding::Latin1 => TextEncoding::Latin1,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiEncoding {
    #[serde(alias = "utf-8", alias = "UTF-8")]
    Utf8,
    #[serde(alias = "latin-1", alias = "iso-8859-1")]
    Latin1,
}

impl From<ApiEncoding> for CliEncoding {
    fn from(value: ApiEncoding) -> Self {
        match value {
            ApiEncoding::Utf8 => CliEncoding::Utf8,
            ApiEncoding::Latin1 => CliEncoding::Latin1,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectionPayload {
    birth_day: Option<u32>,
    birth_month: Option<u32>,
    birth_year: Option<i32>,
    retirement_age: Option<u32>,
    as_of: Option<NaiveDate>,

    current_balance: Option<f64>,
    monthly_contribution: Option<f64>,
    annual_increase: Option<f64>,

    annuity_ratio: Option<f64>,
    annuity_rate: Option<f64>,
    annual_return: Option<f64>,
    inflation: Option<f64>,

    condensed: Option<bool>,
    encoding: Option<ApiEncoding>,
    include_words: Option<bool>,
}

#[derive(Parser, Debug)]
#[command(
    name = "nps",
    about = "NPS pension estimator (monthly compounding, contribution step-up, annuity split)"
)]
struct App {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the projection summary and yearly table
    Project {
        #[command(flatten)]
        cli: Cli,
        #[arg(long, help = "Print the full projection as JSON")]
        json: bool,
        #[arg(long, help = "Show about ten rows instead of every year")]
        condensed: bool,
    },
    /// Write the paginated summary report to a file
    Report {
        #[command(flatten)]
        cli: Cli,
        #[arg(long, default_value = REPORT_FILE_NAME)]
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = CliEncoding::Utf8)]
        encoding: CliEncoding,
        #[arg(long, help = "Leave amounts in words out of the report")]
        no_words: bool,
    },
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Args, Debug, Clone)]
struct Cli {
    #[arg(long, default_value_t = 1, help = "Day of birth (1-31)")]
    birth_day: u32,
    #[arg(long, default_value_t = 1, help = "Month of birth (1-12)")]
    birth_month: u32,
    #[arg(long, default_value_t = 1990)]
    birth_year: i32,
    #[arg(long, default_value_t = 60, help = "Retirement age (40-80)")]
    retirement_age: u32,
    #[arg(long, help = "Projection start date (YYYY-MM-DD), defaults to today")]
    as_of: Option<NaiveDate>,
    #[arg(long, default_value_t = 0.0, help = "Current NPS balance")]
    current_balance: f64,
    #[arg(long, default_value_t = 0.0)]
    monthly_contribution: f64,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Annual increase in contribution in percent (0-20)"
    )]
    annual_increase: f64,
    #[arg(
        long,
        default_value_t = 40.0,
        help = "Share of the corpus used to buy the annuity in percent (0-100)"
    )]
    annuity_ratio: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_ANNUITY_RATE_PERCENT,
        help = "Annual annuity payout rate in percent"
    )]
    annuity_rate: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Expected annual return in percent (1-20)"
    )]
    annual_return: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Expected inflation in percent (0-10), used for the real pension"
    )]
    inflation: f64,
}

#[derive(Debug, Clone)]
struct ProjectionRequest {
    input: ProjectionInput,
    as_of: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    birth_date: NaiveDate,
    retirement_age: u32,
    projection: ProjectionResult,
    charts: ChartData,
    yearly_table: Vec<YearRow>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Birth date from form parts. Days past the end of the month are pulled
/// back to the month's last day.
fn clamp_birth_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, String> {
    if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
        return Ok(date);
    }

    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let last_day = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .ok_or_else(|| format!("invalid birth date {year:04}-{month:02}-{day:02}"))?;
    warn!(
        year,
        month,
        day,
        clamped = %last_day,
        "birth day does not exist in that month, using the last day"
    );
    Ok(last_day)
}

fn check_percent(name: &str, value: f64, min: f64, max: f64) -> Result<(), String> {
    if !value.is_finite() || value < min || value > max {
        return Err(format!("{name} must be between {min} and {max}"));
    }
    Ok(())
}

fn build_request(cli: &Cli, today: NaiveDate) -> Result<ProjectionRequest, String> {
    if !(1..=31).contains(&cli.birth_day) {
        return Err("--birth-day must be between 1 and 31".to_string());
    }

    if !(1..=12).contains(&cli.birth_month) {
        return Err("--birth-month must be between 1 and 12".to_string());
    }

    if !(MIN_BIRTH_YEAR..=today.year()).contains(&cli.birth_year) {
        return Err(format!(
            "--birth-year must be between {MIN_BIRTH_YEAR} and {}",
            today.year()
        ));
    }

    if !(40..=80).contains(&cli.retirement_age) {
        return Err("--retirement-age must be between 40 and 80".to_string());
    }

    if !cli.current_balance.is_finite() || cli.current_balance < 0.0 {
        return Err("--current-balance must be >= 0".to_string());
    }

    if !cli.monthly_contribution.is_finite() || cli.monthly_contribution < 0.0 {
        return Err("--monthly-contribution must be >= 0".to_string());
    }

    check_percent("--annuity-ratio", cli.annuity_ratio, 0.0, 100.0)?;
    check_percent("--annuity-rate", cli.annuity_rate, 0.0, 100.0)?;
    check_percent("--annual-return", cli.annual_return, 1.0, 20.0)?;
    check_percent("--annual-increase", cli.annual_increase, 0.0, 20.0)?;
    check_percent("--inflation", cli.inflation, 0.0, 10.0)?;

    let birth_date = clamp_birth_date(cli.birth_year, cli.birth_month, cli.birth_day)?;
    let as_of = cli.as_of.unwrap_or(today);

    Ok(ProjectionRequest {
        input: ProjectionInput {
            birth_date,
            current_balance: cli.current_balance,
            monthly_contribution: cli.monthly_contribution,
            annuity_ratio: cli.annuity_ratio / 100.0,
            annual_return_rate: cli.annual_return / 100.0,
            annual_increase_rate: cli.annual_increase / 100.0,
            retirement_age: cli.retirement_age,
            annuity_rate: cli.annuity_rate / 100.0,
            inflation_rate: cli.inflation / 100.0,
        },
        as_of,
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        birth_day: 1,
        birth_month: 1,
        birth_year: 1990,
        retirement_age: 60,
        as_of: None,
        current_balance: 0.0,
        monthly_contribution: 0.0,
        annual_increase: 5.0,
        annuity_ratio: 40.0,
        annuity_rate: DEFAULT_ANNUITY_RATE_PERCENT,
        annual_return: 10.0,
        inflation: 0.0,
    }
}

fn cli_from_payload(payload: &ProjectionPayload) -> Cli {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.birth_day {
        cli.birth_day = v;
    }
    if let Some(v) = payload.birth_month {
        cli.birth_month = v;
    }
    if let Some(v) = payload.birth_year {
        cli.birth_year = v;
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if payload.as_of.is_some() {
        cli.as_of = payload.as_of;
    }

    if let Some(v) = payload.current_balance {
        cli.current_balance = v;
    }
    if let Some(v) = payload.monthly_contribution {
        cli.monthly_contribution = v;
    }
    if let Some(v) = payload.annual_increase {
        cli.annual_increase = v;
    }

    if let Some(v) = payload.annuity_ratio {
        cli.annuity_ratio = v;
    }
    if let Some(v) = payload.annuity_rate {
        cli.annuity_rate = v;
    }
    if let Some(v) = payload.annual_return {
        cli.annual_return = v;
    }
    if let Some(v) = payload.inflation {
        cli.inflation = v;
    }

    cli
}

fn report_options_from_payload(payload: &ProjectionPayload) -> ReportOptions {
    let encoding: CliEncoding = payload.encoding.map(Into::into).unwrap_or_default();
    ReportOptions {
        encoding: encoding.into(),
        include_words: payload.include_words.unwrap_or(true),
        ..ReportOptions::default()
    }
}

fn build_project_response(
    request: &ProjectionRequest,
    projection: ProjectionResult,
    condensed: bool,
) -> ProjectResponse {
    let rows = yearly_table(&request.input, &projection);
    let yearly_table = if condensed {
        condensed_table(&rows, CONDENSED_TABLE_ROWS)
    } else {
        rows
    };

    ProjectResponse {
        birth_date: request.input.birth_date,
        retirement_age: request.input.retirement_age,
        charts: chart_data(&projection),
        projection,
        yearly_table,
    }
}

pub async fn run_from_args() -> Result<(), String> {
    match App::parse().command {
        Command::Project {
            cli,
            json,
            condensed,
        } => {
            let request = build_request(&cli, today())?;
            let projection =
                run_projection(&request.input, request.as_of).map_err(|e| e.to_string())?;
            if json {
                let response = build_project_response(&request, projection, condensed);
                let body = serde_json::to_string_pretty(&response)
                    .map_err(|e| format!("failed to serialize projection: {e}"))?;
                println!("{body}");
            } else {
                print_summary(&request, &projection, condensed);
            }
            Ok(())
        }
        Command::Report {
            cli,
            output,
            encoding,
            no_words,
        } => {
            let request = build_request(&cli, today())?;
            let projection =
                run_projection(&request.input, request.as_of).map_err(|e| e.to_string())?;
            let options = ReportOptions {
                encoding: encoding.into(),
                include_words: !no_words,
                ..ReportOptions::default()
            };
            let bytes = export_report(&request.input, &projection, options);
            std::fs::write(&output, bytes)
                .map_err(|e| format!("failed to write {}: {e}", output.display()))?;
            info!(path = %output.display(), "report written");
            Ok(())
        }
        Command::Serve { port } => run_http_server(port)
            .await
            .map_err(|e| format!("server error: {e}")),
    }
}

fn print_summary(request: &ProjectionRequest, projection: &ProjectionResult, condensed: bool) {
    let input = &request.input;
    println!("Current Age: {} years", projection.current_age);
    println!(
        "Years to Retirement: {} years",
        projection.years_to_retirement
    );
    println!(
        "Projected Retirement Date: {}",
        projection.retirement_date.format("%d %b %Y")
    );
    println!("Months to Retirement: {}", projection.months_to_retirement);
    println!();

    for (label, value) in [
        ("Total Corpus at Retirement", projection.total_corpus),
        ("Annuity Corpus", projection.annuity_corpus),
        ("Lump Sum Withdrawal", projection.lump_sum),
        ("Estimated Monthly Pension", projection.monthly_pension),
        ("Total Invested", projection.total_invested),
        ("Growth", projection.growth),
    ] {
        println!("{label:<28} {}", format_amount(value, RUPEE));
    }
    if input.inflation_rate > 0.0 {
        println!(
            "{:<28} {}",
            "Pension in Today's Money",
            format_amount(projection.real_monthly_pension, RUPEE)
        );
    }
    println!();

    let rows = yearly_table(input, projection);
    let rows = if condensed {
        condensed_table(&rows, CONDENSED_TABLE_ROWS)
    } else {
        rows
    };
    println!(
        "{:<6} {:>4} {:>16} {:>22}",
        "Year", "Age", "Corpus Value", "Monthly Contribution"
    );
    for row in rows {
        println!(
            "{:<6} {:>4} {:>16} {:>22}",
            row.year,
            row.age,
            format_amount(row.corpus, RUPEE),
            format_amount(row.monthly_contribution, RUPEE)
        );
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route(
            "/api/report",
            get(report_get_handler).post(report_post_handler),
        )
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("NPS projection API listening on http://{addr}");

    axum::serve(listener, router()).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<ProjectionPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_post_handler(Json(payload): Json<ProjectionPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn report_get_handler(Query(payload): Query<ProjectionPayload>) -> Response {
    report_handler_impl(payload).await
}

async fn report_post_handler(Json(payload): Json<ProjectionPayload>) -> Response {
    report_handler_impl(payload).await
}

fn project_from_payload(
    payload: &ProjectionPayload,
) -> Result<(ProjectionRequest, ProjectionResult), Response> {
    let request = build_request(&cli_from_payload(payload), today())
        .map_err(|msg| error_response(StatusCode::BAD_REQUEST, &msg))?;
    let projection = run_projection(&request.input, request.as_of).map_err(|err| {
        info!(%err, "projection rejected");
        error_response(StatusCode::BAD_REQUEST, &err.to_string())
    })?;
    Ok((request, projection))
}

async fn project_handler_impl(payload: ProjectionPayload) -> Response {
    match project_from_payload(&payload) {
        Ok((request, projection)) => {
            let condensed = payload.condensed.unwrap_or(false);
            json_response(
                StatusCode::OK,
                build_project_response(&request, projection, condensed),
            )
        }
        Err(response) => response,
    }
}

async fn report_handler_impl(payload: ProjectionPayload) -> Response {
    let (request, projection) = match project_from_payload(&payload) {
        Ok(projected) => projected,
        Err(response) => return response,
    };

    let options = report_options_from_payload(&payload);
    let content_type = match options.encoding {
        TextEncoding::Utf8 => "text/plain; charset=utf-8",
        TextEncoding::Latin1 => "text/plain; charset=iso-8859-1",
    };
    let bytes = export_report(&request.input, &projection, options);
    with_cache_control((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{REPORT_FILE_NAME}\""),
            ),
        ],
        bytes,
    ))
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn request_from_json(json: &str, today: NaiveDate) -> Result<ProjectionRequest, String> {
    let payload = serde_json::from_str::<ProjectionPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    build_request(&cli_from_payload(&payload), today)
}
