use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::chat::{ChatChunk, ChatConfig, ChatMessage, ChatRelay, ChatRequest, StrategyBrief};
use crate::core::{
    EvaluationResult, FilingStatus, STATE_CODES, Strategy, TaxProfile, annual_401k_limit,
    catalog, evaluate, find_strategy, is_known_state,
};

/// Allowed relative gap between declared total compensation and the summed
/// income sources.
const COMPENSATION_TOLERANCE: f64 = 0.2;
const STREAM_DONE: &str = "[DONE]";

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliFilingStatus {
    Single,
    MarriedFilingJointly,
    MarriedFilingSeparately,
    HeadOfHousehold,
}

impl From<CliFilingStatus> for FilingStatus {
    fn from(value: CliFilingStatus) -> Self {
        match value {
            CliFilingStatus::Single => FilingStatus::Single,
            CliFilingStatus::MarriedFilingJointly => FilingStatus::MarriedFilingJointly,
            CliFilingStatus::MarriedFilingSeparately => FilingStatus::MarriedFilingSeparately,
            CliFilingStatus::HeadOfHousehold => FilingStatus::HeadOfHousehold,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ApiFilingStatus {
    Single,
    #[serde(alias = "marriedFilingJointly", alias = "married-filing-jointly", alias = "mfj")]
    MarriedFilingJointly,
    #[serde(alias = "marriedFilingSeparately", alias = "married-filing-separately", alias = "mfs")]
    MarriedFilingSeparately,
    #[serde(alias = "headOfHousehold", alias = "head-of-household", alias = "hoh")]
    HeadOfHousehold,
}

impl From<ApiFilingStatus> for CliFilingStatus {
    fn from(value: ApiFilingStatus) -> Self {
        match value {
            ApiFilingStatus::Single => CliFilingStatus::Single,
            ApiFilingStatus::MarriedFilingJointly => CliFilingStatus::MarriedFilingJointly,
            ApiFilingStatus::MarriedFilingSeparately => CliFilingStatus::MarriedFilingSeparately,
            ApiFilingStatus::HeadOfHousehold => CliFilingStatus::HeadOfHousehold,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProfilePayload {
    salary: Option<f64>,
    rsu: Option<f64>,
    dividends: Option<f64>,
    capital_gains: Option<f64>,
    other_income: Option<f64>,
    total_compensation: Option<f64>,
    filing_status: Option<ApiFilingStatus>,
    age: Option<u32>,
    has_dependents: Option<bool>,
    homeowner: Option<bool>,
    state_of_residence: Option<String>,
    #[serde(alias = "retirement_401k")]
    retirement401k: Option<f64>,
    itemized_deductions: Option<f64>,

    show_all: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ChatPayload {
    strategy_id: Option<String>,
    strategy: Option<StrategyBrief>,
    #[serde(alias = "userProfile")]
    profile: ProfilePayload,
    #[serde(alias = "chatHistory")]
    messages: Vec<ChatMessage>,
}

#[derive(Parser, Debug)]
#[command(
    name = "taxwise",
    about = "Federal tax estimate and ranked tax-saving strategies for a simplified income profile"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Evaluate one profile and print the result as JSON
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "TAXWISE_PORT", default_value_t = 8080)]
    pub port: u16,
    #[arg(
        long,
        env = "ANTHROPIC_API_KEY",
        hide_env_values = true,
        help = "API key for the strategy chat; chat is disabled without it"
    )]
    pub anthropic_api_key: Option<String>,
    #[arg(long, env = "TAXWISE_CHAT_MODEL", default_value = "claude-3-5-sonnet-latest")]
    pub model: String,
    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = "https://api.anthropic.com")]
    pub anthropic_url: String,
    #[arg(long, default_value_t = 1024, help = "Maximum tokens per chat reply")]
    pub max_tokens: u32,
}

impl From<ServeArgs> for ChatConfig {
    fn from(args: ServeArgs) -> Self {
        ChatConfig {
            api_url: args.anthropic_url,
            api_key: args.anthropic_api_key,
            model: args.model,
            max_tokens: args.max_tokens,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    profile: ProfileArgs,
    #[arg(long, help = "Include strategies the profile is not eligible for")]
    show_all: bool,
}

#[derive(Args, Debug, Clone)]
struct ProfileArgs {
    #[arg(long, default_value_t = 0.0)]
    salary: f64,
    #[arg(long, default_value_t = 0.0, help = "Vested RSU income")]
    rsu: f64,
    #[arg(long, default_value_t = 0.0)]
    dividends: f64,
    #[arg(long, default_value_t = 0.0)]
    capital_gains: f64,
    #[arg(long, default_value_t = 0.0, help = "Self-employment and other income")]
    other_income: f64,
    #[arg(
        long,
        help = "Declared total compensation; defaults to the sum of income sources"
    )]
    total_compensation: Option<f64>,
    #[arg(long, value_enum, default_value_t = CliFilingStatus::Single)]
    filing_status: CliFilingStatus,
    #[arg(long, default_value_t = 30)]
    age: u32,
    #[arg(long)]
    has_dependents: bool,
    #[arg(long)]
    homeowner: bool,
    #[arg(long, help = "Two-letter state code (informational only)")]
    state: Option<String>,
    #[arg(
        long = "retirement-401k",
        default_value_t = 0.0,
        help = "Current annual 401(k) contributions"
    )]
    retirement_401k: f64,
    #[arg(long, default_value_t = 0.0)]
    itemized_deductions: f64,
}

#[derive(Debug)]
struct EvaluateRequest {
    profile: TaxProfile,
    show_all: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateResponse {
    profile: TaxProfile,
    show_all: bool,
    #[serde(flatten)]
    result: EvaluationResult,
}

#[derive(Debug, Serialize)]
struct CatalogResponse {
    strategies: &'static [Strategy],
}

#[derive(Debug, Serialize)]
struct StatesResponse {
    states: &'static [&'static str],
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

struct AppState {
    chat: ChatRelay,
}

fn build_profile(args: ProfileArgs) -> Result<TaxProfile, String> {
    for (name, amount) in [
        ("--salary", args.salary),
        ("--rsu", args.rsu),
        ("--dividends", args.dividends),
        ("--capital-gains", args.capital_gains),
        ("--other-income", args.other_income),
        ("--retirement-401k", args.retirement_401k),
        ("--itemized-deductions", args.itemized_deductions),
    ] {
        if !amount.is_finite() || amount < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }

    if args.age < 18 {
        return Err("--age must be >= 18".to_string());
    }

    let limit = annual_401k_limit(args.age);
    if args.retirement_401k > limit {
        return Err(format!(
            "--retirement-401k cannot exceed the annual limit of {limit:.0}"
        ));
    }

    let state_of_residence = match args.state.as_deref().map(str::trim) {
        None | Some("") => String::new(),
        Some(code) if is_known_state(code) => code.to_ascii_uppercase(),
        Some(code) => return Err(format!("--state '{code}' is not a US state or DC")),
    };

    let income_sources =
        args.salary + args.rsu + args.dividends + args.capital_gains + args.other_income;
    let total_compensation = args.total_compensation.unwrap_or(income_sources);
    if !total_compensation.is_finite() || total_compensation <= 0.0 {
        return Err("Please enter a valid total compensation amount".to_string());
    }
    if (total_compensation - income_sources).abs() > income_sources * COMPENSATION_TOLERANCE {
        return Err(format!(
            "Total compensation ({total_compensation:.0}) should be within 20% of the sum of \
             income sources ({income_sources:.0}); check salary, RSUs, dividends, capital gains \
             and other income"
        ));
    }

    Ok(TaxProfile {
        salary: args.salary,
        rsu: args.rsu,
        dividends: args.dividends,
        capital_gains: args.capital_gains,
        other_income: args.other_income,
        total_compensation,
        filing_status: args.filing_status.into(),
        age: args.age,
        has_dependents: args.has_dependents,
        homeowner: args.homeowner,
        state_of_residence,
        retirement_401k: args.retirement_401k,
        itemized_deductions: args.itemized_deductions,
    })
}

fn default_profile_args_for_api() -> ProfileArgs {
    ProfileArgs {
        salary: 0.0,
        rsu: 0.0,
        dividends: 0.0,
        capital_gains: 0.0,
        other_income: 0.0,
        total_compensation: None,
        filing_status: CliFilingStatus::Single,
        age: 30,
        has_dependents: false,
        homeowner: false,
        state: None,
        retirement_401k: 0.0,
        itemized_deductions: 0.0,
    }
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<EvaluateRequest, String> {
    let payload = serde_json::from_str::<ProfilePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: ProfilePayload) -> Result<EvaluateRequest, String> {
    let mut args = default_profile_args_for_api();

    if let Some(v) = payload.salary {
        args.salary = v;
    }
    if let Some(v) = payload.rsu {
        args.rsu = v;
    }
    if let Some(v) = payload.dividends {
        args.dividends = v;
    }
    if let Some(v) = payload.capital_gains {
        args.capital_gains = v;
    }
    if let Some(v) = payload.other_income {
        args.other_income = v;
    }
    if payload.total_compensation.is_some() {
        args.total_compensation = payload.total_compensation;
    }
    if let Some(v) = payload.filing_status {
        args.filing_status = v.into();
    }
    if let Some(v) = payload.age {
        args.age = v;
    }
    if let Some(v) = payload.has_dependents {
        args.has_dependents = v;
    }
    if let Some(v) = payload.homeowner {
        args.homeowner = v;
    }
    if payload.state_of_residence.is_some() {
        args.state = payload.state_of_residence;
    }
    if let Some(v) = payload.retirement401k {
        args.retirement_401k = v;
    }
    if let Some(v) = payload.itemized_deductions {
        args.itemized_deductions = v;
    }

    Ok(EvaluateRequest {
        profile: build_profile(args)?,
        show_all: payload.show_all.unwrap_or(false),
    })
}

fn chat_request_from_payload(payload: ChatPayload) -> Result<ChatRequest, String> {
    let strategy = match (payload.strategy_id.as_deref(), payload.strategy) {
        (Some(id), _) => find_strategy(id)
            .map(StrategyBrief::from)
            .ok_or_else(|| format!("Unknown strategy id '{id}'"))?,
        (None, Some(brief)) => brief,
        (None, None) => return Err("strategy or strategyId is required".to_string()),
    };
    let profile = api_request_from_payload(payload.profile)?.profile;

    let request = ChatRequest {
        strategy,
        profile,
        messages: payload.messages,
    };
    request.validate().map_err(|e| e.to_string())?;
    Ok(request)
}

/// Evaluates the profile given on the command line and renders it as JSON.
pub fn run_evaluate(args: EvaluateArgs) -> Result<String, String> {
    let profile = build_profile(args.profile)?;
    let response = build_evaluate_response(profile, args.show_all);
    serde_json::to_string_pretty(&response).map_err(|e| format!("Failed to render result: {e}"))
}

pub async fn run_http_server(args: ServeArgs) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let port = args.port;
    let state = Arc::new(AppState {
        chat: ChatRelay::new(args.into()),
    });
    if !state.chat.is_configured() {
        info!("No Anthropic API key configured; /api/chat will return 503");
    }

    let listener = TcpListener::bind(addr).await?;
    info!("Tax strategy API listening on http://{addr}");
    info!("Local access: http://127.0.0.1:{port}/api/strategies");

    axum::serve(listener, router(state)).await
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/evaluate",
            get(evaluate_get_handler).post(evaluate_post_handler),
        )
        .route("/api/strategies", get(strategies_handler))
        .route("/api/states", get(states_handler))
        .route("/api/chat", post(chat_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    with_cache_control("ok")
}

async fn strategies_handler() -> Response {
    json_response(
        StatusCode::OK,
        CatalogResponse {
            strategies: catalog(),
        },
    )
}

async fn states_handler() -> Response {
    json_response(
        StatusCode::OK,
        StatesResponse {
            states: &STATE_CODES,
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn evaluate_get_handler(Query(payload): Query<ProfilePayload>) -> Response {
    evaluate_handler_impl(payload)
}

async fn evaluate_post_handler(Json(payload): Json<ProfilePayload>) -> Response {
    evaluate_handler_impl(payload)
}

fn evaluate_handler_impl(payload: ProfilePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let response = build_evaluate_response(request.profile, request.show_all);
    debug!(
        "Evaluated profile: taxable income {:.0}, federal tax {:.0}, {} strategies returned",
        response.result.taxable_income,
        response.result.estimated_federal_tax,
        response.result.strategies.len()
    );
    json_response(StatusCode::OK, response)
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatPayload>,
) -> Response {
    if !state.chat.is_configured() {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Strategy chat is not configured on this server",
        );
    }

    let request = match chat_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let chunks = ReceiverStream::new(state.chat.stream_reply(request))
        .map(|chunk| Ok::<Event, Infallible>(chunk_event(chunk)));
    with_cache_control(Sse::new(chunks).keep_alive(KeepAlive::default()))
}

fn chunk_event(chunk: ChatChunk) -> Event {
    match chunk {
        ChatChunk::Text(text) => Event::default().data(json!({ "text": text }).to_string()),
        ChatChunk::Done => Event::default().data(STREAM_DONE),
        ChatChunk::Error(message) => Event::default()
            .event("error")
            .data(json!({ "error": message }).to_string()),
    }
}

fn build_evaluate_response(profile: TaxProfile, show_all: bool) -> EvaluateResponse {
    let result = evaluate(&profile, show_all);
    EvaluateResponse {
        profile,
        show_all,
        result,
    }
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
