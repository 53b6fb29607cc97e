use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::core::{
    AssetConfig, AssetSummary, CashFlowConfig, ConfigError, Growth, Horizon, Portfolio, Profile,
    RealEstateConfig, ReturnModel, SimulationError,
};

#[derive(Parser, Debug)]
#[command(
    name = "networth",
    about = "Monte Carlo net worth projector (property, mortgages, recurring cash flows)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Simulate a portfolio file once and print the summary as JSON.
    Run {
        #[arg(long, help = "Portfolio JSON file: { cash_init, inflation?, assets: [...] }")]
        portfolio: PathBuf,
        #[arg(long, default_value_t = 30)]
        years: u32,
        #[arg(long, default_value_t = 0)]
        months: u32,
        #[arg(long, default_value_t = 0)]
        days: u32,
        #[arg(long, default_value_t = 1000)]
        replications: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Serve { port } => {
            run_http_server(port).await?;
            Ok(())
        }
        Command::Run {
            portfolio,
            years,
            months,
            days,
            replications,
            seed,
        } => {
            let raw = std::fs::read_to_string(&portfolio)?;
            let file: PortfolioFile = serde_json::from_str(&raw)?;
            let portfolio = portfolio_from_file(file)?;
            let result = portfolio.simulate(
                Horizon {
                    years,
                    months,
                    days,
                },
                replications,
                seed,
            )?;
            println!("{}", serde_json::to_string_pretty(&result.summary())?);
            Ok(())
        }
    }
}

#[derive(Debug, Deserialize)]
struct PortfolioFile {
    cash_init: f64,
    inflation: Option<f64>,
    assets: Vec<ApiAsset>,
}

#[derive(Debug, Deserialize)]
struct SimulatePayload {
    cash_init: f64,
    inflation: Option<f64>,
    assets: Vec<ApiAsset>,
    years: Option<u32>,
    months: Option<u32>,
    days: Option<u32>,
    replications: Option<u32>,
    seed: Option<u64>,
}

/// GET form of `SimulatePayload`. Query strings cannot carry nesting, so the
/// asset list arrives as one JSON-encoded parameter.
#[derive(Debug, Deserialize)]
struct SimulateQuery {
    cash_init: f64,
    inflation: Option<f64>,
    assets: String,
    years: Option<u32>,
    months: Option<u32>,
    days: Option<u32>,
    replications: Option<u32>,
    seed: Option<u64>,
}

fn payload_from_query(query: SimulateQuery) -> Result<SimulatePayload, serde_json::Error> {
    let assets: Vec<ApiAsset> = serde_json::from_str(&query.assets)?;
    Ok(SimulatePayload {
        cash_init: query.cash_init,
        inflation: query.inflation,
        assets,
        years: query.years,
        months: query.months,
        days: query.days,
        replications: query.replications,
        seed: query.seed,
    })
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ApiAsset {
    #[serde(alias = "realEstate", alias = "real_estate")]
    RealEstate(ApiRealEstate),
    #[serde(alias = "cashFlow", alias = "cash_flow")]
    CashFlow(ApiCashFlow),
}

#[derive(Debug, Deserialize)]
struct ApiRealEstate {
    name: String,
    #[serde(alias = "property_value_init")]
    property_value: f64,
    #[serde(alias = "mortgage_amt")]
    mortgage_amount: f64,
    #[serde(default, alias = "mortgage_amt_remaining")]
    mortgage_remaining: Option<f64>,
    mortgage_rate: f64,
    #[serde(alias = "mortgage_term_years")]
    mortgage_term: u32,
    #[serde(default, alias = "maintenance_fees")]
    maintenance_fee: f64,
    #[serde(default)]
    property_tax_rate: f64,
    #[serde(default)]
    inflation: Option<f64>,
    returns: ApiReturns,
    #[serde(default = "default_freq")]
    freq: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ApiReturns {
    Normal { mean: f64, std: f64 },
}

#[derive(Debug, Deserialize)]
struct ApiCashFlow {
    name: String,
    #[serde(default)]
    inflation: Option<f64>,
    #[serde(default = "default_freq")]
    freq: u32,
    #[serde(flatten)]
    profile: ApiProfile,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "profile", rename_all = "kebab-case")]
enum ApiProfile {
    Constant {
        amount: f64,
    },
    #[serde(alias = "linear_interpolation", alias = "linearInterpolation")]
    LinearInterpolation {
        points: Vec<(u32, f64)>,
    },
    #[serde(alias = "step_function", alias = "stepFunction")]
    StepFunction {
        first_step: u32,
        step_stride: u32,
        step_size_init: f64,
        step_growth: String,
    },
    Discrete {
        // Keys stay strings here: integer map keys do not survive serde's
        // internally-tagged buffering, so they are parsed in the conversion.
        transactions: BTreeMap<String, f64>,
    },
}

fn default_freq() -> u32 {
    12
}

fn asset_from_api(asset: ApiAsset, default_inflation: f64) -> Result<AssetConfig, ConfigError> {
    match asset {
        ApiAsset::RealEstate(api) => {
            let ApiReturns::Normal { mean, std } = api.returns;
            Ok(AssetConfig::RealEstate(RealEstateConfig {
                name: api.name,
                property_value: api.property_value,
                mortgage_amount: api.mortgage_amount,
                mortgage_remaining: api.mortgage_remaining,
                mortgage_rate: api.mortgage_rate,
                mortgage_term_years: api.mortgage_term,
                maintenance_fee: api.maintenance_fee,
                property_tax_rate: api.property_tax_rate,
                inflation: api.inflation.unwrap_or(default_inflation),
                returns: ReturnModel::Normal { mean, std },
                freq: api.freq,
            }))
        }
        ApiAsset::CashFlow(api) => {
            let name = api.name;
            let profile = match api.profile {
                ApiProfile::Constant { amount } => Profile::Constant { amount },
                ApiProfile::LinearInterpolation { points } => {
                    Profile::LinearInterpolation { points }
                }
                ApiProfile::StepFunction {
                    first_step,
                    step_stride,
                    step_size_init,
                    step_growth,
                } => Profile::StepFunction {
                    first_step,
                    step_stride,
                    step_size_init,
                    step_growth: Growth::parse(&step_growth)?,
                },
                ApiProfile::Discrete { transactions } => {
                    let mut parsed = BTreeMap::new();
                    for (tick, amount) in transactions {
                        let tick: u32 =
                            tick.trim().parse().map_err(|_| ConfigError::InvalidField {
                                asset: name.clone(),
                                field: "transactions",
                                reason: "tick indices must be non-negative integers",
                            })?;
                        parsed.insert(tick, amount);
                    }
                    Profile::Discrete {
                        transactions: parsed,
                    }
                }
            };
            Ok(AssetConfig::CashFlow(CashFlowConfig {
                name,
                inflation: api.inflation.unwrap_or(default_inflation),
                freq: api.freq,
                profile,
            }))
        }
    }
}

fn portfolio_from_assets(
    assets: Vec<ApiAsset>,
    cash_init: f64,
    inflation: Option<f64>,
) -> Result<Portfolio, ConfigError> {
    let default_inflation = inflation.unwrap_or(0.0);
    let configs = assets
        .into_iter()
        .map(|asset| asset_from_api(asset, default_inflation))
        .collect::<Result<Vec<_>, _>>()?;
    Portfolio::new(configs, cash_init)
}

fn portfolio_from_file(file: PortfolioFile) -> Result<Portfolio, ConfigError> {
    portfolio_from_assets(file.assets, file.cash_init, file.inflation)
}

#[derive(Debug, Serialize)]
struct SimulateResponse {
    replications: u32,
    horizon_days: u32,
    assets: Vec<AssetSummary>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("networth HTTP API listening on http://{addr}");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(query): Query<SimulateQuery>) -> Response {
    match payload_from_query(query) {
        Ok(payload) => simulate_handler_impl(payload).await,
        Err(e) => error_response(StatusCode::BAD_REQUEST, &format!("assets: {e}")),
    }
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let horizon = Horizon {
        years: payload.years.unwrap_or(30),
        months: payload.months.unwrap_or(0),
        days: payload.days.unwrap_or(0),
    };
    let replications = payload.replications.unwrap_or(1000);
    let seed = payload.seed.unwrap_or(42);

    let portfolio =
        match portfolio_from_assets(payload.assets, payload.cash_init, payload.inflation) {
            Ok(portfolio) => portfolio,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        };

    match portfolio.simulate(horizon, replications, seed) {
        Ok(result) => json_response(
            StatusCode::OK,
            SimulateResponse {
                replications,
                horizon_days: horizon.total_days(),
                assets: result.summary(),
            },
        ),
        Err(e @ SimulationError::Insolvent { .. }) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string())
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
