use axum::{
    Router,
    extract::Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;

use crate::core::{
    AggregateRecord, CacMethod, ChurnRounding, CohortInflow, EnginePolicy, GoalSolveConfig,
    GoalType, MONTHS, ModelParameters, MonthRecord, PayrollScenario, TaxBase,
    TaxScenario, Tier, TierCatalog, UpsellOffer, UpsellPolicy, run_projection, solve_goal,
};
use crate::error::{ProjectionError, ProjectionResult};

const DEFAULT_SEARCH_MIN: f64 = 0.0;
const DEFAULT_SEARCH_MAX: f64 = 10.0;
const DEFAULT_TOLERANCE: f64 = 0.001;
const DEFAULT_MAX_ITERATIONS: u32 = 40;

/// The three engine inputs, validated and ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionInputs {
    pub parameters: ModelParameters,
    pub inflow: CohortInflow,
    pub upsell: UpsellPolicy,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyPayload {
    churn_rounding: Option<ChurnRounding>,
    tax_base: Option<TaxBase>,
    carryover_cap_months: Option<u32>,
    include_implementation_in_cac: Option<bool>,
    cac_method: Option<CacMethod>,
    ltv_cap_months: Option<f64>,
    payroll_development_share: Option<f64>,
}

/// Any subset of the inputs; missing fields keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectionPayload {
    tax_scenario: Option<TaxScenario>,
    custom_tax_rate: Option<f64>,
    payroll_scenario: Option<PayrollScenario>,
    payroll_a: Option<Vec<f64>>,
    payroll_b: Option<Vec<f64>>,
    api_cost_pct: Option<f64>,
    churn_rate: Option<f64>,
    implementation_cost_cap: Option<f64>,
    integration_price: Option<f64>,
    cac_pct: Option<f64>,
    implementation_pct: Option<f64>,
    partner_commission_rate: Option<f64>,
    direct_sales_pct: Option<f64>,
    direct_marketing_pct: Option<f64>,
    direct_lead_cost: Option<f64>,
    partner_lead_cost: Option<f64>,
    usage_rate: Option<f64>,
    carryover_pct: Option<f64>,
    overage_price: Option<f64>,
    direct_channel_pct: Option<f64>,
    tiers: Option<Vec<Tier>>,
    policy: Option<PolicyPayload>,

    inflow: Option<BTreeMap<String, Vec<i64>>>,
    upsell: Option<UpsellPolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolvePayload {
    goal: GoalType,
    target_month: u32,
    #[serde(default)]
    search_min: Option<f64>,
    #[serde(default)]
    search_max: Option<f64>,
    #[serde(default)]
    tolerance: Option<f64>,
    #[serde(default)]
    max_iterations: Option<u32>,
    #[serde(flatten)]
    inputs: ProjectionPayload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionResponse {
    tax_rate: f64,
    policy: EnginePolicy,
    months: Vec<MonthRecord>,
    summary: AggregateRecord,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DefaultsResponse<'a> {
    #[serde(flatten)]
    parameters: &'a ModelParameters,
    inflow: &'a CohortInflow,
    upsell: &'a UpsellPolicy,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn default_inputs() -> ProjectionInputs {
    let tier = |id: &str, price: f64, message_quota: f64| Tier {
        id: id.to_string(),
        price,
        message_quota,
        integration_price: None,
    };

    let inflow = [
        ("tier-75", vec![8, 10, 12, 14, 16, 18, 20, 22, 24, 26, 28, 30]),
        ("tier-150", vec![5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]),
        ("tier-250", vec![3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8]),
        ("tier-500", vec![1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4, 5]),
        ("tier-1000", vec![0, 1, 0, 1, 1, 1, 1, 1, 2, 2, 2, 2]),
    ]
    .into_iter()
    .map(|(id, counts)| (id.to_string(), counts))
    .collect::<BTreeMap<_, _>>();

    ProjectionInputs {
        parameters: ModelParameters {
            tax_scenario: TaxScenario::ScenarioA,
            custom_tax_rate: 15.0,
            payroll_scenario: PayrollScenario::ScenarioA,
            payroll_a: vec![
                18_000.0, 18_000.0, 18_000.0, 22_000.0, 22_000.0, 22_000.0, 26_000.0, 26_000.0,
                26_000.0, 30_000.0, 30_000.0, 30_000.0,
            ],
            payroll_b: vec![
                30_000.0, 30_000.0, 30_000.0, 36_000.0, 36_000.0, 36_000.0, 42_000.0, 42_000.0,
                42_000.0, 48_000.0, 48_000.0, 48_000.0,
            ],
            api_cost_pct: 12.0,
            churn_rate: 2.0,
            implementation_cost_cap: 400.0,
            integration_price: 1_000.0,
            cac_pct: 20.0,
            implementation_pct: 30.0,
            partner_commission_rate: 20.0,
            direct_sales_pct: 10.0,
            direct_marketing_pct: 5.0,
            direct_lead_cost: 50.0,
            partner_lead_cost: 25.0,
            usage_rate: 80.0,
            carryover_pct: 100.0,
            overage_price: 0.3,
            direct_channel_pct: 60.0,
            tiers: TierCatalog::new(vec![
                tier("tier-75", 75.0, 105.0),
                tier("tier-150", 150.0, 250.0),
                tier("tier-250", 250.0, 500.0),
                tier("tier-500", 500.0, 1_200.0),
                tier("tier-1000", 1_000.0, 3_000.0),
            ]),
            policy: EnginePolicy::default(),
        },
        inflow: CohortInflow::new(inflow),
        upsell: UpsellPolicy {
            automation_units: UpsellOffer { rate: 3.0, price: 49.0 },
            feature_add_ons: UpsellOffer { rate: 2.0, price: 99.0 },
            message_packs: UpsellOffer { rate: 4.0, price: 29.0 },
            extra_integrations: UpsellOffer { rate: 1.0, price: 250.0 },
        },
    }
}

pub fn inputs_from_payload(payload: ProjectionPayload) -> ProjectionResult<ProjectionInputs> {
    let mut inputs = default_inputs();
    let params = &mut inputs.parameters;

    if let Some(v) = payload.tax_scenario {
        params.tax_scenario = v;
    }
    if let Some(v) = payload.custom_tax_rate {
        params.custom_tax_rate = v;
    }
    if let Some(v) = payload.payroll_scenario {
        params.payroll_scenario = v;
    }
    if let Some(v) = payload.payroll_a {
        params.payroll_a = v;
    }
    if let Some(v) = payload.payroll_b {
        params.payroll_b = v;
    }
    if let Some(v) = payload.api_cost_pct {
        params.api_cost_pct = v;
    }
    if let Some(v) = payload.churn_rate {
        params.churn_rate = v;
    }
    if let Some(v) = payload.implementation_cost_cap {
        params.implementation_cost_cap = v;
    }
    if let Some(v) = payload.integration_price {
        params.integration_price = v;
    }
    if let Some(v) = payload.cac_pct {
        params.cac_pct = v;
    }
    if let Some(v) = payload.implementation_pct {
        params.implementation_pct = v;
    }
    if let Some(v) = payload.partner_commission_rate {
        params.partner_commission_rate = v;
    }
    if let Some(v) = payload.direct_sales_pct {
        params.direct_sales_pct = v;
    }
    if let Some(v) = payload.direct_marketing_pct {
        params.direct_marketing_pct = v;
    }
    if let Some(v) = payload.direct_lead_cost {
        params.direct_lead_cost = v;
    }
    if let Some(v) = payload.partner_lead_cost {
        params.partner_lead_cost = v;
    }
    if let Some(v) = payload.usage_rate {
        params.usage_rate = v;
    }
    if let Some(v) = payload.carryover_pct {
        params.carryover_pct = v;
    }
    if let Some(v) = payload.overage_price {
        params.overage_price = v;
    }
    if let Some(v) = payload.direct_channel_pct {
        params.direct_channel_pct = v;
    }
    if let Some(v) = payload.tiers {
        params.tiers = TierCatalog::new(v);
    }

    if let Some(policy) = payload.policy {
        let target = &mut params.policy;
        if let Some(v) = policy.churn_rounding {
            target.churn_rounding = v;
        }
        if let Some(v) = policy.tax_base {
            target.tax_base = v;
        }
        if let Some(v) = policy.carryover_cap_months {
            target.carryover_cap_months = v;
        }
        if let Some(v) = policy.include_implementation_in_cac {
            target.include_implementation_in_cac = v;
        }
        if let Some(v) = policy.cac_method {
            target.cac_method = v;
        }
        if let Some(v) = policy.ltv_cap_months {
            target.ltv_cap_months = v;
        }
        if let Some(v) = policy.payroll_development_share {
            target.payroll_development_share = v;
        }
    }

    if let Some(v) = payload.inflow {
        inputs.inflow = CohortInflow::new(v);
    }
    if let Some(v) = payload.upsell {
        inputs.upsell = v;
    }

    validate_inputs(&inputs)?;
    Ok(inputs)
}

pub fn inputs_from_json(json: &str) -> ProjectionResult<ProjectionInputs> {
    let payload = serde_json::from_str::<ProjectionPayload>(json)?;
    inputs_from_payload(payload)
}

pub fn inputs_from_file(path: &Path) -> ProjectionResult<ProjectionInputs> {
    let json = std::fs::read_to_string(path)?;
    inputs_from_json(&json)
}

fn solve_request_from_payload(
    payload: SolvePayload,
) -> ProjectionResult<(ProjectionInputs, GoalSolveConfig)> {
    let inputs = inputs_from_payload(payload.inputs)?;
    let config = GoalSolveConfig {
        goal_type: payload.goal,
        target_month: payload.target_month,
        search_min: payload.search_min.unwrap_or(DEFAULT_SEARCH_MIN),
        search_max: payload.search_max.unwrap_or(DEFAULT_SEARCH_MAX),
        tolerance: payload.tolerance.unwrap_or(DEFAULT_TOLERANCE),
        max_iterations: payload.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
    };
    Ok((inputs, config))
}

fn validate_inputs(inputs: &ProjectionInputs) -> ProjectionResult<()> {
    let params = &inputs.parameters;
    let invalid = |msg: String| Err(ProjectionError::InvalidInput(msg));

    for (name, value) in [
        ("customTaxRate", params.custom_tax_rate),
        ("apiCostPct", params.api_cost_pct),
        ("churnRate", params.churn_rate),
        ("cacPct", params.cac_pct),
        ("implementationPct", params.implementation_pct),
        ("partnerCommissionRate", params.partner_commission_rate),
        ("directSalesPct", params.direct_sales_pct),
        ("directMarketingPct", params.direct_marketing_pct),
        ("carryoverPct", params.carryover_pct),
        ("directChannelPct", params.direct_channel_pct),
        (
            "policy.payrollDevelopmentShare",
            params.policy.payroll_development_share,
        ),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return invalid(format!("{name} must be between 0 and 100"));
        }
    }

    for (name, value) in [
        ("usageRate", params.usage_rate),
        ("implementationCostCap", params.implementation_cost_cap),
        ("integrationPrice", params.integration_price),
        ("directLeadCost", params.direct_lead_cost),
        ("partnerLeadCost", params.partner_lead_cost),
        ("overagePrice", params.overage_price),
        ("policy.ltvCapMonths", params.policy.ltv_cap_months),
    ] {
        if !value.is_finite() || value < 0.0 {
            return invalid(format!("{name} must be >= 0"));
        }
    }

    for (name, series) in [("payrollA", &params.payroll_a), ("payrollB", &params.payroll_b)] {
        if series.len() > MONTHS {
            return invalid(format!("{name} must have at most {MONTHS} entries"));
        }
        if series.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return invalid(format!("{name} entries must be >= 0"));
        }
    }

    if params.tiers.is_empty() {
        return invalid("tiers must not be empty".to_string());
    }
    let mut seen = HashSet::new();
    for tier in params.tiers.iter() {
        if tier.id.trim().is_empty() {
            return invalid("tier id must not be empty".to_string());
        }
        if !seen.insert(tier.id.as_str()) {
            return invalid(format!("tier id '{}' is duplicated", tier.id));
        }
        if !tier.price.is_finite() || tier.price < 0.0 {
            return invalid(format!("tier '{}' price must be >= 0", tier.id));
        }
        if !tier.message_quota.is_finite() || tier.message_quota < 0.0 {
            return invalid(format!("tier '{}' messageQuota must be >= 0", tier.id));
        }
        if let Some(price) = tier.integration_price {
            if !price.is_finite() || price < 0.0 {
                return invalid(format!("tier '{}' integrationPrice must be >= 0", tier.id));
            }
        }
    }

    for (tier_id, series) in &inputs.inflow.per_tier {
        if params.tiers.get(tier_id).is_none() {
            return invalid(format!("inflow names unknown tier '{tier_id}'"));
        }
        if series.len() > MONTHS {
            return invalid(format!(
                "inflow for '{tier_id}' must have at most {MONTHS} entries"
            ));
        }
    }

    for (category, offer) in inputs.upsell.offers() {
        if !(0.0..=100.0).contains(&offer.rate) {
            return invalid(format!("upsell {category:?} rate must be between 0 and 100"));
        }
        if !offer.price.is_finite() || offer.price < 0.0 {
            return invalid(format!("upsell {category:?} price must be >= 0"));
        }
    }

    Ok(())
}

fn build_projection_response(inputs: &ProjectionInputs) -> ProjectionResponse {
    let projection = run_projection(&inputs.parameters, &inputs.inflow, &inputs.upsell);
    ProjectionResponse {
        tax_rate: inputs.parameters.tax_rate(),
        policy: inputs.parameters.policy,
        months: projection.months,
        summary: projection.summary,
    }
}

pub fn projection_json(inputs: &ProjectionInputs, pretty: bool) -> ProjectionResult<String> {
    let response = build_projection_response(inputs);
    let json = if pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    Ok(json)
}

pub fn solve_json(
    inputs: &ProjectionInputs,
    config: GoalSolveConfig,
    pretty: bool,
) -> ProjectionResult<String> {
    let result = solve_goal(&inputs.parameters, &inputs.inflow, &inputs.upsell, config)?;
    let json = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    Ok(json)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliGoalType {
    InflowScale,
    PriceScale,
    PayrollScale,
}

impl From<CliGoalType> for GoalType {
    fn from(value: CliGoalType) -> Self {
        match value {
            CliGoalType::InflowScale => GoalType::InflowScale,
            CliGoalType::PriceScale => GoalType::PriceScale,
            CliGoalType::PayrollScale => GoalType::PayrollScale,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "saas-projection",
    about = "12-month revenue, cost and profit projection for a tiered messaging subscription business"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Run the projection and print months plus summary as JSON.
    Project {
        #[arg(long, help = "JSON payload overriding the default inputs")]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Search for the scale factor that reaches breakeven by a target month.
    Solve {
        #[arg(long, value_enum)]
        goal: CliGoalType,
        #[arg(long, help = "Latest acceptable breakeven month, 1-12")]
        target_month: u32,
        #[arg(long, default_value_t = DEFAULT_SEARCH_MIN)]
        search_min: f64,
        #[arg(long, default_value_t = DEFAULT_SEARCH_MAX)]
        search_max: f64,
        #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f64,
        #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
        max_iterations: u32,
        #[arg(long, help = "JSON payload overriding the default inputs")]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn load_inputs(input: Option<&Path>) -> ProjectionResult<ProjectionInputs> {
    match input {
        Some(path) => inputs_from_file(path),
        None => {
            let inputs = default_inputs();
            validate_inputs(&inputs)?;
            Ok(inputs)
        }
    }
}

/// Parses the process arguments and runs the selected command.
pub async fn run_cli() -> ProjectionResult<()> {
    match Cli::parse().command {
        CliCommand::Project { input, pretty } => {
            let inputs = load_inputs(input.as_deref())?;
            println!("{}", projection_json(&inputs, pretty)?);
        }
        CliCommand::Solve {
            goal,
            target_month,
            search_min,
            search_max,
            tolerance,
            max_iterations,
            input,
            pretty,
        } => {
            let inputs = load_inputs(input.as_deref())?;
            let config = GoalSolveConfig {
                goal_type: goal.into(),
                target_month,
                search_min,
                search_max,
                tolerance,
                max_iterations,
            };
            println!("{}", solve_json(&inputs, config, pretty)?);
        }
        CliCommand::Serve { port } => run_http_server(port).await?,
    }
    Ok(())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/defaults", get(defaults_handler))
        .route("/api/project", post(project_post_handler))
        .route("/api/solve", post(solve_post_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    log::info!("projection HTTP API listening on http://{addr}");
    log::info!("local access: http://127.0.0.1:{port}/api/defaults");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn defaults_handler() -> Response {
    let inputs = default_inputs();
    json_response(
        StatusCode::OK,
        DefaultsResponse {
            parameters: &inputs.parameters,
            inflow: &inputs.inflow,
            upsell: &inputs.upsell,
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_post_handler(Json(payload): Json<ProjectionPayload>) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(e) => {
            log::warn!("rejected projection request: {e}");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };
    json_response(StatusCode::OK, build_projection_response(&inputs))
}

async fn solve_post_handler(Json(payload): Json<SolvePayload>) -> Response {
    let result = solve_request_from_payload(payload).and_then(|(inputs, config)| {
        solve_goal(&inputs.parameters, &inputs.inflow, &inputs.upsell, config)
    });
    match result {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(e) => {
            log::warn!("rejected solve request: {e}");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
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
