use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

use super::Session;
use crate::cache::{ResultCache, simulate_monthly_cash_cached};
use crate::core::{
    CashGoal, Company, SimulationOutputs, SimulationRequest, SimulationSummary, cash_goal,
    summarize,
};
use crate::error::{ModelError, Result};

const MAX_UNIVERSES: u32 = 100_000;
const MAX_MONTHS: usize = 120;

#[derive(Clone)]
pub(crate) struct AppState {
    company: Arc<Company>,
    cache: Arc<dyn ResultCache>,
    defaults: SimulationRequest,
}

impl AppState {
    fn from_session(session: Session) -> Self {
        Self {
            company: Arc::new(session.company),
            cache: Arc::from(session.cache),
            defaults: session.request,
        }
    }
}

/// Optional overrides of the server's default request.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct SimulatePayload {
    n_months: Option<usize>,
    n_universes: Option<u32>,
    seed: Option<u64>,
    ontime_payment: Option<bool>,
    ontime_completion: Option<bool>,
    raw: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    n_months: usize,
    n_universes: u32,
    seed: u64,
    summary: SimulationSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    outputs: Option<SimulationOutputs>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub async fn run_http_server(session: Session, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(AppState::from_session(session));

    let listener = TcpListener::bind(addr).await.map_err(ModelError::Server)?;
    info!(%addr, "runway HTTP API listening");

    axum::serve(listener, app).await.map_err(ModelError::Server)
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/cash-goal", get(cash_goal_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_handler_impl(state: AppState, payload: SimulatePayload) -> Response {
    let raw = payload.raw.unwrap_or(false);
    let request = match request_from_payload(&state.defaults, payload) {
        Ok(request) => request,
        Err(err) => return model_error_response(&err),
    };

    let result = run_blocking(move || {
        let outputs =
            simulate_monthly_cash_cached(&state.company, &request, state.cache.as_ref())?;
        Ok(SimulateResponse {
            n_months: request.n_months,
            n_universes: request.n_universes,
            seed: request.seed,
            summary: summarize(&state.company, &outputs),
            outputs: raw.then_some(outputs),
        })
    })
    .await;

    match result {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => model_error_response(&err),
    }
}

async fn cash_goal_handler(State(state): State<AppState>) -> Response {
    let result: Result<CashGoal> = run_blocking(move || cash_goal(&state.company)).await;
    match result {
        Ok(goal) => json_response(StatusCode::OK, goal),
        Err(err) => model_error_response(&err),
    }
}

/// Simulations are CPU-bound, so they run off the async workers.
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        ModelError::Server(std::io::Error::other(format!("simulation task failed: {err}")))
    })?
}

fn request_from_payload(
    defaults: &SimulationRequest,
    payload: SimulatePayload,
) -> Result<SimulationRequest> {
    let mut request = SimulationRequest {
        verbose: false,
        ..*defaults
    };
    if let Some(v) = payload.n_months {
        request.n_months = v;
    }
    if let Some(v) = payload.n_universes {
        request.n_universes = v;
    }
    if let Some(v) = payload.seed {
        request.seed = v;
    }
    if let Some(v) = payload.ontime_payment {
        request.ontime_payment = v;
    }
    if let Some(v) = payload.ontime_completion {
        request.ontime_completion = v;
    }

    request.validate()?;
    if request.n_universes > MAX_UNIVERSES {
        return Err(ModelError::invalid(
            "n_universes",
            format!("must be <= {MAX_UNIVERSES}"),
        ));
    }
    if request.n_months > MAX_MONTHS {
        return Err(ModelError::invalid(
            "n_months",
            format!("must be <= {MAX_MONTHS}"),
        ));
    }
    Ok(request)
}

fn status_for(err: &ModelError) -> StatusCode {
    match err {
        ModelError::InvalidParameter { .. } | ModelError::LengthMismatch { .. } => {
            StatusCode::BAD_REQUEST
        }
        err if err.is_data_integrity() => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn model_error_response(err: &ModelError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        error!(%err, "request failed");
    }
    error_response(status, &err.to_string())
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
