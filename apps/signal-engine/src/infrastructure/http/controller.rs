//! HTTP Controller (Driver Adapter)
//!
//! Axum routes that delegate to the lifecycle executors. This layer only
//! decodes payloads and mirrors outcomes back as JSON; every decision
//! lives in the application layer.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::ports::BrokerPort;
use crate::application::{EngineError, EngineState, EntryExecutor, ManualExitExecutor};
use crate::domain::Instrument;

use super::request::WebhookRequest;
use super::response::{
    ErrorResponse, HealthResponse, OutcomeBody, SignalResponse, StatusResponse,
};

/// Application state shared across handlers.
pub struct AppState<B: BrokerPort> {
    /// Entry lifecycle executor.
    pub entry: Arc<EntryExecutor<B>>,
    /// Manual flatten executor.
    pub manual_exit: Arc<ManualExitExecutor<B>>,
    /// Shared ledgers, for the read-only status surface.
    pub engine: Arc<EngineState>,
    /// "paper" or "live", echoed in health and status bodies.
    pub environment: String,
}

impl<B: BrokerPort> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            entry: Arc::clone(&self.entry),
            manual_exit: Arc::clone(&self.manual_exit),
            engine: Arc::clone(&self.engine),
            environment: self.environment.clone(),
        }
    }
}

/// Create the HTTP router with all endpoints.
pub fn create_router<B: BrokerPort + 'static>(state: AppState<B>) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/status", get(status))
        .route("/webhook", post(webhook))
        .with_state(state)
}

async fn health<B: BrokerPort>(State(state): State<AppState<B>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        environment: state.environment.clone(),
    })
}

async fn status<B: BrokerPort>(State(state): State<AppState<B>>) -> impl IntoResponse {
    let risk = state.engine.risk.lock().await.snapshot();
    let monitored_instruments = state.engine.exits.lock().await.len();
    Json(StatusResponse {
        environment: state.environment.clone(),
        risk,
        monitored_instruments,
    })
}

async fn webhook<B: BrokerPort>(
    State(state): State<AppState<B>>,
    Json(request): Json<WebhookRequest>,
) -> Response {
    let instrument = match Instrument::parse(&request.ticker) {
        Ok(instrument) => instrument,
        Err(e) => return bad_request(e.to_string()),
    };
    let signal = request.signal.trim().to_uppercase();

    let result: Result<OutcomeBody, EngineError> = match signal.as_str() {
        "BUY" => state
            .entry
            .enter(instrument.clone(), request.price_hint)
            .await
            .map(OutcomeBody::from),
        "SELL" => state
            .manual_exit
            .exit(instrument.clone())
            .await
            .map(OutcomeBody::from),
        other => return bad_request(format!("unknown signal: {other}")),
    };

    match result {
        Ok(body) => Json(SignalResponse {
            ok: true,
            instrument: instrument.as_str().to_string(),
            signal,
            result: body,
        })
        .into_response(),
        Err(e) => {
            let code = match &e {
                EngineError::PriceUnavailable => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::Broker(_) => StatusCode::BAD_GATEWAY,
            };
            (
                code,
                Json(SignalResponse {
                    ok: false,
                    instrument: instrument.as_str().to_string(),
                    signal,
                    result: OutcomeBody::from(&e),
                }),
            )
                .into_response()
        }
    }
}

fn bad_request(error: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { ok: false, error }),
    )
        .into_response()
}
