//! HTTP ingress: webhook, health, and status endpoints.

mod controller;
mod request;
mod response;

pub use controller::{AppState, create_router};
pub use request::WebhookRequest;
pub use response::{ErrorResponse, HealthResponse, OutcomeBody, SignalResponse, StatusResponse};
