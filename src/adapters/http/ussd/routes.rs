//! HTTP routes for the USSD endpoint.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{handle_ussd, health, UssdHandlers};

/// Creates the USSD router, mounted under `/api/ussd`.
pub fn ussd_routes(handlers: UssdHandlers) -> Router {
    Router::new()
        .route("/api/ussd", post(handle_ussd))
        .route("/api/ussd/health", get(health))
        .with_state(handlers)
}
