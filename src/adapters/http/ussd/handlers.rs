//! HTTP handlers for the USSD endpoint.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, warn};

use crate::application::UssdGateway;

use super::dto::{ErrorResponse, HealthResponse, UssdRequestDto, UssdResponseDto};

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct UssdHandlers {
    gateway: Arc<UssdGateway>,
}

impl UssdHandlers {
    pub fn new(gateway: Arc<UssdGateway>) -> Self {
        Self { gateway }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /api/ussd - Handle one carrier callback
pub async fn handle_ussd(
    State(handlers): State<UssdHandlers>,
    Json(req): Json<UssdRequestDto>,
) -> Response {
    if let Some(field) = req.missing_field() {
        warn!(field, "rejecting USSD request with blank field");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request(format!("{} is required", field))),
        )
            .into_response();
    }

    debug!(
        service_code = %req.service_code,
        phone_number = %req.phone_number,
        "USSD request"
    );

    let response = handlers.gateway.handle(req.into()).await;
    (StatusCode::OK, Json(UssdResponseDto::from(response))).into_response()
}

/// GET /api/ussd/health - Liveness probe
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::up())
}
