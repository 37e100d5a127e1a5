//! HTTP DTOs for the USSD endpoint.
//!
//! Field names follow the carrier contract (camelCase JSON).

use serde::{Deserialize, Serialize};

use crate::application::{UssdRequest, UssdResponse};

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// One carrier callback.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UssdRequestDto {
    #[serde(default)]
    pub session_id: Option<String>,
    pub service_code: String,
    pub phone_number: String,
    /// Subscriber input; absent or empty on first contact.
    #[serde(default)]
    pub text: Option<String>,
}

impl UssdRequestDto {
    /// Name of the first required field that is blank, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.phone_number.trim().is_empty() {
            Some("phoneNumber")
        } else if self.service_code.trim().is_empty() {
            Some("serviceCode")
        } else {
            None
        }
    }
}

impl From<UssdRequestDto> for UssdRequest {
    fn from(dto: UssdRequestDto) -> Self {
        Self {
            session_id: dto.session_id,
            phone_number: dto.phone_number.trim().to_string(),
            service_code: dto.service_code,
            text: dto.text.unwrap_or_default(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Screen returned to the carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UssdResponseDto {
    pub message: String,
    pub continue_session: bool,
}

impl From<UssdResponse> for UssdResponseDto {
    fn from(response: UssdResponse) -> Self {
        Self {
            message: response.message,
            continue_session: response.continue_session,
        }
    }
}

/// Liveness probe body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

impl HealthResponse {
    pub fn up() -> Self {
        Self { status: "UP" }
    }
}

/// Standard error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
        }
    }
}
