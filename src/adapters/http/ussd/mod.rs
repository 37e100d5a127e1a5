//! HTTP adapter for the carrier-facing USSD endpoint.

mod dto;
mod handlers;
mod routes;

pub use dto::{ErrorResponse, HealthResponse, UssdRequestDto, UssdResponseDto};
pub use handlers::UssdHandlers;
pub use routes::ussd_routes;
