//! Integration module - outbound calls to service backends.

mod auth;
mod response;

pub use auth::{AuthParts, AuthenticationHandler};
pub use response::{ApiResponseStatus, ExternalApiResponse};
