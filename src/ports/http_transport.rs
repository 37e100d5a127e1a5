//! HTTP transport port.
//!
//! The API invoker builds requests and classifies outcomes; the transport
//! only moves bytes. Timeouts are enforced by the caller.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::automaton::HttpMethod;

/// A fully rendered outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub query: Vec<(String, String)>,
    /// JSON body, present only for write verbs.
    pub body: Option<serde_json::Value>,
}

/// Raw response as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Faults that prevented a response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Other(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}
