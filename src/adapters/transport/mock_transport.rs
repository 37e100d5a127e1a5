//! Mock HTTP transport for testing.
//!
//! Replies are consumed in order; once the queue is empty every call gets
//! `200 {}`. Every request is recorded for later inspection.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockHttpTransport::new()
//!     .with_reply(MockReply::status(503, ""))
//!     .with_reply(MockReply::ok(r#"{"balance": 5000}"#))
//!     .with_delay(Duration::from_millis(50));
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{HttpTransport, OutboundRequest, TransportError, TransportResponse};

/// A configured reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Response(TransportResponse),
    Error(TransportError),
}

impl MockReply {
    /// `200` with a JSON body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        MockReply::Response(TransportResponse {
            status,
            headers,
            body: body.into(),
        })
    }
}

/// Scriptable [`HttpTransport`].
#[derive(Debug, Clone, Default)]
pub struct MockHttpTransport {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    delay: Duration,
    calls: Arc<Mutex<Vec<OutboundRequest>>>,
}

impl MockHttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reply to the queue.
    pub fn with_reply(self, reply: MockReply) -> Self {
        self.push_reply(reply);
        self
    }

    /// Sets simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Adds a reply to a transport already shared with the code under test.
    pub fn push_reply(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Returns all recorded requests.
    pub fn get_calls(&self) -> Vec<OutboundRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn next_reply(&self) -> MockReply {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockReply::ok("{}"))
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_reply() {
            MockReply::Response(response) => Ok(response),
            MockReply::Error(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::automaton::HttpMethod;

    fn request() -> OutboundRequest {
        OutboundRequest {
            method: HttpMethod::Get,
            url: "https://api.test/x".to_string(),
            headers: HashMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn replies_in_order_then_defaults() {
        let transport = MockHttpTransport::new()
            .with_reply(MockReply::status(503, "down"))
            .with_reply(MockReply::Error(TransportError::Timeout));

        assert_eq!(transport.send(request()).await.unwrap().status, 503);
        assert_eq!(transport.send(request()).await, Err(TransportError::Timeout));
        assert_eq!(transport.send(request()).await.unwrap().body, "{}");
        assert_eq!(transport.call_count(), 3);
    }
}
