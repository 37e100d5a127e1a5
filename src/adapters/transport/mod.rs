//! HTTP transport adapters for backend API calls.

mod mock_transport;
mod reqwest_transport;

pub use mock_transport::{MockHttpTransport, MockReply};
pub use reqwest_transport::{ReqwestTransport, ReqwestTransportConfig};
