//! ApiInvoker - builds, sends and classifies backend calls of `API_CALL` actions.
//!
//! The invoker never fails: every outcome, including a malformed request,
//! comes back as an [`ExternalApiResponse`] the engine can branch on.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::domain::automaton::{ApiCallAction, ApiConfig};
use crate::domain::integration::{ApiResponseStatus, AuthenticationHandler, ExternalApiResponse};
use crate::domain::template::path::extract;
use crate::domain::template::TemplateEngine;
use crate::ports::{HttpTransport, OutboundRequest, TransportError};

const MAX_BACKOFF_SHIFT: u32 = 6;

/// Outbound API client used by the engine.
pub struct ApiInvoker {
    transport: Arc<dyn HttpTransport>,
    templates: TemplateEngine,
    auth: AuthenticationHandler,
    default_timeout: Duration,
    retry_backoff: Duration,
}

impl ApiInvoker {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            templates: TemplateEngine::new(),
            auth: AuthenticationHandler::new(),
            default_timeout: Duration::from_secs(30),
            retry_backoff: Duration::from_millis(200),
        }
    }

    /// Timeout used when neither the action nor the service sets one.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Base delay between retries; doubles on every attempt.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Performs the call described by `action` against the service API.
    ///
    /// Server errors, timeouts and network errors are retried
    /// `api_config.retry_attempts` times with exponential backoff.
    pub async fn invoke(
        &self,
        api_config: Option<&ApiConfig>,
        action: &ApiCallAction,
        session_data: &Value,
    ) -> ExternalApiResponse {
        let request = match self.build_request(api_config, action, session_data) {
            Ok(request) => request,
            Err(reason) => {
                warn!(endpoint = %action.endpoint, reason = %reason, "cannot build API request");
                return ExternalApiResponse::failure(
                    ApiResponseStatus::ClientError,
                    reason,
                    Duration::ZERO,
                );
            }
        };

        let timeout = action
            .timeout
            .or_else(|| api_config.and_then(|c| c.timeout))
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);
        let max_retries = api_config.map_or(0, |c| c.retry_attempts);

        let mut retry_count = 0;
        loop {
            let response = self.send_once(request.clone(), timeout).await;

            if response.is_success()
                || !response.status.is_retryable()
                || retry_count >= max_retries
            {
                info!(
                    method = request.method.as_str(),
                    url = %request.url,
                    status = ?response.status,
                    status_code = ?response.status_code,
                    duration_ms = response.duration.as_millis() as u64,
                    attempts = retry_count + 1,
                    "API call completed"
                );
                return response;
            }

            let delay = self.retry_backoff * (1u32 << retry_count.min(MAX_BACKOFF_SHIFT));
            warn!(
                url = %request.url,
                status = ?response.status,
                attempt = retry_count + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying API call"
            );
            sleep(delay).await;
            retry_count += 1;
        }
    }

    /// Resolves URL, headers, auth and body for one call.
    pub fn build_request(
        &self,
        api_config: Option<&ApiConfig>,
        action: &ApiCallAction,
        session_data: &Value,
    ) -> Result<OutboundRequest, String> {
        let url = self.build_url(api_config, action, session_data)?;

        let mut headers = HashMap::new();
        if let Some(config) = api_config {
            self.render_headers(&config.headers, session_data, &mut headers);
        }
        self.render_headers(&action.headers, session_data, &mut headers);

        let auth = self
            .auth
            .build(api_config.and_then(|c| c.authentication.as_ref()), session_data);
        headers.extend(auth.headers);

        let body = action
            .method
            .has_body()
            .then(|| self.build_body(action, session_data));

        Ok(OutboundRequest {
            method: action.method,
            url,
            headers,
            query: auth.query_params,
            body,
        })
    }

    async fn send_once(&self, request: OutboundRequest, timeout: Duration) -> ExternalApiResponse {
        let started = Instant::now();
        debug!(method = request.method.as_str(), url = %request.url, "sending API request");

        let outcome = tokio::time::timeout(timeout, self.transport.send(request)).await;
        let elapsed = started.elapsed();

        match outcome {
            Err(_) => ExternalApiResponse::failure(
                ApiResponseStatus::Timeout,
                format!("Request timed out after {}ms", timeout.as_millis()),
                elapsed,
            ),
            Ok(Err(TransportError::Timeout)) => ExternalApiResponse::failure(
                ApiResponseStatus::Timeout,
                "Request timed out",
                elapsed,
            ),
            Ok(Err(e)) => {
                ExternalApiResponse::failure(ApiResponseStatus::NetworkError, e.to_string(), elapsed)
            }
            Ok(Ok(response)) => ExternalApiResponse::from_http(
                response.status,
                response.body,
                response.headers,
                elapsed,
            ),
        }
    }

    fn build_url(
        &self,
        api_config: Option<&ApiConfig>,
        action: &ApiCallAction,
        session_data: &Value,
    ) -> Result<String, String> {
        let endpoint = self.templates.render(action.endpoint.trim(), session_data);
        if endpoint.is_empty() {
            return Err("API call has no endpoint".to_string());
        }
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Ok(endpoint);
        }

        let base = api_config
            .map(|c| self.templates.render(c.base_url.trim(), session_data))
            .unwrap_or_default();
        if base.is_empty() {
            return Err(format!("No base URL configured for endpoint {}", endpoint));
        }

        let base = base.trim_end_matches('/');
        if endpoint.starts_with('/') {
            Ok(format!("{}{}", base, endpoint))
        } else {
            Ok(format!("{}/{}", base, endpoint))
        }
    }

    fn render_headers(
        &self,
        source: &HashMap<String, String>,
        session_data: &Value,
        into: &mut HashMap<String, String>,
    ) {
        for (name, value) in source {
            into.insert(name.clone(), self.templates.render(value, session_data));
        }
    }

    /// Explicit body template, else the request mapping projection, else
    /// the whole session data.
    fn build_body(&self, action: &ApiCallAction, session_data: &Value) -> Value {
        if let Some(template) = &action.body {
            return match self.templates.render_value(template, session_data) {
                Value::String(text) => {
                    serde_json::from_str(&text).unwrap_or(Value::String(text))
                }
                other => other,
            };
        }

        if let Some(mapping) = &action.request_mapping {
            let projected: Map<String, Value> = mapping
                .iter()
                .map(|(field, path)| {
                    let value = extract(session_data, path).cloned().unwrap_or(Value::Null);
                    (field.clone(), value)
                })
                .collect();
            return Value::Object(projected);
        }

        session_data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::transport::{MockHttpTransport, MockReply};
    use crate::domain::automaton::{AuthType, AuthenticationConfig, HttpMethod};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn api_config(base_url: &str) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    fn call(method: HttpMethod, endpoint: &str) -> ApiCallAction {
        ApiCallAction {
            method,
            endpoint: endpoint.to_string(),
            ..Default::default()
        }
    }

    fn invoker(transport: MockHttpTransport) -> ApiInvoker {
        ApiInvoker::new(Arc::new(transport)).with_retry_backoff(Duration::from_millis(1))
    }

    #[test]
    fn url_joins_base_and_endpoint_with_single_slash() {
        let invoker = invoker(MockHttpTransport::new());
        let data = json!({"id": 7});
        for (base, endpoint) in [
            ("https://api.test/", "/accounts/{{id}}"),
            ("https://api.test", "accounts/{{id}}"),
            ("https://api.test/", "accounts/{{id}}"),
        ] {
            let request = invoker
                .build_request(Some(&api_config(base)), &call(HttpMethod::Get, endpoint), &data)
                .unwrap();
            assert_eq!(request.url, "https://api.test/accounts/7");
        }
    }

    #[test]
    fn missing_endpoint_or_base_is_rejected() {
        let invoker = invoker(MockHttpTransport::new());
        assert!(invoker
            .build_request(Some(&api_config("https://api.test")), &call(HttpMethod::Get, ""), &json!({}))
            .is_err());
        assert!(invoker
            .build_request(None, &call(HttpMethod::Get, "/x"), &json!({}))
            .is_err());
        assert!(invoker
            .build_request(None, &call(HttpMethod::Get, "https://other.test/x"), &json!({}))
            .is_ok());
    }

    #[test]
    fn get_has_no_body_and_post_sends_session_data() {
        let invoker = invoker(MockHttpTransport::new());
        let config = api_config("https://api.test");
        let data = json!({"amount": "150", "phoneNumber": "612345678"});

        let get = invoker
            .build_request(Some(&config), &call(HttpMethod::Get, "/x"), &data)
            .unwrap();
        assert!(get.body.is_none());

        let post = invoker
            .build_request(Some(&config), &call(HttpMethod::Post, "/x"), &data)
            .unwrap();
        assert_eq!(post.body, Some(data));
    }

    #[test]
    fn request_mapping_projects_session_fields() {
        let invoker = invoker(MockHttpTransport::new());
        let mut mapping = BTreeMap::new();
        mapping.insert("msisdn".to_string(), "phoneNumber".to_string());
        mapping.insert("city".to_string(), "address.city".to_string());
        mapping.insert("missing".to_string(), "nope".to_string());
        let action = ApiCallAction {
            request_mapping: Some(mapping),
            ..call(HttpMethod::Post, "/x")
        };
        let data = json!({"phoneNumber": "612345678", "address": {"city": "Douala"}});

        let request = invoker
            .build_request(Some(&api_config("https://api.test")), &action, &data)
            .unwrap();
        assert_eq!(
            request.body,
            Some(json!({"msisdn": "612345678", "city": "Douala", "missing": null}))
        );
    }

    #[test]
    fn body_template_keeps_value_types() {
        let invoker = invoker(MockHttpTransport::new());
        let action = ApiCallAction {
            body: Some(json!({"amount": "{{amount}}", "note": "Transfert {{amount}}"})),
            ..call(HttpMethod::Post, "/x")
        };
        let data = json!({"amount": 150});

        let request = invoker
            .build_request(Some(&api_config("https://api.test")), &action, &data)
            .unwrap();
        assert_eq!(
            request.body,
            Some(json!({"amount": 150, "note": "Transfert 150"}))
        );
    }

    #[test]
    fn headers_merge_service_action_then_auth() {
        let invoker = invoker(MockHttpTransport::new());
        let mut config = api_config("https://api.test");
        config.headers.insert("X-Channel".to_string(), "ussd".to_string());
        config.headers.insert("X-Trace".to_string(), "service".to_string());
        let mut credentials = HashMap::new();
        credentials.insert("token".to_string(), "abc".to_string());
        config.authentication = Some(AuthenticationConfig {
            auth_type: AuthType::Bearer,
            credentials,
        });
        let mut action = call(HttpMethod::Get, "/x");
        action
            .headers
            .insert("X-Trace".to_string(), "{{phoneNumber}}".to_string());

        let request = invoker
            .build_request(Some(&config), &action, &json!({"phoneNumber": "612345678"}))
            .unwrap();
        assert_eq!(request.headers.get("X-Channel").map(String::as_str), Some("ussd"));
        assert_eq!(request.headers.get("X-Trace").map(String::as_str), Some("612345678"));
        assert_eq!(
            request.headers.get("Authorization").map(String::as_str),
            Some("Bearer abc")
        );
    }

    #[tokio::test]
    async fn classifies_http_status() {
        let transport = MockHttpTransport::new()
            .with_reply(MockReply::status(404, r#"{"error": "Compte introuvable"}"#));
        let invoker = invoker(transport);

        let response = invoker
            .invoke(Some(&api_config("https://api.test")), &call(HttpMethod::Get, "/x"), &json!({}))
            .await;
        assert_eq!(response.status, ApiResponseStatus::ClientError);
        assert_eq!(response.error_detail().as_deref(), Some("Compte introuvable"));
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let transport = MockHttpTransport::new()
            .with_reply(MockReply::status(503, ""))
            .with_reply(MockReply::ok(r#"{"ok": true}"#));
        let invoker = invoker(transport.clone());
        let mut config = api_config("https://api.test");
        config.retry_attempts = 2;

        let response = invoker
            .invoke(Some(&config), &call(HttpMethod::Get, "/x"), &json!({}))
            .await;
        assert!(response.is_success());
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let transport = MockHttpTransport::new()
            .with_reply(MockReply::status(400, ""))
            .with_reply(MockReply::ok("{}"));
        let invoker = invoker(transport.clone());
        let mut config = api_config("https://api.test");
        config.retry_attempts = 3;

        let response = invoker
            .invoke(Some(&config), &call(HttpMethod::Get, "/x"), &json!({}))
            .await;
        assert_eq!(response.status, ApiResponseStatus::ClientError);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let transport = MockHttpTransport::new()
            .with_delay(Duration::from_secs(10))
            .with_reply(MockReply::ok("{}"));
        let invoker = ApiInvoker::new(Arc::new(transport));
        let action = ApiCallAction {
            timeout: Some(2),
            ..call(HttpMethod::Get, "/x")
        };

        let response = invoker
            .invoke(Some(&api_config("https://api.test")), &action, &json!({}))
            .await;
        assert_eq!(response.status, ApiResponseStatus::Timeout);
    }

    #[tokio::test]
    async fn transport_errors_map_to_status() {
        let transport = MockHttpTransport::new()
            .with_reply(MockReply::Error(TransportError::Connect("refused".to_string())))
            .with_reply(MockReply::Error(TransportError::Timeout));
        let invoker = invoker(transport);
        let config = api_config("https://api.test");
        let action = call(HttpMethod::Get, "/x");

        let first = invoker.invoke(Some(&config), &action, &json!({})).await;
        assert_eq!(first.status, ApiResponseStatus::NetworkError);
        let second = invoker.invoke(Some(&config), &action, &json!({})).await;
        assert_eq!(second.status, ApiResponseStatus::Timeout);
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_transport() {
        let transport = MockHttpTransport::new();
        let invoker = invoker(transport.clone());

        let response = invoker
            .invoke(None, &call(HttpMethod::Get, "/x"), &json!({}))
            .await;
        assert_eq!(response.status, ApiResponseStatus::ClientError);
        assert_eq!(transport.call_count(), 0);
    }
}
