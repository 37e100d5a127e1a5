//! Outbound authentication for backend API calls.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

use crate::domain::automaton::{AuthType, AuthenticationConfig};
use crate::domain::template::TemplateEngine;

const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Headers and query parameters produced for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthParts {
    pub headers: HashMap<String, String>,
    pub query_params: Vec<(String, String)>,
}

/// Turns an authentication config into request headers or query params.
///
/// Credential values may contain `{{key}}` placeholders, resolved against
/// the session data of the call.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationHandler {
    templates: TemplateEngine,
}

impl AuthenticationHandler {
    pub fn new() -> Self {
        Self {
            templates: TemplateEngine::new(),
        }
    }

    pub fn build(&self, auth: Option<&AuthenticationConfig>, context: &Value) -> AuthParts {
        let mut parts = AuthParts::default();
        let Some(auth) = auth else {
            return parts;
        };
        let credential = |key: &str| {
            auth.credentials
                .get(key)
                .map(|raw| self.templates.render(raw, context))
                .filter(|v| !v.is_empty())
        };

        match auth.auth_type {
            AuthType::None => {}
            AuthType::Basic => match (credential("username"), credential("password")) {
                (Some(user), Some(password)) => {
                    let encoded = STANDARD.encode(format!("{}:{}", user, password));
                    parts
                        .headers
                        .insert("Authorization".to_string(), format!("Basic {}", encoded));
                }
                _ => tracing::warn!("basic authentication configured without username/password"),
            },
            AuthType::Bearer => match credential("token") {
                Some(token) => {
                    parts
                        .headers
                        .insert("Authorization".to_string(), format!("Bearer {}", token));
                }
                None => tracing::warn!("bearer authentication configured without token"),
            },
            AuthType::ApiKey => {
                let Some(key) = credential("apiKey").or_else(|| credential("key")) else {
                    tracing::warn!("api key authentication configured without apiKey");
                    return parts;
                };
                if let Some(param) = credential("paramName") {
                    parts.query_params.push((param, key));
                } else if let Some(header) = credential("headerName") {
                    parts.headers.insert(header, key);
                } else if let Some((header, value)) = key.split_once(':') {
                    parts
                        .headers
                        .insert(header.trim().to_string(), value.trim().to_string());
                } else {
                    parts.headers.insert(DEFAULT_API_KEY_HEADER.to_string(), key);
                }
            }
        }
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(auth_type: AuthType, credentials: &[(&str, &str)]) -> AuthenticationConfig {
        AuthenticationConfig {
            auth_type,
            credentials: credentials
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn no_config_produces_nothing() {
        let parts = AuthenticationHandler::new().build(None, &json!({}));
        assert_eq!(parts, AuthParts::default());
    }

    #[test]
    fn basic_encodes_credentials() {
        let auth = config(AuthType::Basic, &[("username", "user"), ("password", "pass")]);
        let parts = AuthenticationHandler::new().build(Some(&auth), &json!({}));
        assert_eq!(
            parts.headers.get("Authorization").map(String::as_str),
            Some("Basic dXNlcjpwYXNz")
        );
    }

    #[test]
    fn bearer_resolves_placeholders() {
        let auth = config(AuthType::Bearer, &[("token", "{{authToken}}")]);
        let parts = AuthenticationHandler::new().build(Some(&auth), &json!({"authToken": "abc"}));
        assert_eq!(
            parts.headers.get("Authorization").map(String::as_str),
            Some("Bearer abc")
        );
    }

    #[test]
    fn bearer_with_unresolved_token_is_skipped() {
        let auth = config(AuthType::Bearer, &[("token", "{{authToken}}")]);
        let parts = AuthenticationHandler::new().build(Some(&auth), &json!({}));
        assert!(parts.headers.is_empty());
    }

    #[test]
    fn api_key_variants() {
        let handler = AuthenticationHandler::new();
        let ctx = json!({});

        let named = config(AuthType::ApiKey, &[("apiKey", "k1"), ("headerName", "X-Key")]);
        assert_eq!(
            handler.build(Some(&named), &ctx).headers.get("X-Key").map(String::as_str),
            Some("k1")
        );

        let packed = config(AuthType::ApiKey, &[("apiKey", "X-Token: k2")]);
        assert_eq!(
            handler.build(Some(&packed), &ctx).headers.get("X-Token").map(String::as_str),
            Some("k2")
        );

        let plain = config(AuthType::ApiKey, &[("apiKey", "k3")]);
        assert_eq!(
            handler.build(Some(&plain), &ctx).headers.get("X-API-Key").map(String::as_str),
            Some("k3")
        );

        let query = config(AuthType::ApiKey, &[("apiKey", "k4"), ("paramName", "api_key")]);
        let parts = handler.build(Some(&query), &ctx);
        assert!(parts.headers.is_empty());
        assert_eq!(parts.query_params, vec![("api_key".to_string(), "k4".to_string())]);
    }
}
