//! Actions attached to states: backend calls and subscriber-scoped storage.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A side effect a state performs, either as its primary action or as a
/// pre/post action around the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    ApiCall(ApiCallAction),
    StorageSave(StorageAction),
    StorageLoad(StorageAction),
    StorageAppend(StorageAction),
    StorageDelete(StorageAction),
    #[serde(rename = "NONE")]
    Noop,
}

impl Action {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::ApiCall(_) => "API_CALL",
            Action::StorageSave(_) => "STORAGE_SAVE",
            Action::StorageLoad(_) => "STORAGE_LOAD",
            Action::StorageAppend(_) => "STORAGE_APPEND",
            Action::StorageDelete(_) => "STORAGE_DELETE",
            Action::Noop => "NONE",
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Action::Noop)
    }
}

/// HTTP verb of an outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[serde(alias = "get")]
    Get,
    #[default]
    #[serde(alias = "post")]
    Post,
    #[serde(alias = "put")]
    Put,
    #[serde(alias = "patch")]
    Patch,
    #[serde(alias = "delete")]
    Delete,
}

impl HttpMethod {
    /// Only write verbs carry a request body.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// One call to the service's backend API.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallAction {
    #[serde(default)]
    pub method: HttpMethod,

    /// Endpoint template appended to the service base URL.
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Explicit body template; strings inside are rendered against session data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Body field name to session data path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_mapping: Option<BTreeMap<String, String>>,

    /// Per-call timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<ActionResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<ActionResult>,
}

/// Where to go, and what to keep, once an action has run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_state: Option<String>,

    /// Session key to response path (`"."` is the whole body).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mapping: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Parameters shared by the four storage actions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageAction {
    /// Storage key template, e.g. `favorites_{{category}}`.
    pub storage_key: String,

    /// Session key read from (writes) or written to (loads).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_as: Option<String>,

    /// Value template persisted by save/append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_call_parses_with_camel_case_fields() {
        let action: Action = serde_json::from_value(json!({
            "type": "API_CALL",
            "method": "GET",
            "endpoint": "/accounts/{{accountId}}",
            "timeout": 5,
            "onSuccess": {"nextState": "SHOW", "responseMapping": {"balance": "data.balance"}},
            "onError": {"nextState": "FAIL", "message": "Service indisponible"}
        }))
        .unwrap();

        let Action::ApiCall(call) = action else {
            panic!("expected API_CALL");
        };
        assert_eq!(call.method, HttpMethod::Get);
        assert_eq!(call.timeout, Some(5));
        let success = call.on_success.unwrap();
        assert_eq!(success.next_state.as_deref(), Some("SHOW"));
        assert_eq!(
            success.response_mapping.unwrap().get("balance").map(String::as_str),
            Some("data.balance")
        );
    }

    #[test]
    fn method_defaults_to_post() {
        let call: ApiCallAction = serde_json::from_value(json!({"endpoint": "/x"})).unwrap();
        assert_eq!(call.method, HttpMethod::Post);
        assert!(call.method.has_body());
        assert!(!HttpMethod::Get.has_body());
    }

    #[test]
    fn storage_variants_share_parameters() {
        let action: Action = serde_json::from_value(json!({
            "type": "STORAGE_APPEND",
            "storageKey": "todos",
            "value": {"title": "{{title}}"}
        }))
        .unwrap();
        assert_eq!(action.kind(), "STORAGE_APPEND");
        let Action::StorageAppend(storage) = action else {
            panic!("expected STORAGE_APPEND");
        };
        assert_eq!(storage.storage_key, "todos");
    }

    #[test]
    fn none_action_parses_as_noop() {
        let action: Action = serde_json::from_value(json!({"type": "NONE"})).unwrap();
        assert!(action.is_noop());
    }
}
