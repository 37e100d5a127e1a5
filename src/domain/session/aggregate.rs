//! Session aggregate entity.
//!
//! A session tracks one subscriber's walk through one service: the state
//! they are in and the data collected so far. It is created on first
//! contact, mutated on every transition and deactivated when the flow
//! ends, the subscriber hangs up, or the expiry sweep catches it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::Timestamp;

/// Session key under which the subscriber's phone number is exposed to templates.
pub const PHONE_NUMBER_KEY: &str = "phoneNumber";

/// Session aggregate.
///
/// # Invariants
///
/// - `id` is unique per carrier session
/// - `data` is always a JSON object
/// - an inactive session is never continued, only replaced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: String,
    phone_number: String,
    service_code: String,
    current_state_id: String,
    data: Map<String, Value>,
    is_active: bool,
    created_at: Timestamp,
    last_activity: Timestamp,
    expires_at: Timestamp,
}

impl Session {
    /// Create a new active session positioned on `initial_state_id`.
    pub fn new(
        id: impl Into<String>,
        phone_number: impl Into<String>,
        service_code: impl Into<String>,
        initial_state_id: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: id.into(),
            phone_number: phone_number.into(),
            service_code: service_code.into(),
            current_state_id: initial_state_id.into(),
            data: Map::new(),
            is_active: true,
            created_at: now,
            last_activity: now,
            expires_at: now.plus_secs(timeout_secs),
        }
    }

    /// Reconstitute a session from persistence.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        phone_number: String,
        service_code: String,
        current_state_id: String,
        data: Map<String, Value>,
        is_active: bool,
        created_at: Timestamp,
        last_activity: Timestamp,
        expires_at: Timestamp,
    ) -> Self {
        Self {
            id,
            phone_number,
            service_code,
            current_state_id,
            data,
            is_active,
            created_at,
            last_activity,
            expires_at,
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Accessors
    // ───────────────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    pub fn service_code(&self) -> &str {
        &self.service_code
    }

    pub fn current_state_id(&self) -> &str {
        &self.current_state_id
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn last_activity(&self) -> &Timestamp {
        &self.last_activity
    }

    pub fn expires_at(&self) -> &Timestamp {
        &self.expires_at
    }

    /// Active and not past its expiry at `now`.
    pub fn is_live(&self, now: &Timestamp) -> bool {
        self.is_active && now.is_before(&self.expires_at)
    }

    /// Data document with the phone number injected, as seen by templates.
    pub fn template_data(&self) -> Value {
        let mut data = self.data.clone();
        data.insert(
            PHONE_NUMBER_KEY.to_string(),
            Value::String(self.phone_number.clone()),
        );
        Value::Object(data)
    }

    // ───────────────────────────────────────────────────────────────
    // Mutations
    // ───────────────────────────────────────────────────────────────

    /// Record activity and push the expiry forward.
    pub fn touch(&mut self, timeout_secs: u64) {
        let now = Timestamp::now();
        self.last_activity = now;
        self.expires_at = now.plus_secs(timeout_secs);
    }

    pub fn move_to(&mut self, state_id: impl Into<String>) {
        self.current_state_id = state_id.into();
        self.last_activity = Timestamp::now();
    }

    /// Merge entries into the data document; later keys win.
    pub fn merge_data<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.data.extend(entries);
        self.last_activity = Timestamp::now();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.last_activity = Timestamp::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> Session {
        Session::new("s-1", "612345678", "BANK", "MAIN", 300)
    }

    #[test]
    fn new_session_is_active_at_initial_state() {
        let s = session();
        assert!(s.is_active());
        assert_eq!(s.current_state_id(), "MAIN");
        assert!(s.data().is_empty());
        assert!(s.is_live(&Timestamp::now()));
    }

    #[test]
    fn session_expires_after_timeout() {
        let s = session();
        assert!(!s.is_live(&Timestamp::now().plus_secs(301)));
    }

    #[test]
    fn merge_data_overwrites_existing_keys() {
        let mut s = session();
        s.merge_data([("amount".to_string(), json!(100))]);
        s.merge_data([
            ("amount".to_string(), json!(150)),
            ("currency".to_string(), json!("XAF")),
        ]);
        assert_eq!(s.data().get("amount"), Some(&json!(150)));
        assert_eq!(s.data().len(), 2);
    }

    #[test]
    fn template_data_injects_phone_number() {
        let mut s = session();
        s.merge_data([("name".to_string(), json!("Awa"))]);
        assert_eq!(
            s.template_data(),
            json!({"name": "Awa", "phoneNumber": "612345678"})
        );
        assert!(!s.data().contains_key(PHONE_NUMBER_KEY));
    }

    #[test]
    fn deactivated_session_is_not_live() {
        let mut s = session();
        s.deactivate();
        assert!(!s.is_live(&Timestamp::now()));
    }
}
