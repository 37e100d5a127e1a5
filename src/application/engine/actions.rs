//! Action execution: backend calls and generic storage operations.
//!
//! Backend and storage failures are reported as [`ActionOutcome::Failed`]
//! so the flow can branch on them. Only session-store failures propagate.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{AutomatonEngine, EngineError, TurnContext, ERROR_MESSAGE_KEY};
use crate::domain::automaton::{Action, ApiCallAction, StorageAction};
use crate::domain::foundation::DomainError;

/// Result of running one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ActionOutcome {
    Succeeded,
    Failed(String),
}

impl ActionOutcome {
    pub(crate) fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Succeeded)
    }
}

#[derive(Debug, Clone, Copy)]
enum StorageOp {
    Load,
    Save,
    Append,
    Delete,
}

impl AutomatonEngine {
    pub(super) async fn execute_action(
        &self,
        ctx: &TurnContext<'_>,
        action: &Action,
    ) -> Result<ActionOutcome, EngineError> {
        debug!(session_id = %ctx.session.id(), kind = action.kind(), "executing action");
        match action {
            Action::ApiCall(call) => self.call_api(ctx, call).await,
            Action::StorageSave(op) => self.run_storage(ctx, StorageOp::Save, op).await,
            Action::StorageLoad(op) => self.run_storage(ctx, StorageOp::Load, op).await,
            Action::StorageAppend(op) => self.run_storage(ctx, StorageOp::Append, op).await,
            Action::StorageDelete(op) => self.run_storage(ctx, StorageOp::Delete, op).await,
            Action::Noop => Ok(ActionOutcome::Succeeded),
        }
    }

    /// Runs pre- or post-actions in order. Failures are logged and do not
    /// stop the list.
    pub(super) async fn run_actions(
        &self,
        ctx: &TurnContext<'_>,
        actions: &[Action],
    ) -> Result<(), EngineError> {
        for action in actions {
            if let ActionOutcome::Failed(reason) = self.execute_action(ctx, action).await? {
                warn!(
                    session_id = %ctx.session.id(),
                    kind = action.kind(),
                    reason = %reason,
                    "side action failed"
                );
            }
        }
        Ok(())
    }

    async fn call_api(
        &self,
        ctx: &TurnContext<'_>,
        call: &ApiCallAction,
    ) -> Result<ActionOutcome, EngineError> {
        let session_id = ctx.session.id();
        let data = self.sessions.session_data(session_id).await?;
        let response = self
            .api
            .invoke(ctx.definition.api_config.as_ref(), call, &data)
            .await;

        if response.is_success() {
            let mapping = call
                .on_success
                .as_ref()
                .and_then(|r| r.response_mapping.as_ref());
            if let Some(mapping) = mapping {
                let extracted: Map<String, Value> = mapping
                    .iter()
                    .map(|(key, path)| {
                        let value = response.extract(path).unwrap_or_else(|| {
                            debug!(key = %key, path = %path, "response path not found");
                            Value::Null
                        });
                        (key.clone(), value)
                    })
                    .collect();
                self.sessions.store_batch_data(session_id, extracted).await?;
            }
            return Ok(ActionOutcome::Succeeded);
        }

        let message = response
            .error_detail()
            .or_else(|| call.on_error.as_ref().and_then(|r| r.message.clone()))
            .or_else(|| response.error_message.clone())
            .unwrap_or_else(|| self.config.api_failure_message.clone());
        warn!(
            session_id = %session_id,
            endpoint = %call.endpoint,
            status = ?response.status,
            error = %message,
            "API call failed"
        );
        self.sessions
            .store_session_data(session_id, ERROR_MESSAGE_KEY, Value::String(message.clone()))
            .await?;
        Ok(ActionOutcome::Failed(message))
    }

    async fn run_storage(
        &self,
        ctx: &TurnContext<'_>,
        op: StorageOp,
        action: &StorageAction,
    ) -> Result<ActionOutcome, EngineError> {
        let session = ctx.session;
        let data = self.sessions.session_data(session.id()).await?;
        let key = self.templates.render(action.storage_key.trim(), &data);
        if key.is_empty() {
            return Ok(ActionOutcome::Failed("storage key is empty".to_string()));
        }

        let (phone, service) = (session.phone_number(), session.service_code());
        let result: Result<(), DomainError> = match op {
            StorageOp::Load => match self.storage.load(phone, service, &key).await {
                Ok(found) => {
                    let target = action.store_as.as_deref().unwrap_or(&key);
                    self.sessions
                        .store_session_data(session.id(), target, found.unwrap_or(Value::Null))
                        .await?;
                    Ok(())
                }
                Err(e) => Err(e),
            },
            StorageOp::Save => {
                let value = self.storage_value(action, &data);
                self.storage.save(phone, service, &key, &value).await
            }
            StorageOp::Append => {
                let value = self.storage_value(action, &data);
                self.storage.append(phone, service, &key, &value).await
            }
            StorageOp::Delete => self.storage.delete(phone, service, &key).await,
        };

        match result {
            Ok(()) => Ok(ActionOutcome::Succeeded),
            Err(e) => {
                warn!(
                    session_id = %session.id(),
                    key = %key,
                    op = ?op,
                    error = %e,
                    "storage action failed"
                );
                Ok(ActionOutcome::Failed(e.message))
            }
        }
    }

    /// Explicit `value` rendered against session data, else the session
    /// entry named by `storeAs`, else null.
    fn storage_value(&self, action: &StorageAction, data: &Value) -> Value {
        if let Some(template) = &action.value {
            return self.templates.render_value(template, data);
        }
        action
            .store_as
            .as_deref()
            .and_then(|name| data.get(name))
            .cloned()
            .unwrap_or(Value::Null)
    }
}
