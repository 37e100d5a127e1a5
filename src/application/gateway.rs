//! UssdGateway - entry point for carrier requests.
//!
//! Resolves which session a request belongs to, routes first contact to the
//! main menu or a service, and hands continuations to the engine. Every
//! failure becomes the technical-error screen; the carrier always gets an
//! answer.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::engine::{AutomatonEngine, EngineError, TurnResult};
use crate::application::{ServiceRegistry, SessionManager};
use crate::config::EngineConfig;
use crate::domain::foundation::DomainError;
use crate::domain::session::Session;
use crate::ports::ServiceRecord;

/// One carrier request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UssdRequest {
    /// Carrier session id; when absent the subscriber's active session is used.
    pub session_id: Option<String>,
    pub phone_number: String,
    /// Dialled short code (`*123#`).
    pub service_code: String,
    pub text: String,
}

/// Screen returned to the carrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UssdResponse {
    pub message: String,
    pub continue_session: bool,
}

impl UssdResponse {
    pub fn proceed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            continue_session: true,
        }
    }

    pub fn end(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            continue_session: false,
        }
    }
}

impl From<TurnResult> for UssdResponse {
    fn from(result: TurnResult) -> Self {
        Self {
            message: result.message,
            continue_session: result.continue_session,
        }
    }
}

#[derive(Debug, Error)]
enum GatewayError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] DomainError),
}

/// Carrier-facing request handler.
pub struct UssdGateway {
    registry: Arc<ServiceRegistry>,
    sessions: Arc<SessionManager>,
    engine: Arc<AutomatonEngine>,
    config: EngineConfig,
    turn_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl UssdGateway {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        sessions: Arc<SessionManager>,
        engine: Arc<AutomatonEngine>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            sessions,
            engine,
            config,
            turn_locks: DashMap::new(),
        }
    }

    /// Handles one request. Never fails.
    pub async fn handle(&self, request: UssdRequest) -> UssdResponse {
        let session_id = match self.resolve_session_id(&request).await {
            Ok(id) => id,
            Err(e) => {
                error!(phone_number = %request.phone_number, error = %e, "cannot resolve session");
                return UssdResponse::end(self.config.technical_error_message.clone());
            }
        };

        let lock = self
            .config
            .serialize_turns
            .then(|| self.lock_for(&session_id));
        let guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let outcome = self.dispatch(&session_id, &request).await;

        drop(guard);
        drop(lock);
        self.turn_locks
            .remove_if(&session_id, |_, lock| Arc::strong_count(lock) == 1);

        match outcome {
            Ok(response) => response,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "turn failed");
                if let Err(end_err) = self.sessions.end_session(&session_id).await {
                    warn!(session_id = %session_id, error = %end_err, "could not end failed session");
                }
                UssdResponse::end(self.config.technical_error_message.clone())
            }
        }
    }

    /// Number of sessions with a turn in flight or queued.
    pub fn pending_turns(&self) -> usize {
        self.turn_locks.len()
    }

    async fn resolve_session_id(&self, request: &UssdRequest) -> Result<String, DomainError> {
        if let Some(id) = request.session_id.as_deref().map(str::trim) {
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }
        if let Some(active) = self
            .sessions
            .find_active_by_phone(&request.phone_number)
            .await?
        {
            return Ok(active.id().to_string());
        }
        Ok(Uuid::new_v4().to_string())
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.turn_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn dispatch(
        &self,
        session_id: &str,
        request: &UssdRequest,
    ) -> Result<UssdResponse, GatewayError> {
        if let Some(current) = self.sessions.find_live(session_id).await? {
            return self.continue_session(current, &request.text).await;
        }

        let dialled = request.service_code.trim();
        if let Some(inline) = self.main_menu_selection(dialled) {
            let choice = inline.unwrap_or_else(|| request.text.trim());
            return self.main_menu(session_id, &request.phone_number, choice).await;
        }

        match self.registry.service_by_short_code(dialled).await? {
            Some(record) => {
                self.start_service(session_id, &request.phone_number, &record)
                    .await
            }
            None => {
                info!(service_code = %dialled, "unknown short code");
                Ok(UssdResponse::end(
                    self.config.unknown_application_message.clone(),
                ))
            }
        }
    }

    async fn continue_session(
        &self,
        current: Session,
        text: &str,
    ) -> Result<UssdResponse, GatewayError> {
        let definition = self.registry.load_automaton(current.service_code()).await?;
        let session = self
            .sessions
            .touch(current.id(), definition.session_config.effective_timeout())
            .await?;

        let result = self.engine.execute_turn(&definition, &session, text).await?;
        self.finish(session.id(), result).await
    }

    async fn start_service(
        &self,
        session_id: &str,
        phone_number: &str,
        record: &ServiceRecord,
    ) -> Result<UssdResponse, GatewayError> {
        let definition = self.registry.load_automaton(&record.code).await?;
        let initial = definition
            .initial_state()
            .ok_or_else(|| EngineError::EmptyDefinition(record.code.clone()))?;

        let session = self
            .sessions
            .get_or_create(
                session_id,
                phone_number,
                &record.code,
                &initial.id,
                definition.session_config.effective_timeout(),
            )
            .await?;

        let result = self.engine.start(&definition, &session).await?;
        self.finish(session_id, result).await
    }

    async fn finish(
        &self,
        session_id: &str,
        result: TurnResult,
    ) -> Result<UssdResponse, GatewayError> {
        if !result.continue_session {
            self.sessions.end_session(session_id).await?;
        }
        Ok(result.into())
    }

    /// Matches the main menu code, either bare (`*500#`) or carrying an
    /// inline selection (`*500*2#`). The inner option holds the inline choice.
    fn main_menu_selection<'a>(&self, dialled: &'a str) -> Option<Option<&'a str>> {
        let code = self.config.main_menu_code.as_str();
        if dialled == code {
            return Some(None);
        }
        let prefix = code.strip_suffix('#')?;
        dialled
            .strip_prefix(prefix)?
            .strip_prefix('*')?
            .strip_suffix('#')
            .map(|choice| Some(choice.trim()))
    }

    /// Catalogue of active services. The menu holds no session of its own:
    /// the selection arrives as a new first-contact request.
    async fn main_menu(
        &self,
        session_id: &str,
        phone_number: &str,
        choice: &str,
    ) -> Result<UssdResponse, GatewayError> {
        let services = self.registry.active_services().await?;

        if choice.is_empty() {
            return Ok(UssdResponse::proceed(self.render_menu(&services)));
        }
        if choice == "0" {
            return Ok(UssdResponse::end(self.config.goodbye_message.clone()));
        }

        let selected = choice
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| services.get(index));
        match selected {
            Some(record) => {
                info!(session_id = %session_id, service_code = %record.code, "main menu selection");
                self.start_service(session_id, phone_number, record).await
            }
            None => Ok(UssdResponse::proceed(format!(
                "{}\n\n{}",
                self.render_menu(&services),
                self.config.invalid_option_message
            ))),
        }
    }

    fn render_menu(&self, services: &[ServiceRecord]) -> String {
        let mut menu = format!("{}\nChoisissez un service:\n\n", self.config.main_menu_title);
        for (index, service) in services.iter().enumerate() {
            menu.push_str(&format!("{}. {}\n", index + 1, service.name));
        }
        menu.push_str("0. Quitter");
        menu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryDefinitionStore, InMemorySessionRepository, InMemoryStorageRepository,
    };
    use crate::adapters::transport::MockHttpTransport;
    use crate::application::{ApiInvoker, GenericStorageService};
    use crate::domain::automaton::DEFAULT_MAX_MESSAGE_LENGTH;
    use std::time::Duration;

    const COUNTER: &str = r#"{
        "serviceCode": "COUNTER",
        "serviceName": "Compteur",
        "shortCode": "*123#",
        "states": [
            {"id": "MAIN", "type": "MENU", "isInitial": true, "message": "1. Suivant",
             "transitions": [{"input": "1", "nextState": "END"}]},
            {"id": "END", "type": "FINAL", "message": "Fin"}
        ]
    }"#;

    async fn gateway() -> (UssdGateway, Arc<SessionManager>) {
        let store = InMemoryDefinitionStore::new();
        store
            .register(&serde_json::from_str(COUNTER).unwrap())
            .await
            .unwrap();

        let sessions = Arc::new(SessionManager::new(
            Arc::new(InMemorySessionRepository::new()),
            Duration::from_secs(300),
        ));
        let storage = Arc::new(GenericStorageService::new(Arc::new(
            InMemoryStorageRepository::new(),
        )));
        let api = Arc::new(ApiInvoker::new(Arc::new(MockHttpTransport::new())));
        let engine = Arc::new(AutomatonEngine::new(sessions.clone(), storage, api));
        let registry = Arc::new(ServiceRegistry::new(
            Arc::new(store),
            DEFAULT_MAX_MESSAGE_LENGTH,
        ));
        let gateway = UssdGateway::new(registry, sessions.clone(), engine, EngineConfig::default());
        (gateway, sessions)
    }

    fn request(session_id: &str, code: &str, text: &str) -> UssdRequest {
        UssdRequest {
            session_id: Some(session_id.to_string()),
            phone_number: "612345678".to_string(),
            service_code: code.to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn short_code_starts_service_and_final_ends_session() {
        let (gateway, sessions) = gateway().await;

        let first = gateway.handle(request("s-1", "*123#", "")).await;
        assert_eq!(first, UssdResponse::proceed("1. Suivant"));

        let second = gateway.handle(request("s-1", "*123#", "1")).await;
        assert_eq!(second, UssdResponse::end("Fin"));
        assert!(sessions.find_live("s-1").await.unwrap().is_none());
        assert_eq!(gateway.pending_turns(), 0);
    }

    #[tokio::test]
    async fn unknown_short_code_is_rejected() {
        let (gateway, _) = gateway().await;
        let response = gateway.handle(request("s-1", "*999#", "")).await;
        assert_eq!(response, UssdResponse::end("UNKNOWN APPLICATION"));
    }

    #[tokio::test]
    async fn main_menu_lists_and_starts_services() {
        let (gateway, _) = gateway().await;

        let menu = gateway.handle(request("s-1", "*500#", "")).await;
        assert_eq!(
            menu.message,
            "🌐 USSD Gateway\nChoisissez un service:\n\n1. Compteur\n0. Quitter"
        );
        assert!(menu.continue_session);

        let started = gateway.handle(request("s-1", "*500#", "1")).await;
        assert_eq!(started, UssdResponse::proceed("1. Suivant"));
    }

    #[tokio::test]
    async fn main_menu_exit_and_invalid_choice() {
        let (gateway, _) = gateway().await;

        let bye = gateway.handle(request("s-1", "*500#", "0")).await;
        assert_eq!(bye, UssdResponse::end("Au revoir! 👋"));

        let invalid = gateway.handle(request("s-2", "*500#", "7")).await;
        assert!(invalid.continue_session);
        assert!(invalid.message.ends_with("❌ Option invalide. Réessayez."));
    }

    #[tokio::test]
    async fn inline_main_menu_selection_starts_service() {
        let (gateway, _) = gateway().await;
        let started = gateway.handle(request("s-1", "*500*1#", "")).await;
        assert_eq!(started, UssdResponse::proceed("1. Suivant"));

        let invalid = gateway.handle(request("s-2", "*500*9#", "")).await;
        assert!(invalid.message.starts_with("🌐 USSD Gateway"));
    }

    #[tokio::test]
    async fn missing_session_id_reuses_active_session() {
        let (gateway, _) = gateway().await;
        gateway.handle(request("s-1", "*123#", "")).await;

        let mut follow_up = request("", "*123#", "1");
        follow_up.session_id = None;
        let response = gateway.handle(follow_up).await;
        assert_eq!(response, UssdResponse::end("Fin"));
    }

    #[tokio::test]
    async fn broken_session_state_yields_technical_error() {
        let (gateway, sessions) = gateway().await;
        gateway.handle(request("s-1", "*123#", "")).await;
        sessions.update_current_state("s-1", "GHOST").await.unwrap();

        let response = gateway.handle(request("s-1", "*123#", "1")).await;
        assert_eq!(
            response,
            UssdResponse::end("❌ Erreur système. Veuillez réessayer plus tard.")
        );
        assert!(sessions.find_live("s-1").await.unwrap().is_none());
    }
}
