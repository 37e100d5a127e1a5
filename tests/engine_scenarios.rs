//! Integration tests for multi-turn flows driven through `AutomatonEngine`.
//!
//! Each scenario walks a realistic service turn by turn against in-memory
//! stores and a scripted backend, checking the screens and what ends up in
//! the session and in subscriber storage.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use ussd_gateway::adapters::memory::{InMemorySessionRepository, InMemoryStorageRepository};
use ussd_gateway::adapters::transport::{MockHttpTransport, MockReply};
use ussd_gateway::application::{
    ApiInvoker, AutomatonEngine, GenericStorageService, SessionManager, TurnResult,
};
use ussd_gateway::domain::automaton::{AutomatonDefinition, HttpMethod};

// =============================================================================
// Test Infrastructure
// =============================================================================

const PHONE: &str = "612345678";

struct Flow {
    engine: AutomatonEngine,
    sessions: Arc<SessionManager>,
    storage: Arc<GenericStorageService>,
    transport: MockHttpTransport,
    definition: AutomatonDefinition,
    session_id: String,
}

impl Flow {
    async fn start(definition: Value, session_id: &str) -> (Self, TurnResult) {
        Self::start_with_storage(
            definition,
            session_id,
            Arc::new(GenericStorageService::new(Arc::new(
                InMemoryStorageRepository::new(),
            ))),
        )
        .await
    }

    async fn start_with_storage(
        definition: Value,
        session_id: &str,
        storage: Arc<GenericStorageService>,
    ) -> (Self, TurnResult) {
        let definition: AutomatonDefinition = serde_json::from_value(definition).unwrap();
        let sessions = Arc::new(SessionManager::new(
            Arc::new(InMemorySessionRepository::new()),
            Duration::from_secs(300),
        ));
        let transport = MockHttpTransport::new();
        let api = Arc::new(
            ApiInvoker::new(Arc::new(transport.clone())).with_retry_backoff(Duration::ZERO),
        );
        let engine = AutomatonEngine::new(sessions.clone(), storage.clone(), api);

        let initial = definition.initial_state().unwrap().id.clone();
        let session = sessions
            .get_or_create(session_id, PHONE, &definition.service_code, &initial, None)
            .await
            .unwrap();
        let first = engine.start(&definition, &session).await.unwrap();

        let flow = Self {
            engine,
            sessions,
            storage,
            transport,
            definition,
            session_id: session_id.to_string(),
        };
        (flow, first)
    }

    async fn reply(&self, input: &str) -> TurnResult {
        let session = self
            .sessions
            .find_live(&self.session_id)
            .await
            .unwrap()
            .expect("session should still be live");
        let result = self
            .engine
            .execute_turn(&self.definition, &session, input)
            .await
            .unwrap();
        if !result.continue_session {
            self.sessions.end_session(&self.session_id).await.unwrap();
        }
        result
    }

    async fn data(&self) -> Value {
        self.sessions.session_data(&self.session_id).await.unwrap()
    }
}

fn transfer_service() -> Value {
    json!({
        "serviceCode": "TRANSFER",
        "serviceName": "Transfert d'argent",
        "apiConfig": {
            "baseUrl": "https://wallet.test/api",
            "headers": {"X-Channel": "USSD"}
        },
        "states": [
            {"id": "AMOUNT", "type": "INPUT", "isInitial": true, "storeAs": "amount",
             "message": "Montant à envoyer:",
             "validation": {"type": "NUMERIC", "min": 100, "max": 500000},
             "transitions": [
                {"condition": "VALID", "nextState": "RECIPIENT"},
                {"condition": "INVALID", "nextState": "AMOUNT", "message": "Montant entre 100 et 500000"}
             ]},
            {"id": "RECIPIENT", "type": "INPUT", "storeAs": "recipient",
             "message": "Numéro du bénéficiaire:",
             "validation": {"type": "PHONE"},
             "transitions": [{"condition": "VALID", "nextState": "CONFIRM"}]},
            {"id": "CONFIRM", "type": "MENU",
             "message": "Envoyer {{amount | currency}} au {{recipient}}?\n1. Confirmer\n2. Annuler",
             "transitions": [
                {"input": "1", "nextState": "SEND"},
                {"input": "2", "nextState": "CANCELLED"}
             ]},
            {"id": "SEND", "type": "PROCESSING",
             "action": {
                "type": "API_CALL", "method": "POST", "endpoint": "/transfers",
                "body": {"from": "{{phoneNumber}}", "to": "{{recipient}}", "amount": "{{amount}}"},
                "onSuccess": {"nextState": "DONE", "responseMapping": {"reference": "transfer.ref"}},
                "onError": {"nextState": "FAILED"}
             }},
            {"id": "DONE", "type": "FINAL",
             "message": "Transfert {{reference}} effectué",
             "action": {"type": "STORAGE_APPEND", "storageKey": "history",
                        "value": {"ref": "{{reference}}", "amount": "{{amount}}"}}},
            {"id": "FAILED", "type": "FINAL", "message": "Échec: {{errorMessage}}"},
            {"id": "CANCELLED", "type": "FINAL", "message": "Transfert annulé"}
        ]
    })
}

fn favourites_service() -> Value {
    json!({
        "serviceCode": "FAVS",
        "states": [
            {"id": "LOAD", "type": "PROCESSING", "isInitial": true,
             "action": {"type": "STORAGE_LOAD", "storageKey": "favourites", "storeAs": "favs"},
             "transitions": [{"condition": "SUCCESS", "nextState": "HOME"}]},
            {"id": "HOME", "type": "MENU",
             "message": "{{#each favs}}{{add @index 1}}. {{this}}\n{{else}}Aucun favori\n{{/each}}9. Ajouter",
             "transitions": [{"input": "9", "nextState": "ADD"}]},
            {"id": "ADD", "type": "INPUT", "storeAs": "name", "message": "Nom du favori:",
             "validation": {"type": "NAME"},
             "transitions": [{"condition": "VALID", "nextState": "SAVED"}],
             "postActions": [{"type": "STORAGE_APPEND", "storageKey": "favourites", "storeAs": "name"}]},
            {"id": "SAVED", "type": "FINAL", "message": "{{name | capitalize}} ajouté"}
        ]
    })
}

// =============================================================================
// Transfer flow
// =============================================================================

#[tokio::test]
async fn transfer_flow_collects_inputs_calls_backend_and_records_history() {
    let (flow, first) = Flow::start(transfer_service(), "tx-1").await;
    assert_eq!(first.message, "Montant à envoyer:");
    assert!(first.continue_session);

    let rejected = flow.reply("50").await;
    assert_eq!(
        rejected.message,
        "Montant à envoyer:\n\nMontant entre 100 et 500000"
    );

    let next = flow.reply("5000").await;
    assert_eq!(next.message, "Numéro du bénéficiaire:");

    let confirm = flow.reply("699001122").await;
    assert_eq!(
        confirm.message,
        "Envoyer 5 000,00 FCFA au 699001122?\n1. Confirmer\n2. Annuler"
    );

    flow.transport
        .push_reply(MockReply::status(201, r#"{"transfer": {"ref": "TX-778"}}"#));
    let done = flow.reply("1").await;
    assert_eq!(done.message, "Transfert TX-778 effectué");
    assert!(!done.continue_session);

    let calls = flow.transport.get_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, HttpMethod::Post);
    assert_eq!(calls[0].url, "https://wallet.test/api/transfers");
    assert_eq!(calls[0].headers.get("X-Channel").map(String::as_str), Some("USSD"));
    assert_eq!(
        calls[0].body,
        Some(json!({"from": PHONE, "to": "699001122", "amount": "5000"}))
    );

    let history = flow
        .storage
        .load(PHONE, "TRANSFER", "history")
        .await
        .unwrap();
    assert_eq!(history, Some(json!([{"ref": "TX-778", "amount": "5000"}])));
}

#[tokio::test]
async fn transfer_backend_refusal_shows_backend_message() {
    let (flow, _) = Flow::start(transfer_service(), "tx-2").await;
    flow.reply("1500").await;
    flow.reply("677000000").await;

    flow.transport
        .push_reply(MockReply::status(422, r#"{"error": "Solde insuffisant"}"#));
    let failed = flow.reply("1").await;

    assert_eq!(failed.message, "Échec: Solde insuffisant");
    assert_eq!(failed.next_state_id, "FAILED");
    assert!(!failed.continue_session);
    assert_eq!(flow.data().await["errorMessage"], json!("Solde insuffisant"));
}

#[tokio::test]
async fn cancelling_never_reaches_backend() {
    let (flow, _) = Flow::start(transfer_service(), "tx-3").await;
    flow.reply("1500").await;
    flow.reply("677000000").await;

    let cancelled = flow.reply("2").await;
    assert_eq!(cancelled.message, "Transfert annulé");
    assert_eq!(flow.transport.call_count(), 0);
}

#[tokio::test]
async fn invalid_phone_keeps_subscriber_on_prompt() {
    let (flow, _) = Flow::start(transfer_service(), "tx-4").await;
    flow.reply("1500").await;

    let retry = flow.reply("12345").await;
    assert_eq!(
        retry.message,
        "Numéro du bénéficiaire:\n\n❌ Entrée invalide. Réessayez:"
    );
    assert_eq!(retry.next_state_id, "RECIPIENT");
    assert!(flow.data().await.get("recipient").is_none());
}

// =============================================================================
// Favourites flow (storage across sessions)
// =============================================================================

#[tokio::test]
async fn favourites_persist_across_sessions() {
    let storage = Arc::new(GenericStorageService::new(Arc::new(
        InMemoryStorageRepository::new(),
    )));

    let (flow, home) =
        Flow::start_with_storage(favourites_service(), "fav-1", storage.clone()).await;
    assert_eq!(home.message, "Aucun favori\n9. Ajouter");

    assert_eq!(flow.reply("9").await.message, "Nom du favori:");
    let saved = flow.reply("awa").await;
    assert_eq!(saved.message, "Awa ajouté");

    let (_, home_again) =
        Flow::start_with_storage(favourites_service(), "fav-2", storage.clone()).await;
    assert_eq!(home_again.message, "1. awa\n9. Ajouter");

    assert_eq!(
        storage.load(PHONE, "FAVS", "favourites").await.unwrap(),
        Some(json!(["awa"]))
    );
}
