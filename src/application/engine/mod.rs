//! AutomatonEngine - executes one subscriber turn against a service definition.
//!
//! A turn resolves the session's current state, runs its pre-actions,
//! dispatches on the state type, then runs its post-actions. Navigation
//! persists the new state before rendering so a dropped connection never
//! leaves the session behind the screen the subscriber saw.
//!
//! # State types
//!
//! | Type         | Input handling                                           |
//! |--------------|----------------------------------------------------------|
//! | `MENU`       | match input against transition labels                    |
//! | `DISPLAY`    | same as `MENU`                                           |
//! | `INPUT`      | validate, store under `storeAs`, follow `VALID`          |
//! | `PROCESSING` | run the primary action, branch on its outcome            |
//! | `FINAL`      | run the optional action, render, end the session         |

mod actions;
mod errors;
pub mod matching;

pub use errors::EngineError;

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use self::actions::ActionOutcome;
use crate::application::{ApiInvoker, GenericStorageService, SessionManager};
use crate::config::EngineConfig;
use crate::domain::automaton::{
    Action, AutomatonDefinition, ReservedCondition, State, StateType, Transition,
};
use crate::domain::condition::ConditionalEvaluator;
use crate::domain::session::Session;
use crate::domain::template::{MessageRenderer, TemplateEngine};
use crate::domain::validation::{ValidationResult, ValidationService};

/// Session key holding the last backend error text.
pub const ERROR_MESSAGE_KEY: &str = "errorMessage";

/// What the subscriber sees after a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    pub message: String,
    pub continue_session: bool,
    pub next_state_id: String,
}

impl TurnResult {
    fn continue_at(message: String, state_id: &str) -> Self {
        Self {
            message,
            continue_session: true,
            next_state_id: state_id.to_string(),
        }
    }

    fn end_at(message: String, state_id: &str) -> Self {
        Self {
            message,
            continue_session: false,
            next_state_id: state_id.to_string(),
        }
    }
}

/// Definition and session identity shared by every step of a turn.
///
/// The session is only read for its id, phone number and service code;
/// data is always re-read through the [`SessionManager`].
struct TurnContext<'a> {
    definition: &'a AutomatonDefinition,
    session: &'a Session,
}

/// Interpreter for automaton definitions.
pub struct AutomatonEngine {
    sessions: Arc<SessionManager>,
    storage: Arc<GenericStorageService>,
    api: Arc<ApiInvoker>,
    renderer: MessageRenderer,
    templates: TemplateEngine,
    validator: ValidationService,
    conditions: ConditionalEvaluator,
    config: EngineConfig,
}

impl AutomatonEngine {
    pub fn new(
        sessions: Arc<SessionManager>,
        storage: Arc<GenericStorageService>,
        api: Arc<ApiInvoker>,
    ) -> Self {
        Self {
            sessions,
            storage,
            api,
            renderer: MessageRenderer::new(),
            templates: TemplateEngine::new(),
            validator: ValidationService::new(),
            conditions: ConditionalEvaluator::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// First screen of a freshly created session.
    ///
    /// `PROCESSING` and `FINAL` initial states execute immediately; any
    /// other initial state just renders its message.
    pub async fn start(
        &self,
        definition: &AutomatonDefinition,
        session: &Session,
    ) -> Result<TurnResult, EngineError> {
        let state = definition
            .initial_state()
            .ok_or_else(|| EngineError::EmptyDefinition(definition.service_code.clone()))?;
        let ctx = TurnContext {
            definition,
            session,
        };
        info!(
            session_id = %session.id(),
            service_code = %definition.service_code,
            state_id = %state.id,
            "entering service"
        );

        match state.state_type {
            StateType::Processing => self.auto_execute(&ctx, state, 1).await,
            StateType::Final => self.handle_final(&ctx, state).await,
            _ => {
                let message = self.render_state(&ctx, &state.message).await?;
                Ok(TurnResult::continue_at(message, &state.id))
            }
        }
    }

    /// Processes one subscriber input against the session's current state.
    pub async fn execute_turn(
        &self,
        definition: &AutomatonDefinition,
        session: &Session,
        input: &str,
    ) -> Result<TurnResult, EngineError> {
        let state = resolve_state(definition, session.current_state_id())?;
        let ctx = TurnContext {
            definition,
            session,
        };
        debug!(
            session_id = %session.id(),
            state_id = %state.id,
            state_type = %state.state_type,
            "executing turn"
        );

        self.run_actions(&ctx, &state.pre_actions).await?;

        let result = match state.state_type {
            StateType::Menu | StateType::Display => self.handle_menu(&ctx, state, input).await?,
            StateType::Input => self.handle_input(&ctx, state, input).await?,
            StateType::Processing => self.execute_processing(&ctx, state, 1).await?,
            StateType::Final => self.handle_final(&ctx, state).await?,
        };

        self.run_actions(&ctx, &state.post_actions).await?;

        info!(
            session_id = %session.id(),
            from = %state.id,
            to = %result.next_state_id,
            continue_session = result.continue_session,
            "turn completed"
        );
        Ok(result)
    }

    // ───────────────────────────────────────────────────────────────
    // State handlers
    // ───────────────────────────────────────────────────────────────

    async fn handle_menu(
        &self,
        ctx: &TurnContext<'_>,
        state: &State,
        input: &str,
    ) -> Result<TurnResult, EngineError> {
        if input.trim().is_empty() {
            let message = self.render_state(ctx, &state.message).await?;
            return Ok(TurnResult::continue_at(message, &state.id));
        }

        let Some(transition) = matching::find_input_transition(&state.transitions, input) else {
            debug!(session_id = %ctx.session.id(), state_id = %state.id, "invalid option");
            let message = self.render_state(ctx, &state.message).await?;
            return Ok(TurnResult::continue_at(
                format!("{}\n\n{}", message, self.config.invalid_option_message),
                &state.id,
            ));
        };

        if let (Some(value), Some(key)) = (&transition.value, &state.store_as) {
            self.sessions
                .store_session_data(ctx.session.id(), key, value.clone())
                .await?;
        }
        self.follow(ctx, transition, 0).await
    }

    async fn handle_input(
        &self,
        ctx: &TurnContext<'_>,
        state: &State,
        input: &str,
    ) -> Result<TurnResult, EngineError> {
        if let Some(transition) = matching::find_input_transition(&state.transitions, input) {
            return self.follow(ctx, transition, 0).await;
        }

        let verdict = match &state.validation {
            Some(rule) => self.validator.validate_rule(input, rule),
            None if input.trim().is_empty() => {
                let message = self.render_state(ctx, &state.message).await?;
                return Ok(TurnResult::continue_at(message, &state.id));
            }
            None => ValidationResult::ok(),
        };

        if !verdict.valid {
            debug!(
                session_id = %ctx.session.id(),
                state_id = %state.id,
                error = verdict.error_message.as_deref().unwrap_or_default(),
                "input rejected"
            );
            let message = self.render_state(ctx, &state.message).await?;
            let hint = state
                .transition_for(ReservedCondition::Invalid)
                .and_then(|t| t.message.as_deref())
                .unwrap_or(self.config.invalid_input_message.as_str());
            return Ok(TurnResult::continue_at(
                format!("{}\n\n{}", message, hint),
                &state.id,
            ));
        }

        if let Some(key) = &state.store_as {
            self.sessions
                .store_session_data(ctx.session.id(), key, Value::String(input.trim().to_string()))
                .await?;
        }

        let transition = state
            .transition_for(ReservedCondition::Valid)
            .ok_or_else(|| EngineError::missing_transition(&state.id, "VALID"))?;
        self.follow(ctx, transition, 0).await
    }

    /// Runs a PROCESSING state's primary logic; pre- and post-actions are
    /// the caller's business.
    async fn execute_processing(
        &self,
        ctx: &TurnContext<'_>,
        state: &State,
        depth: usize,
    ) -> Result<TurnResult, EngineError> {
        let Some(action) = state.effective_action() else {
            let data = self.sessions.session_data(ctx.session.id()).await?;
            let transition = self
                .first_true_expression(state, &data)
                .ok_or_else(|| EngineError::no_matching_condition(&state.id))?;
            return self.follow(ctx, transition, depth).await;
        };

        let outcome = self.execute_action(ctx, action).await?;
        let succeeded = outcome.is_success();

        let configured = match action {
            Action::ApiCall(call) => {
                let result = if succeeded { &call.on_success } else { &call.on_error };
                result.as_ref().and_then(|r| r.next_state.as_deref())
            }
            _ => None,
        };
        let reserved = if succeeded {
            ReservedCondition::Success
        } else {
            ReservedCondition::Error
        };
        let target = configured.or_else(|| {
            state
                .transition_for(reserved)
                .map(|t| t.next_state.as_str())
        });

        match (target, outcome) {
            (Some(target), _) => self.navigate(ctx, target, None, depth).await,
            (None, ActionOutcome::Succeeded) => {
                let data = self.sessions.session_data(ctx.session.id()).await?;
                match self.first_true_expression(state, &data) {
                    Some(transition) => self.follow(ctx, transition, depth).await,
                    None => Err(EngineError::missing_transition(&state.id, "SUCCESS")),
                }
            }
            (None, ActionOutcome::Failed(reason)) => {
                warn!(
                    session_id = %ctx.session.id(),
                    state_id = %state.id,
                    reason = %reason,
                    "action failed with no error route"
                );
                Ok(TurnResult::end_at(
                    self.config.api_failure_message.clone(),
                    &state.id,
                ))
            }
        }
    }

    /// Ends the session, running the state's action first when it has one.
    async fn handle_final(
        &self,
        ctx: &TurnContext<'_>,
        state: &State,
    ) -> Result<TurnResult, EngineError> {
        if let Some(action) = state.effective_action() {
            if let ActionOutcome::Failed(reason) = self.execute_action(ctx, action).await? {
                warn!(
                    session_id = %ctx.session.id(),
                    state_id = %state.id,
                    reason = %reason,
                    "final action failed"
                );
                return Ok(TurnResult::end_at(
                    self.config.api_failure_message.clone(),
                    &state.id,
                ));
            }
        }

        let message = self.render_state(ctx, &state.message).await?;
        Ok(TurnResult::end_at(message, &state.id))
    }

    // ───────────────────────────────────────────────────────────────
    // Navigation
    // ───────────────────────────────────────────────────────────────

    async fn follow(
        &self,
        ctx: &TurnContext<'_>,
        transition: &Transition,
        depth: usize,
    ) -> Result<TurnResult, EngineError> {
        self.navigate(ctx, &transition.next_state, transition.message.as_deref(), depth)
            .await
    }

    /// Moves the session to `target` and produces its screen.
    ///
    /// Boxed because PROCESSING targets execute immediately and may
    /// navigate again.
    fn navigate<'a>(
        &'a self,
        ctx: &'a TurnContext<'a>,
        target: &'a str,
        message_override: Option<&'a str>,
        depth: usize,
    ) -> BoxFuture<'a, Result<TurnResult, EngineError>> {
        async move {
            let state = resolve_state(ctx.definition, target)?;
            self.sessions
                .update_current_state(ctx.session.id(), &state.id)
                .await?;
            debug!(session_id = %ctx.session.id(), state_id = %state.id, "navigated");

            match state.state_type {
                StateType::Processing => self.auto_execute(ctx, state, depth + 1).await,
                StateType::Final => self.handle_final(ctx, state).await,
                _ => {
                    let template = message_override.unwrap_or(state.message.as_str());
                    let message = self.render_state(ctx, template).await?;
                    Ok(TurnResult::continue_at(message, &state.id))
                }
            }
        }
        .boxed()
    }

    /// Executes a PROCESSING state reached without subscriber input.
    async fn auto_execute(
        &self,
        ctx: &TurnContext<'_>,
        state: &State,
        depth: usize,
    ) -> Result<TurnResult, EngineError> {
        if depth > self.config.max_processing_chain {
            return Err(EngineError::ProcessingLoop {
                state_id: state.id.clone(),
                limit: self.config.max_processing_chain,
            });
        }

        self.run_actions(ctx, &state.pre_actions).await?;
        let result = self.execute_processing(ctx, state, depth).await?;
        self.run_actions(ctx, &state.post_actions).await?;
        Ok(result)
    }

    // ───────────────────────────────────────────────────────────────
    // Helpers
    // ───────────────────────────────────────────────────────────────

    fn first_true_expression<'s>(&self, state: &'s State, data: &Value) -> Option<&'s Transition> {
        state.transitions.iter().find(|t| {
            t.condition
                .as_ref()
                .and_then(|c| c.expression())
                .is_some_and(|expr| self.conditions.evaluate(expr, data))
        })
    }

    async fn render_state(
        &self,
        ctx: &TurnContext<'_>,
        template: &str,
    ) -> Result<String, EngineError> {
        let data = self.sessions.session_data(ctx.session.id()).await?;
        Ok(self.renderer.render(template, &data))
    }
}

fn resolve_state<'d>(
    definition: &'d AutomatonDefinition,
    state_id: &str,
) -> Result<&'d State, EngineError> {
    definition
        .state(state_id)
        .ok_or_else(|| EngineError::unknown_state(state_id))
}
