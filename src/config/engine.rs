//! Conversation engine configuration
//!
//! Screen texts shown by the engine itself (as opposed to texts authored
//! in service definitions) live here so operators can localise them.

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::automaton::DEFAULT_MAX_MESSAGE_LENGTH;

/// Engine and gateway behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Dialed code that lists every active service
    #[serde(default = "default_main_menu_code")]
    pub main_menu_code: String,

    /// Title line of the main menu
    #[serde(default = "default_main_menu_title")]
    pub main_menu_title: String,

    /// Run turns of one session one at a time
    #[serde(default = "default_serialize_turns")]
    pub serialize_turns: bool,

    /// Longest chain of PROCESSING states executed in one turn
    #[serde(default = "default_max_processing_chain")]
    pub max_processing_chain: usize,

    /// Screen size used when checking definitions
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    #[serde(default = "default_invalid_option_message")]
    pub invalid_option_message: String,

    #[serde(default = "default_invalid_input_message")]
    pub invalid_input_message: String,

    #[serde(default = "default_technical_error_message")]
    pub technical_error_message: String,

    #[serde(default = "default_api_failure_message")]
    pub api_failure_message: String,

    #[serde(default = "default_unknown_application_message")]
    pub unknown_application_message: String,

    #[serde(default = "default_goodbye_message")]
    pub goodbye_message: String,
}

impl EngineConfig {
    /// Validate engine configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let code = self.main_menu_code.trim();
        if !code.starts_with('*') || !code.ends_with('#') {
            return Err(ValidationError::InvalidMainMenuCode);
        }
        if self.max_processing_chain == 0 || self.max_processing_chain > 100 {
            return Err(ValidationError::InvalidProcessingChain);
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            main_menu_code: default_main_menu_code(),
            main_menu_title: default_main_menu_title(),
            serialize_turns: default_serialize_turns(),
            max_processing_chain: default_max_processing_chain(),
            max_message_length: default_max_message_length(),
            invalid_option_message: default_invalid_option_message(),
            invalid_input_message: default_invalid_input_message(),
            technical_error_message: default_technical_error_message(),
            api_failure_message: default_api_failure_message(),
            unknown_application_message: default_unknown_application_message(),
            goodbye_message: default_goodbye_message(),
        }
    }
}

fn default_main_menu_code() -> String {
    "*500#".to_string()
}

fn default_main_menu_title() -> String {
    "🌐 USSD Gateway".to_string()
}

fn default_serialize_turns() -> bool {
    true
}

fn default_max_processing_chain() -> usize {
    16
}

fn default_max_message_length() -> usize {
    DEFAULT_MAX_MESSAGE_LENGTH
}

fn default_invalid_option_message() -> String {
    "❌ Option invalide. Réessayez.".to_string()
}

fn default_invalid_input_message() -> String {
    "❌ Entrée invalide. Réessayez:".to_string()
}

fn default_technical_error_message() -> String {
    "❌ Erreur système. Veuillez réessayer plus tard.".to_string()
}

fn default_api_failure_message() -> String {
    "❌ Service indisponible. Veuillez réessayer plus tard.".to_string()
}

fn default_unknown_application_message() -> String {
    "UNKNOWN APPLICATION".to_string()
}

fn default_goodbye_message() -> String {
    "Au revoir! 👋".to_string()
}
