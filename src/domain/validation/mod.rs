//! Validation of subscriber input collected by INPUT states.
//!
//! Input is trimmed before any check. Blank input always fails unless the
//! rule is optional. Length bounds are checked only once the input is valid
//! for its type, and report their own message.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::automaton::ValidationRule;

static NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-ZÀ-ÿ\s'-]{2,50}$").expect("name pattern"));
static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\+237)?[26][0-9]{8}$").expect("phone pattern"));
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9+_.-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email pattern")
});
static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(\.[0-9]{1,2})?$").expect("decimal pattern"));
static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("numeric pattern"));
static ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("alphanumeric pattern"));
static TEXT_BLOCKLIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>"'%;()&+]"#).expect("text blocklist"));

/// Declared type of an input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationType {
    Name,
    Phone,
    Email,
    Decimal,
    Numeric,
    Alphanumeric,
    #[default]
    Text,
    /// Placeholder for author-defined checks; validated as an email for now.
    Custom,
}

/// Reasons an input can be rejected, with the text shown to the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    Required,
    InvalidName,
    InvalidPhone,
    InvalidEmail,
    InvalidDecimal,
    InvalidNumeric,
    InvalidAlphanumeric,
    InvalidText,
    InvalidFormat,
    MinLength,
    MaxLength,
    OutOfRange,
}

impl ValidationErrorCode {
    pub fn message(&self) -> &'static str {
        match self {
            ValidationErrorCode::Required => "Ce champ est obligatoire",
            ValidationErrorCode::InvalidName => "Le nom doit contenir uniquement des lettres",
            ValidationErrorCode::InvalidPhone => {
                "Numéro de téléphone invalide (format: +237XXXXXXXXX ou 6XXXXXXXX)"
            }
            ValidationErrorCode::InvalidEmail => "Format d'email invalide",
            ValidationErrorCode::InvalidDecimal => "Veuillez entrer un nombre valide",
            ValidationErrorCode::InvalidNumeric => "Veuillez entrer uniquement des chiffres",
            ValidationErrorCode::InvalidAlphanumeric => {
                "Seuls les caractères alphanumériques sont autorisés"
            }
            ValidationErrorCode::InvalidText => "Caractères non autorisés détectés",
            ValidationErrorCode::InvalidFormat => "Format invalide",
            ValidationErrorCode::MinLength => "La longueur minimale n'est pas respectée",
            ValidationErrorCode::MaxLength => "La longueur maximale est dépassée",
            ValidationErrorCode::OutOfRange => "La valeur est hors des limites autorisées",
        }
    }
}

/// Verdict for one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub error_message: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error_message: None,
        }
    }

    pub fn error(code: ValidationErrorCode) -> Self {
        Self::error_with(code.message())
    }

    fn error_with(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error_message: Some(message.into()),
        }
    }
}

/// Stateless validator for subscriber input.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationService;

impl ValidationService {
    pub fn new() -> Self {
        Self
    }

    /// Validates `input` against a type and optional length bounds.
    pub fn validate(
        &self,
        input: &str,
        validation_type: ValidationType,
        min_length: Option<usize>,
        max_length: Option<usize>,
    ) -> ValidationResult {
        let value = input.trim();
        if value.is_empty() {
            return ValidationResult::error(ValidationErrorCode::Required);
        }

        if let Err(code) = check_type(value, validation_type) {
            return ValidationResult::error(code);
        }

        check_length(value, min_length, max_length)
    }

    /// Validates `input` against a full rule: type, length, pattern,
    /// numeric bounds and the optional flag.
    pub fn validate_rule(&self, input: &str, rule: &ValidationRule) -> ValidationResult {
        let value = input.trim();
        if value.is_empty() && rule.optional {
            return ValidationResult::ok();
        }

        let result = self.validate(value, rule.validation_type, rule.min_length, rule.max_length);
        if !result.valid {
            return result;
        }

        if let Some(pattern) = &rule.pattern {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(value) => {
                    return ValidationResult::error(ValidationErrorCode::InvalidFormat)
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "ignoring invalid validation pattern");
                }
            }
        }

        if rule.min.is_some() || rule.max.is_some() {
            if let Ok(number) = value.parse::<f64>() {
                let below = rule.min.is_some_and(|min| number < min);
                let above = rule.max.is_some_and(|max| number > max);
                if below || above {
                    return ValidationResult::error(ValidationErrorCode::OutOfRange);
                }
            }
        }

        ValidationResult::ok()
    }
}

fn check_type(value: &str, validation_type: ValidationType) -> Result<(), ValidationErrorCode> {
    let (valid, code) = match validation_type {
        ValidationType::Name => (NAME.is_match(value), ValidationErrorCode::InvalidName),
        ValidationType::Phone => (PHONE.is_match(value), ValidationErrorCode::InvalidPhone),
        ValidationType::Email | ValidationType::Custom => {
            (EMAIL.is_match(value), ValidationErrorCode::InvalidEmail)
        }
        ValidationType::Decimal => (DECIMAL.is_match(value), ValidationErrorCode::InvalidDecimal),
        ValidationType::Numeric => (NUMERIC.is_match(value), ValidationErrorCode::InvalidNumeric),
        ValidationType::Alphanumeric => (
            ALPHANUMERIC.is_match(value),
            ValidationErrorCode::InvalidAlphanumeric,
        ),
        ValidationType::Text => (
            !TEXT_BLOCKLIST.is_match(value),
            ValidationErrorCode::InvalidText,
        ),
    };
    if valid {
        Ok(())
    } else {
        Err(code)
    }
}

fn check_length(value: &str, min: Option<usize>, max: Option<usize>) -> ValidationResult {
    let length = value.chars().count();
    if let Some(min) = min {
        if length < min {
            return ValidationResult::error_with(format!(
                "{} ({} caractères)",
                ValidationErrorCode::MinLength.message(),
                min
            ));
        }
    }
    if let Some(max) = max {
        if length > max {
            return ValidationResult::error_with(format!(
                "{} ({} caractères)",
                ValidationErrorCode::MaxLength.message(),
                max
            ));
        }
    }
    ValidationResult::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn check(input: &str, t: ValidationType) -> bool {
        ValidationService::new().validate(input, t, None, None).valid
    }

    #[test]
    fn each_type_accepts_and_rejects() {
        let cases = [
            (ValidationType::Name, "Awa Ndiaye", "R2D2"),
            (ValidationType::Phone, "+237612345678", "12345"),
            (ValidationType::Email, "awa@example.cm", "awa@"),
            (ValidationType::Decimal, "150.25", "150.255"),
            (ValidationType::Numeric, "150", "abc"),
            (ValidationType::Alphanumeric, "ABC123", "ABC-123"),
            (ValidationType::Text, "Livraison rapide", "<script>"),
            (ValidationType::Custom, "awa@example.cm", "not-an-email"),
        ];
        for (t, valid, invalid) in cases {
            assert!(check(valid, t), "{t:?} should accept {valid:?}");
            assert!(!check(invalid, t), "{t:?} should reject {invalid:?}");
        }
    }

    #[test]
    fn accented_names_and_local_phones_are_valid() {
        assert!(check("Hélène d'Almeida", ValidationType::Name));
        assert!(check("612345678", ValidationType::Phone));
        assert!(check("212345678", ValidationType::Phone));
        assert!(!check("712345678", ValidationType::Phone));
    }

    #[test]
    fn non_ascii_digits_are_rejected() {
        assert!(!check("١٢٣", ValidationType::Numeric));
        assert!(!check("١٢.٥٠", ValidationType::Decimal));
        assert!(!check("6١٢٣٤٥٦٧٨", ValidationType::Phone));
        assert!(check("12.50", ValidationType::Decimal));
    }

    #[test]
    fn blank_input_is_required() {
        let result = ValidationService::new().validate("   ", ValidationType::Text, None, None);
        assert!(!result.valid);
        assert_eq!(result.error_message.as_deref(), Some("Ce champ est obligatoire"));
    }

    #[test]
    fn input_is_trimmed_before_checks() {
        assert!(check("  150 ", ValidationType::Numeric));
    }

    #[test]
    fn length_bounds_apply_after_type_check() {
        let service = ValidationService::new();

        let short = service.validate("12", ValidationType::Numeric, Some(4), None);
        assert_eq!(
            short.error_message.as_deref(),
            Some("La longueur minimale n'est pas respectée (4 caractères)")
        );

        let long = service.validate("123456", ValidationType::Numeric, None, Some(4));
        assert_eq!(
            long.error_message.as_deref(),
            Some("La longueur maximale est dépassée (4 caractères)")
        );

        // Type error wins over length error.
        let both = service.validate("ab", ValidationType::Numeric, Some(4), None);
        assert_eq!(
            both.error_message.as_deref(),
            Some("Veuillez entrer uniquement des chiffres")
        );
    }

    #[test]
    fn rule_optional_accepts_blank() {
        let rule = ValidationRule {
            validation_type: ValidationType::Email,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            pattern: None,
            optional: true,
        };
        assert!(ValidationService::new().validate_rule("", &rule).valid);
        assert!(!ValidationService::new().validate_rule("nope", &rule).valid);
    }

    #[test]
    fn rule_numeric_bounds_and_pattern() {
        let rule = ValidationRule {
            validation_type: ValidationType::Numeric,
            min_length: None,
            max_length: None,
            min: Some(100.0),
            max: Some(500.0),
            pattern: Some(r"^[1-9]\d*$".to_string()),
            optional: false,
        };
        let service = ValidationService::new();
        assert!(service.validate_rule("150", &rule).valid);
        assert!(!service.validate_rule("50", &rule).valid);
        assert!(!service.validate_rule("900", &rule).valid);
        assert_eq!(
            service.validate_rule("0150", &rule).error_message.as_deref(),
            Some("Format invalide")
        );
    }

    proptest! {
        #[test]
        fn digit_strings_are_numeric(s in "[0-9]{1,12}") {
            prop_assert!(check(&s, ValidationType::Numeric));
        }

        #[test]
        fn strings_with_letters_are_not_numeric(s in "[0-9]{0,5}[a-z][0-9a-z]{0,5}") {
            prop_assert!(!check(&s, ValidationType::Numeric));
        }
    }
}
