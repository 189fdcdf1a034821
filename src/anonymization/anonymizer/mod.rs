//! Anonymization operators
//!
//! An [`Operator`] turns the text of one resolved span into its replacement.
//! [`OperatorConfig`] maps entity types to operators and carries the global
//! parameters (mask character, hash settings, encryption key...). Operator
//! names coming from configuration are resolved once, at load time.

pub mod age_bracket;
pub mod encryption;
pub mod hashing;
pub mod masking;

use crate::anonymization::models::{EntityType, Span};
use crate::config::{AnonymizationConfig, SecretString};
use crate::domain::{Result, VeilError};
use chrono::{Local, NaiveDate};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use encryption::{decrypt_value, ValueCipher, ENCRYPTED_PREFIX};
pub use hashing::HashAlgorithm;

/// Caller-supplied replacement function
pub type CustomFn = Arc<dyn Fn(&str, &EntityType) -> String + Send + Sync>;

/// Named custom replacement function
#[derive(Clone)]
pub struct CustomOperator {
    name: String,
    func: CustomFn,
}

impl CustomOperator {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str, &EntityType) -> String + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, text: &str, entity_type: &EntityType) -> String {
        (self.func)(text, entity_type)
    }
}

impl fmt::Debug for CustomOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomOperator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CustomOperator {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Registry of custom operators referenced as `custom:<name>` in configuration
#[derive(Debug, Clone, Default)]
pub struct CustomOperators {
    operators: HashMap<String, CustomOperator>,
}

impl CustomOperators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under `name`, replacing any previous one
    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&str, &EntityType) -> String + Send + Sync + 'static,
    {
        let operator = CustomOperator::new(name, func);
        self.operators.insert(operator.name.clone(), operator);
    }

    pub fn get(&self, name: &str) -> Option<&CustomOperator> {
        self.operators.get(name)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Transformation applied to a span
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// `<ENTITY_TYPE>`
    Replace,
    /// The redaction literal
    Redact,
    /// One mask character per source character
    Mask,
    /// Truncated hex digest
    Hash,
    /// AES-256-GCM token
    Encrypt,
    /// Age range such as `40-44`
    AgeBracket,
    /// Original text, still audited
    Keep,
    /// Caller function
    Custom(CustomOperator),
}

impl Operator {
    /// Resolve an operator name from configuration
    ///
    /// # Errors
    ///
    /// Unknown names and `custom:<name>` without a registered function are
    /// configuration errors.
    pub fn parse(name: &str, customs: &CustomOperators) -> Result<Self> {
        let trimmed = name.trim();
        if let Some(custom) = trimmed.strip_prefix("custom:") {
            return customs
                .get(custom.trim())
                .cloned()
                .map(Operator::Custom)
                .ok_or_else(|| {
                    VeilError::Configuration(format!(
                        "Custom operator '{}' is not registered",
                        custom.trim()
                    ))
                });
        }

        match trimmed.to_lowercase().as_str() {
            "replace" => Ok(Operator::Replace),
            "redact" => Ok(Operator::Redact),
            "mask" => Ok(Operator::Mask),
            "hash" => Ok(Operator::Hash),
            "encrypt" => Ok(Operator::Encrypt),
            "age_bracket" => Ok(Operator::AgeBracket),
            "keep" => Ok(Operator::Keep),
            _ => Err(VeilError::Configuration(format!(
                "Unknown operator '{trimmed}'. Must be one of: replace, redact, mask, hash, \
                 encrypt, age_bracket, keep, custom:<name>"
            ))),
        }
    }

    /// Name recorded in the audit trail
    pub fn name(&self) -> String {
        match self {
            Operator::Replace => "replace".to_string(),
            Operator::Redact => "redact".to_string(),
            Operator::Mask => "mask".to_string(),
            Operator::Hash => "hash".to_string(),
            Operator::Encrypt => "encrypt".to_string(),
            Operator::AgeBracket => "age_bracket".to_string(),
            Operator::Keep => "keep".to_string(),
            Operator::Custom(custom) => format!("custom:{}", custom.name()),
        }
    }
}

/// Global operator parameters
#[derive(Debug, Clone)]
pub struct OperatorParams {
    pub mask_char: char,
    pub mask_preserve: Vec<char>,
    pub mask_keep_first: bool,
    pub redaction_literal: String,
    pub hash_algorithm: HashAlgorithm,
    pub hash_length: usize,
    pub hash_salt: Option<SecretString>,
    pub age_bracket_size: u32,
    /// Reference date for ages; today when unset
    pub age_reference_date: Option<NaiveDate>,
    /// Record original values in the audit trail
    pub include_original: bool,
}

impl Default for OperatorParams {
    fn default() -> Self {
        Self {
            mask_char: '*',
            mask_preserve: masking::DEFAULT_PRESERVE.to_vec(),
            mask_keep_first: false,
            redaction_literal: "[REDACTED]".to_string(),
            hash_algorithm: HashAlgorithm::default(),
            hash_length: hashing::DEFAULT_HASH_LENGTH,
            hash_salt: None,
            age_bracket_size: age_bracket::DEFAULT_BRACKET_SIZE,
            age_reference_date: None,
            include_original: false,
        }
    }
}

/// Result of applying an operator to one span
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorOutcome {
    /// Replacement text
    Replaced(String),
    /// Operator could not apply; the span keeps its text
    Skipped(String),
}

/// Entity type to operator mapping plus global parameters
///
/// Never mutated during a rewrite; share it by reference or `Arc`.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    default_operator: Operator,
    operators: HashMap<EntityType, Operator>,
    params: OperatorParams,
    cipher: Option<Arc<ValueCipher>>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            default_operator: Operator::Replace,
            operators: HashMap::new(),
            params: OperatorParams::default(),
            cipher: None,
        }
    }
}

impl OperatorConfig {
    /// `replace` for every entity type
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `operator` for one entity type
    pub fn with_operator(mut self, entity_type: impl Into<EntityType>, operator: Operator) -> Self {
        self.operators.insert(entity_type.into(), operator);
        self
    }

    /// Operator for entity types without an explicit mapping
    pub fn with_default_operator(mut self, operator: Operator) -> Self {
        self.default_operator = operator;
        self
    }

    pub fn with_params(mut self, params: OperatorParams) -> Self {
        self.params = params;
        self
    }

    /// Derive the encryption key used by the `encrypt` operator
    pub fn with_encryption_key(mut self, key: &SecretString) -> Result<Self> {
        self.cipher = Some(Arc::new(ValueCipher::from_secret(key)?));
        Ok(self)
    }

    /// Build from the `[anonymization]` configuration section
    pub fn from_settings(settings: &AnonymizationConfig, customs: &CustomOperators) -> Result<Self> {
        let mut config = Self::new()
            .with_default_operator(Operator::parse(&settings.default_operator, customs)?)
            .with_params(OperatorParams {
                mask_char: settings.mask_char,
                mask_preserve: settings.mask_preserve.clone(),
                mask_keep_first: settings.mask_keep_first,
                redaction_literal: settings.redaction_literal.clone(),
                hash_algorithm: settings.hash_algorithm,
                hash_length: settings.hash_length,
                hash_salt: settings.hash_salt.clone(),
                age_bracket_size: settings.age_bracket_size,
                age_reference_date: settings.age_reference_date,
                include_original: settings.include_original_in_audit,
            });

        for (entity_type, name) in &settings.operators {
            let operator = Operator::parse(name, customs)?;
            config = config.with_operator(EntityType::new(entity_type), operator);
        }

        if let Some(key) = &settings.encryption_key {
            config = config.with_encryption_key(key)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that every configured operator can run
    pub fn validate(&self) -> Result<()> {
        let uses_encrypt = self.default_operator == Operator::Encrypt
            || self.operators.values().any(|op| *op == Operator::Encrypt);
        if uses_encrypt && self.cipher.is_none() {
            return Err(VeilError::Configuration(
                "The encrypt operator requires an encryption key".to_string(),
            ));
        }
        if self.params.hash_length == 0 {
            return Err(VeilError::Configuration(
                "hash_length must be greater than 0".to_string(),
            ));
        }
        if self.params.age_bracket_size == 0 {
            return Err(VeilError::Configuration(
                "age_bracket_size must be greater than 0".to_string(),
            ));
        }
        if self.params.mask_preserve.contains(&self.params.mask_char) {
            return Err(VeilError::Configuration(format!(
                "mask_char '{}' must not be a preserved character",
                self.params.mask_char
            )));
        }
        Ok(())
    }

    /// Operator for an entity type
    pub fn operator_for(&self, entity_type: &EntityType) -> &Operator {
        self.operators
            .get(entity_type)
            .unwrap_or(&self.default_operator)
    }

    pub fn params(&self) -> &OperatorParams {
        &self.params
    }

    /// Apply the configured operator to a span
    ///
    /// # Errors
    ///
    /// Encryption failures and a missing encryption key are errors; an
    /// unparseable age is reported as [`OperatorOutcome::Skipped`].
    pub fn apply(&self, operator: &Operator, span: &Span) -> Result<OperatorOutcome> {
        let params = &self.params;
        let replaced = match operator {
            Operator::Replace => format!("<{}>", span.entity_type),
            Operator::Redact => params.redaction_literal.clone(),
            Operator::Mask => masking::mask(
                &span.text,
                params.mask_char,
                &params.mask_preserve,
                params.mask_keep_first,
            ),
            Operator::Hash => hashing::hash_value(
                &span.text,
                params.hash_algorithm,
                params.hash_salt.as_ref().map(|s| s.expose_secret().as_str()),
                params.hash_length,
            ),
            Operator::Encrypt => {
                let cipher = self.cipher.as_ref().ok_or_else(|| {
                    VeilError::Configuration(
                        "The encrypt operator requires an encryption key".to_string(),
                    )
                })?;
                cipher.encrypt(&span.text)?
            }
            Operator::AgeBracket => {
                let reference = params
                    .age_reference_date
                    .unwrap_or_else(|| Local::now().date_naive());
                match age_bracket::age_bracket(&span.text, params.age_bracket_size, reference) {
                    Some(bracket) => bracket,
                    None => {
                        return Ok(OperatorOutcome::Skipped(
                            "age_bracket could not parse a date or age".to_string(),
                        ))
                    }
                }
            }
            Operator::Keep => span.text.clone(),
            Operator::Custom(custom) => custom.apply(&span.text, &span.entity_type),
        };
        Ok(OperatorOutcome::Replaced(replaced))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    fn span(text: &str, entity_type: EntityType) -> Span {
        Span::new(0, text.len(), entity_type, text, 0.9, "test")
    }

    fn replaced(outcome: OperatorOutcome) -> String {
        match outcome {
            OperatorOutcome::Replaced(text) => text,
            OperatorOutcome::Skipped(reason) => panic!("operator skipped: {reason}"),
        }
    }

    #[test]
    fn test_parse_operator_names() {
        let customs = CustomOperators::new();
        assert_eq!(Operator::parse("replace", &customs).unwrap(), Operator::Replace);
        assert_eq!(Operator::parse(" MASK ", &customs).unwrap(), Operator::Mask);
        assert_eq!(Operator::parse("age_bracket", &customs).unwrap(), Operator::AgeBracket);
        assert!(Operator::parse("scramble", &customs).unwrap_err().is_configuration());
        assert!(Operator::parse("custom:initials", &customs).unwrap_err().is_configuration());
    }

    #[test]
    fn test_custom_operator_lookup() {
        let mut customs = CustomOperators::new();
        customs.register("initials", |text, _| {
            text.split_whitespace()
                .filter_map(|w| w.chars().next())
                .collect()
        });

        let operator = Operator::parse("custom:initials", &customs).unwrap();
        assert_eq!(operator.name(), "custom:initials");

        let config = OperatorConfig::new().with_operator(EntityType::PERSON, operator.clone());
        let out = config.apply(&operator, &span("Jane Citizen", EntityType::PERSON)).unwrap();
        assert_eq!(replaced(out), "JC");
    }

    #[test]
    fn test_basic_operators() {
        let config = OperatorConfig::new();
        let email = span("john.smith@example.com", EntityType::EMAIL_ADDRESS);

        assert_eq!(replaced(config.apply(&Operator::Replace, &email).unwrap()), "<EMAIL_ADDRESS>");
        assert_eq!(replaced(config.apply(&Operator::Redact, &email).unwrap()), "[REDACTED]");
        assert_eq!(
            replaced(config.apply(&Operator::Mask, &email).unwrap()),
            "****.*****@*******.***"
        );
        assert_eq!(replaced(config.apply(&Operator::Hash, &email).unwrap()).len(), 16);
        assert_eq!(
            replaced(config.apply(&Operator::Keep, &email).unwrap()),
            "john.smith@example.com"
        );
    }

    #[test]
    fn test_age_bracket_outcomes() {
        let config = OperatorConfig::new().with_params(OperatorParams {
            age_reference_date: NaiveDate::from_ymd_opt(2024, 6, 15),
            ..OperatorParams::default()
        });
        let dob = span("15/06/1980", EntityType::DATE_OF_BIRTH);
        assert_eq!(replaced(config.apply(&Operator::AgeBracket, &dob).unwrap()), "40-44");

        let garbage = span("sometime", EntityType::DATE_OF_BIRTH);
        assert!(matches!(
            config.apply(&Operator::AgeBracket, &garbage).unwrap(),
            OperatorOutcome::Skipped(_)
        ));
    }

    #[test]
    fn test_encrypt_requires_key() {
        let config = OperatorConfig::new().with_operator(EntityType::AU_TFN, Operator::Encrypt);
        assert!(config.validate().unwrap_err().is_configuration());

        let key = secret_string("passphrase");
        let config = config.with_encryption_key(&key).unwrap();
        config.validate().unwrap();

        let tfn = span("123 456 782", EntityType::AU_TFN);
        let token = replaced(config.apply(&Operator::Encrypt, &tfn).unwrap());
        assert_eq!(decrypt_value(&token, &key).unwrap(), "123 456 782");
    }

    #[test]
    fn test_operator_lookup_falls_back_to_default() {
        let config = OperatorConfig::new()
            .with_default_operator(Operator::Redact)
            .with_operator("email_address", Operator::Mask);
        assert_eq!(config.operator_for(&EntityType::EMAIL_ADDRESS), &Operator::Mask);
        assert_eq!(config.operator_for(&EntityType::PERSON), &Operator::Redact);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let zero_hash = OperatorConfig::new().with_params(OperatorParams {
            hash_length: 0,
            ..OperatorParams::default()
        });
        assert!(zero_hash.validate().is_err());

        let clashing_mask = OperatorConfig::new().with_params(OperatorParams {
            mask_char: '.',
            ..OperatorParams::default()
        });
        assert!(clashing_mask.validate().is_err());
    }
}
