// crates/warden-enforce/src/anonymize.rs
// ============================================================================
// Module: Warden Anonymizer
// Description: Structure-preserving field anonymization for response data.
// Purpose: Apply mask, hash, tokenize, and redact transforms to named fields.
// Dependencies: warden-core, serde_json
// ============================================================================

//! ## Overview
//! The anonymizer walks the response JSON and transforms string values
//! under the named field keys, preserving the surrounding object shape.
//! Masking is format-preserving for emails and phone numbers; hashing and
//! tokenization are deterministic under a process-level secret. All
//! transforms are idempotent: applying a directive twice yields the same
//! bytes as applying it once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use warden_core::ConstraintDirective;
use warden_core::ConstraintFailure;
use warden_core::ConstraintProcessor;
use warden_core::DecisionContext;
use warden_core::hashing::DEFAULT_HASH_ALGORITHM;
use warden_core::hashing::keyed_digest;

use crate::directive::AnonymizeMethod;
use crate::directive::ParsedConstraint;
use crate::directive::parse_constraint;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Marker prefix for hashed values; hashed values are never re-hashed.
const HASH_PREFIX: &str = "h:";
/// Marker prefix for tokenized values; tokens are never re-tokenized.
const TOKEN_PREFIX: &str = "tok_";
/// Replacement text for redacted values.
const REDACTED: &str = "[REDACTED]";
/// Hex characters kept from a digest for hashes and tokens.
const DIGEST_KEEP: usize = 16;

// ============================================================================
// SECTION: Anonymizer
// ============================================================================

/// Anonymizer configuration.
#[derive(Debug, Clone)]
pub struct AnonymizerConfig {
    /// Method applied when a directive does not name one.
    pub default_method: AnonymizeMethod,
    /// Process-level secret keying deterministic transforms.
    pub secret: Vec<u8>,
}

impl Default for AnonymizerConfig {
    fn default() -> Self {
        Self {
            default_method: AnonymizeMethod::Mask,
            secret: b"warden-development-secret".to_vec(),
        }
    }
}

/// Constraint processor applying anonymize directives.
pub struct Anonymizer {
    /// Processor configuration.
    config: AnonymizerConfig,
}

impl Anonymizer {
    /// Creates the processor from configuration.
    #[must_use]
    pub fn new(config: AnonymizerConfig) -> Self {
        Self {
            config,
        }
    }

    /// Transforms one string value with the selected method.
    fn transform(&self, method: AnonymizeMethod, value: &str) -> String {
        match method {
            AnonymizeMethod::Mask => mask(value),
            AnonymizeMethod::Redact => REDACTED.to_string(),
            AnonymizeMethod::Hash => {
                if value.starts_with(HASH_PREFIX) {
                    return value.to_string();
                }
                let digest =
                    keyed_digest(DEFAULT_HASH_ALGORITHM, &self.config.secret, value.as_bytes());
                format!("{HASH_PREFIX}{}", &digest.value[..DIGEST_KEEP])
            }
            AnonymizeMethod::Tokenize => {
                if value.starts_with(TOKEN_PREFIX) {
                    return value.to_string();
                }
                let digest =
                    keyed_digest(DEFAULT_HASH_ALGORITHM, &self.config.secret, value.as_bytes());
                format!("{TOKEN_PREFIX}{}", &digest.value[..DIGEST_KEEP])
            }
        }
    }

    /// Walks the JSON tree, transforming values under the named fields.
    fn walk(&self, method: AnonymizeMethod, fields: &[String], data: &mut Value) {
        match data {
            Value::Object(map) => {
                for (key, value) in map.iter_mut() {
                    if fields.iter().any(|field| field == key) {
                        anonymize_value(self, method, value);
                    } else {
                        self.walk(method, fields, value);
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.walk(method, fields, item);
                }
            }
            _ => {}
        }
    }
}

/// Transforms a matched value, descending into arrays.
fn anonymize_value(anonymizer: &Anonymizer, method: AnonymizeMethod, value: &mut Value) {
    match value {
        Value::String(text) => {
            *text = anonymizer.transform(method, text);
        }
        Value::Array(items) => {
            for item in items {
                anonymize_value(anonymizer, method, item);
            }
        }
        // Non-string scalars and nested objects under a matched key are
        // redacted wholesale to avoid leaking through type changes.
        Value::Number(_) | Value::Bool(_) | Value::Object(_) => {
            *value = Value::String(REDACTED.to_string());
        }
        Value::Null => {}
    }
}

impl ConstraintProcessor for Anonymizer {
    fn name(&self) -> &'static str {
        "anonymizer"
    }

    fn handles(&self, directive: &ConstraintDirective) -> bool {
        directive.as_str().starts_with("anonymize:")
    }

    fn apply(
        &self,
        directive: &ConstraintDirective,
        mut data: Value,
        _context: &DecisionContext,
    ) -> Result<Value, ConstraintFailure> {
        let parsed = parse_constraint(directive)
            .map_err(|err| ConstraintFailure::critical(err.to_string()))?;
        let ParsedConstraint::Anonymize {
            method,
            fields,
        } = parsed
        else {
            return Err(ConstraintFailure::critical("directive is not an anonymize form"));
        };
        let method = method.unwrap_or(self.config.default_method);
        self.walk(method, &fields, &mut data);
        Ok(data)
    }
}

// ============================================================================
// SECTION: Format-Preserving Masking
// ============================================================================

/// Masks a string, preserving email and phone shapes.
///
/// Values already carrying mask characters pass through unchanged, which
/// keeps repeated application byte-stable.
fn mask(value: &str) -> String {
    if value.contains('*') {
        return value.to_string();
    }
    if let Some((local, domain)) = value.split_once('@') {
        let head = local.chars().next().unwrap_or('*');
        return format!("{head}***@{domain}");
    }
    let digits = value.chars().filter(char::is_ascii_digit).count();
    if digits >= 7 {
        return mask_phone(value, digits);
    }
    let head = value.chars().next().unwrap_or('*');
    format!("{head}***")
}

/// Masks phone digits, keeping punctuation and the last two digits.
fn mask_phone(value: &str, digits: usize) -> String {
    let mut seen = 0;
    value
        .chars()
        .map(|c| {
            if c.is_ascii_digit() {
                seen += 1;
                if seen > digits.saturating_sub(2) { c } else { '*' }
            } else {
                c
            }
        })
        .collect()
}
