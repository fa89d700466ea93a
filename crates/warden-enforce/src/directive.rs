// crates/warden-enforce/src/directive.rs
// ============================================================================
// Module: Warden Directive Grammar
// Description: Parsers for symbolic constraint and obligation directives.
// Purpose: Turn directive strings into typed enforcement instructions.
// Dependencies: warden-core
// ============================================================================

//! ## Overview
//! Directives are short symbolic strings attached to decisions:
//! `anonymize:<fields>`, `rate-limit:<count>/<window>`,
//! `geo-restrict:<countries>`, `audit`, `notify:<channel>`, and
//! `lifecycle:<action>:<delay-seconds>`. Parsing is strict; a directive
//! that does not parse is an enforcement failure, never a silent pass.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use warden_core::ConstraintDirective;
use warden_core::ObligationDirective;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Directive parsing errors.
#[derive(Debug, Error)]
pub enum DirectiveError {
    /// The directive does not match any recognized grammar.
    #[error("unrecognized directive: {0}")]
    Unrecognized(String),
    /// The directive matched a grammar but carried bad arguments.
    #[error("malformed directive {directive}: {detail}")]
    Malformed {
        /// Offending directive text.
        directive: String,
        /// Problem description.
        detail: String,
    },
}

// ============================================================================
// SECTION: Constraint Directives
// ============================================================================

/// Anonymization methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymizeMethod {
    /// Format-preserving masking.
    Mask,
    /// Keyed hash rendering.
    Hash,
    /// Deterministic token substitution.
    Tokenize,
    /// Full redaction.
    Redact,
}

impl AnonymizeMethod {
    /// Parses a method name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "mask" => Some(Self::Mask),
            "hash" => Some(Self::Hash),
            "tokenize" => Some(Self::Tokenize),
            "redact" => Some(Self::Redact),
            _ => None,
        }
    }
}

/// Parsed form of a constraint directive.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedConstraint {
    /// Anonymize the named fields, optionally overriding the method.
    Anonymize {
        /// Method override when the directive names one.
        method: Option<AnonymizeMethod>,
        /// Field names to transform.
        fields: Vec<String>,
    },
    /// Rate-limit the `(agent, resource)` key.
    RateLimit {
        /// Admitted requests per window.
        count: u32,
        /// Window length in milliseconds; the configured default when absent.
        window_ms: Option<u64>,
    },
    /// Restrict the response to clients in the named countries.
    GeoRestrict {
        /// Allowed ISO country codes.
        countries: Vec<String>,
    },
}

/// Parses a constraint directive string.
///
/// # Errors
///
/// Returns [`DirectiveError`] when the directive is unrecognized or
/// malformed.
pub fn parse_constraint(
    directive: &ConstraintDirective,
) -> Result<ParsedConstraint, DirectiveError> {
    let text = directive.as_str();
    if let Some(rest) = text.strip_prefix("anonymize:") {
        return parse_anonymize(text, rest);
    }
    if let Some(rest) = text.strip_prefix("rate-limit:") {
        return parse_rate_limit(text, rest);
    }
    if let Some(rest) = text.strip_prefix("geo-restrict:") {
        let countries = split_list(rest);
        if countries.is_empty() {
            return Err(DirectiveError::Malformed {
                directive: text.to_string(),
                detail: "no countries listed".to_string(),
            });
        }
        return Ok(ParsedConstraint::GeoRestrict {
            countries,
        });
    }
    Err(DirectiveError::Unrecognized(text.to_string()))
}

/// Parses the anonymize argument list, with an optional method prefix.
fn parse_anonymize(text: &str, rest: &str) -> Result<ParsedConstraint, DirectiveError> {
    let (method, fields_text) = match rest.split_once(':') {
        Some((head, tail)) if AnonymizeMethod::parse(head).is_some() => {
            (AnonymizeMethod::parse(head), tail)
        }
        _ => (None, rest),
    };
    let fields = split_list(fields_text);
    if fields.is_empty() {
        return Err(DirectiveError::Malformed {
            directive: text.to_string(),
            detail: "no fields listed".to_string(),
        });
    }
    Ok(ParsedConstraint::Anonymize {
        method,
        fields,
    })
}

/// Parses `<count>[/<window>]` with `s`, `m`, or `ms` window units.
fn parse_rate_limit(text: &str, rest: &str) -> Result<ParsedConstraint, DirectiveError> {
    let (count_text, window_text) = match rest.split_once('/') {
        Some((count, window)) => (count, Some(window)),
        None => (rest, None),
    };
    let count: u32 = count_text.parse().map_err(|_| DirectiveError::Malformed {
        directive: text.to_string(),
        detail: "count is not a positive integer".to_string(),
    })?;
    if count == 0 {
        return Err(DirectiveError::Malformed {
            directive: text.to_string(),
            detail: "count must be positive".to_string(),
        });
    }
    let window_ms = match window_text {
        None => None,
        Some(window) => Some(parse_window(text, window)?),
    };
    Ok(ParsedConstraint::RateLimit {
        count,
        window_ms,
    })
}

/// Parses a window suffix such as `60s`, `5m`, or `1500ms`.
fn parse_window(text: &str, window: &str) -> Result<u64, DirectiveError> {
    let malformed = |detail: &str| DirectiveError::Malformed {
        directive: text.to_string(),
        detail: detail.to_string(),
    };
    let (digits, factor) = if let Some(digits) = window.strip_suffix("ms") {
        (digits, 1)
    } else if let Some(digits) = window.strip_suffix('s') {
        (digits, 1_000)
    } else if let Some(digits) = window.strip_suffix('m') {
        (digits, 60_000)
    } else {
        return Err(malformed("window needs an ms, s, or m unit"));
    };
    let value: u64 = digits.parse().map_err(|_| malformed("window is not an integer"))?;
    if value == 0 {
        return Err(malformed("window must be positive"));
    }
    value.checked_mul(factor).ok_or_else(|| malformed("window overflows"))
}

// ============================================================================
// SECTION: Obligation Directives
// ============================================================================

/// Lifecycle actions a policy can defer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleVerb {
    /// Delete the resource.
    Delete,
    /// Archive the resource.
    Archive,
    /// Anonymize the resource in place.
    Anonymize,
}

impl LifecycleVerb {
    /// Parses a lifecycle verb.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "delete" => Some(Self::Delete),
            "archive" => Some(Self::Archive),
            "anonymize" => Some(Self::Anonymize),
            _ => None,
        }
    }

    /// Returns the stable verb label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Archive => "archive",
            Self::Anonymize => "anonymize",
        }
    }
}

/// Parsed form of an obligation directive.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedObligation {
    /// Record the decision in the audit trail.
    Audit,
    /// Notify the named channel.
    Notify {
        /// Configured channel name.
        channel: String,
    },
    /// Schedule a deferred lifecycle action.
    Lifecycle {
        /// Deferred action verb.
        verb: LifecycleVerb,
        /// Delay before execution in seconds.
        delay_seconds: u64,
    },
}

/// Parses an obligation directive string.
///
/// # Errors
///
/// Returns [`DirectiveError`] when the directive is unrecognized or
/// malformed.
pub fn parse_obligation(
    directive: &ObligationDirective,
) -> Result<ParsedObligation, DirectiveError> {
    let text = directive.as_str();
    if text == "audit" {
        return Ok(ParsedObligation::Audit);
    }
    if let Some(channel) = text.strip_prefix("notify:") {
        if channel.is_empty() {
            return Err(DirectiveError::Malformed {
                directive: text.to_string(),
                detail: "no channel named".to_string(),
            });
        }
        return Ok(ParsedObligation::Notify {
            channel: channel.to_string(),
        });
    }
    if let Some(rest) = text.strip_prefix("lifecycle:") {
        let Some((verb_text, delay_text)) = rest.split_once(':') else {
            return Err(DirectiveError::Malformed {
                directive: text.to_string(),
                detail: "expected lifecycle:<action>:<delay-seconds>".to_string(),
            });
        };
        let Some(verb) = LifecycleVerb::parse(verb_text) else {
            return Err(DirectiveError::Malformed {
                directive: text.to_string(),
                detail: format!("unknown lifecycle action {verb_text}"),
            });
        };
        let delay_seconds: u64 = delay_text.parse().map_err(|_| DirectiveError::Malformed {
            directive: text.to_string(),
            detail: "delay is not an integer".to_string(),
        })?;
        return Ok(ParsedObligation::Lifecycle {
            verb,
            delay_seconds,
        });
    }
    Err(DirectiveError::Unrecognized(text.to_string()))
}

/// Splits a comma-separated list, dropping empty items.
fn split_list(text: &str) -> Vec<String> {
    text.split(',').map(str::trim).filter(|item| !item.is_empty()).map(String::from).collect()
}
