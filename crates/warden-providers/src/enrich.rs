// crates/warden-providers/src/enrich.rs
// ============================================================================
// Module: Warden Enrichers
// Description: The fixed set of context enrichers behind the collector.
// Purpose: Populate the environment layer from directory, clock, and geo data.
// Dependencies: warden-core, serde_json
// ============================================================================

//! ## Overview
//! Five enrichers feed the decision context: business-hours facts from the
//! admission clock, agent directory lookups, resource classification by URI
//! pattern, security facts resolved from a static geo table, and a
//! best-effort lineage sketch. All are pure over their construction data;
//! none performs network I/O, which keeps every enrichment bounded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;
use warden_core::DecisionContext;
use warden_core::Enricher;
use warden_core::EnricherError;
use warden_core::Pattern;
use warden_core::UNKNOWN_AGENT_TRUST_SCORE;
use warden_core::UNKNOWN_AGENT_TYPE;

// ============================================================================
// SECTION: Shared Data
// ============================================================================

/// One agent profile from the configured directory.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    /// Agent type label.
    pub agent_type: String,
    /// Clearance level.
    pub clearance_level: u8,
    /// Trust score in `[0, 1]`.
    pub trust_score: f64,
    /// Free-form tags.
    pub tags: Vec<String>,
}

/// Agent directory keyed by agent id.
pub type AgentDirectory = BTreeMap<String, AgentProfile>;

/// Static geo table mapping address prefixes to countries.
#[derive(Debug, Clone, Default)]
pub struct GeoTable {
    /// Prefix-to-country entries, longest prefix wins.
    entries: Vec<(String, String)>,
}

impl GeoTable {
    /// Creates a table from prefix/country pairs.
    #[must_use]
    pub fn new(mut entries: Vec<(String, String)>) -> Self {
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self {
            entries,
        }
    }

    /// Resolves an address to a country code when a prefix matches.
    #[must_use]
    pub fn resolve(&self, address: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(prefix, _)| address.starts_with(prefix.as_str()))
            .map(|(_, country)| country.as_str())
    }
}

/// Business-hours window on normalized `HH:MM:SS` strings.
#[derive(Debug, Clone)]
pub struct BusinessHours {
    /// Window start, inclusive.
    pub start: String,
    /// Window end, exclusive.
    pub end: String,
    /// Timezone label recorded into the environment.
    pub timezone: String,
}

// ============================================================================
// SECTION: Time Enricher
// ============================================================================

/// Enricher deriving business-hours facts from the admission clock.
pub struct TimeEnricher {
    /// Configured business-hours window.
    hours: BusinessHours,
}

impl TimeEnricher {
    /// Creates the enricher for the given window.
    #[must_use]
    pub fn new(hours: BusinessHours) -> Self {
        Self {
            hours,
        }
    }
}

#[async_trait]
impl Enricher for TimeEnricher {
    fn namespace(&self) -> &'static str {
        "time"
    }

    async fn enrich(
        &self,
        context: &DecisionContext,
    ) -> Result<BTreeMap<String, Value>, EnricherError> {
        let time_of_day = context.time.time_of_day();
        let in_window =
            time_of_day.as_str() >= self.hours.start.as_str()
                && time_of_day.as_str() < self.hours.end.as_str();
        let mut output = BTreeMap::new();
        output.insert("isBusinessHours".to_string(), json!(in_window));
        output.insert("dayOfWeek".to_string(), json!(context.time.day_of_week()));
        output.insert("timezone".to_string(), json!(self.hours.timezone));
        Ok(output)
    }
}

// ============================================================================
// SECTION: Agent Info Enricher
// ============================================================================

/// Enricher resolving agent facets from the configured directory.
pub struct AgentInfoEnricher {
    /// Directory keyed by agent id.
    directory: AgentDirectory,
}

impl AgentInfoEnricher {
    /// Creates the enricher over the given directory.
    #[must_use]
    pub fn new(directory: AgentDirectory) -> Self {
        Self {
            directory,
        }
    }
}

#[async_trait]
impl Enricher for AgentInfoEnricher {
    fn namespace(&self) -> &'static str {
        "agent"
    }

    async fn enrich(
        &self,
        context: &DecisionContext,
    ) -> Result<BTreeMap<String, Value>, EnricherError> {
        let mut output = BTreeMap::new();
        match self.directory.get(context.agent.as_str()) {
            Some(profile) => {
                output.insert("agentType".to_string(), json!(profile.agent_type));
                output.insert("clearanceLevel".to_string(), json!(profile.clearance_level));
                output.insert("trustScore".to_string(), json!(profile.trust_score));
                output.insert("tags".to_string(), json!(profile.tags));
            }
            None => {
                output.insert("agentType".to_string(), json!(UNKNOWN_AGENT_TYPE));
                output.insert("clearanceLevel".to_string(), json!(0));
                output.insert("trustScore".to_string(), json!(UNKNOWN_AGENT_TRUST_SCORE));
                output.insert("tags".to_string(), json!([]));
            }
        }
        Ok(output)
    }
}

// ============================================================================
// SECTION: Resource Classifier Enricher
// ============================================================================

/// One classification rule over resource URIs.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    /// URI pattern the rule applies to.
    pub pattern: Pattern,
    /// Data type label.
    pub data_type: String,
    /// Sensitivity label.
    pub sensitivity: String,
}

/// Enricher classifying resources by URI pattern.
pub struct ResourceClassifierEnricher {
    /// Ordered classification rules; the first match wins.
    rules: Vec<ClassifierRule>,
}

impl ResourceClassifierEnricher {
    /// Creates the enricher over explicit rules.
    #[must_use]
    pub fn new(rules: Vec<ClassifierRule>) -> Self {
        Self {
            rules,
        }
    }

    /// Creates the enricher with the built-in rule set.
    #[must_use]
    pub fn with_default_rules() -> Self {
        let rule = |pattern: &str, data_type: &str, sensitivity: &str| ClassifierRule {
            pattern: Pattern::new(pattern),
            data_type: data_type.to_string(),
            sensitivity: sensitivity.to_string(),
        };
        Self::new(vec![
            rule("*secret*", "credential", "restricted"),
            rule("*credential*", "credential", "restricted"),
            rule("*password*", "credential", "restricted"),
            rule("*mail*", "message", "sensitive"),
            rule("tool:*", "tool", "internal"),
            rule("file://*", "file", "internal"),
            rule("*", "unknown", "internal"),
        ])
    }
}

#[async_trait]
impl Enricher for ResourceClassifierEnricher {
    fn namespace(&self) -> &'static str {
        "resource"
    }

    async fn enrich(
        &self,
        context: &DecisionContext,
    ) -> Result<BTreeMap<String, Value>, EnricherError> {
        let mut output = BTreeMap::new();
        let matched = self
            .rules
            .iter()
            .find(|rule| rule.pattern.matches(context.resource.as_str()));
        if let Some(rule) = matched {
            output.insert("dataType".to_string(), json!(rule.data_type));
            output.insert("sensitivity".to_string(), json!(rule.sensitivity));
        }
        Ok(output)
    }
}

// ============================================================================
// SECTION: Security Info Enricher
// ============================================================================

/// Enricher resolving client network facts from the static geo table.
///
/// The client address comes from the transport namespace seeded by the
/// gateway; an unresolvable address yields `geoCountry = "unknown"` and
/// leaves the threat level unchanged.
pub struct SecurityInfoEnricher {
    /// Static geo table.
    geo: GeoTable,
    /// Countries that elevate the threat level.
    flagged_countries: Vec<String>,
}

impl SecurityInfoEnricher {
    /// Creates the enricher over the geo table and flagged countries.
    #[must_use]
    pub fn new(geo: GeoTable, flagged_countries: Vec<String>) -> Self {
        Self {
            geo,
            flagged_countries,
        }
    }
}

#[async_trait]
impl Enricher for SecurityInfoEnricher {
    fn namespace(&self) -> &'static str {
        "security"
    }

    async fn enrich(
        &self,
        context: &DecisionContext,
    ) -> Result<BTreeMap<String, Value>, EnricherError> {
        let client_ip = context
            .environment
            .get("transport.clientIp")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let country = if client_ip.is_empty() {
            "unknown".to_string()
        } else {
            self.geo.resolve(&client_ip).unwrap_or("unknown").to_string()
        };
        let threat = if self.flagged_countries.iter().any(|flagged| flagged == &country) {
            "elevated"
        } else {
            "none"
        };
        let mut output = BTreeMap::new();
        output.insert("clientIP".to_string(), json!(client_ip));
        output.insert("geoCountry".to_string(), json!(country));
        output.insert("threatLevel".to_string(), json!(threat));
        Ok(output)
    }
}

// ============================================================================
// SECTION: Data Lineage Enricher
// ============================================================================

/// Best-effort enricher sketching where the requested data originates.
pub struct DataLineageEnricher;

#[async_trait]
impl Enricher for DataLineageEnricher {
    fn namespace(&self) -> &'static str {
        "lineage"
    }

    fn best_effort(&self) -> bool {
        true
    }

    async fn enrich(
        &self,
        context: &DecisionContext,
    ) -> Result<BTreeMap<String, Value>, EnricherError> {
        let scheme = context
            .resource
            .scheme()
            .ok_or_else(|| EnricherError::Failed("resource has no scheme".to_string()))?;
        let mut output = BTreeMap::new();
        output.insert("origin".to_string(), json!(scheme));
        Ok(output)
    }
}
