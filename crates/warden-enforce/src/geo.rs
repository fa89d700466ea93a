// crates/warden-enforce/src/geo.rs
// ============================================================================
// Module: Warden Geo Restrictor
// Description: Country-based response restriction from enriched context.
// Purpose: Enforce geo-restrict directives with a soft-fail posture.
// Dependencies: warden-core
// ============================================================================

//! ## Overview
//! The geo restrictor reads the country the security enricher resolved for
//! the client. A client outside the allowed list is a critical failure; an
//! unresolvable country is a soft failure that logs a warning and lets the
//! response proceed unchanged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use warden_core::ConstraintDirective;
use warden_core::ConstraintFailure;
use warden_core::ConstraintProcessor;
use warden_core::DecisionContext;

use crate::directive::ParsedConstraint;
use crate::directive::parse_constraint;

// ============================================================================
// SECTION: Geo Restrictor
// ============================================================================

/// Constraint processor enforcing geo-restrict directives.
pub struct GeoRestrictor;

impl ConstraintProcessor for GeoRestrictor {
    fn name(&self) -> &'static str {
        "geo-restrictor"
    }

    fn handles(&self, directive: &ConstraintDirective) -> bool {
        directive.as_str().starts_with("geo-restrict:")
    }

    fn apply(
        &self,
        directive: &ConstraintDirective,
        data: Value,
        context: &DecisionContext,
    ) -> Result<Value, ConstraintFailure> {
        let parsed = parse_constraint(directive)
            .map_err(|err| ConstraintFailure::critical(err.to_string()))?;
        let ParsedConstraint::GeoRestrict {
            countries,
        } = parsed
        else {
            return Err(ConstraintFailure::critical("directive is not a geo-restrict form"));
        };
        let country = context
            .environment
            .get("security.geoCountry")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        if country == "unknown" {
            return Err(ConstraintFailure::soft(
                "client country unresolved; geo restriction not applied",
            ));
        }
        if countries.iter().any(|allowed| allowed == country) {
            Ok(data)
        } else {
            Err(ConstraintFailure::critical(format!(
                "client country {country} is outside the allowed set"
            )))
        }
    }
}
