// crates/warden-providers/src/registry.rs
// ============================================================================
// Module: Warden Provider Registry
// Description: Data-driven construction of enrichers and judge adapters.
// Purpose: Return the fixed ordered provider lists the gateway starts with.
// Dependencies: warden-core, crate::{enrich, judge}
// ============================================================================

//! ## Overview
//! Construction is data-driven: the registry receives plain data extracted
//! from configuration and returns a fixed ordered enricher list and a judge
//! implementation. There is no runtime discovery and no type introspection;
//! what the registry returns at startup is what runs for the process life.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use warden_core::Enricher;
use warden_core::Judge;
use warden_core::JudgeError;
use warden_core::StubJudge;

use crate::enrich::AgentDirectory;
use crate::enrich::AgentInfoEnricher;
use crate::enrich::BusinessHours;
use crate::enrich::DataLineageEnricher;
use crate::enrich::GeoTable;
use crate::enrich::ResourceClassifierEnricher;
use crate::enrich::SecurityInfoEnricher;
use crate::enrich::TimeEnricher;
use crate::judge::HttpJudge;
use crate::judge::HttpJudgeConfig;

// ============================================================================
// SECTION: Enricher Registry
// ============================================================================

/// Construction data for the enricher pipeline.
pub struct EnricherParams {
    /// Business-hours window for the time enricher.
    pub hours: BusinessHours,
    /// Agent directory for the agent-info enricher.
    pub directory: AgentDirectory,
    /// Static geo table for the security enricher.
    pub geo: GeoTable,
    /// Countries that elevate the threat level.
    pub flagged_countries: Vec<String>,
}

/// Builds the fixed ordered enricher list.
///
/// Order matters: time, agent-info, resource-classifier, security-info,
/// then the best-effort lineage sketch.
#[must_use]
pub fn build_enrichers(params: EnricherParams) -> Vec<Arc<dyn Enricher>> {
    vec![
        Arc::new(TimeEnricher::new(params.hours)),
        Arc::new(AgentInfoEnricher::new(params.directory)),
        Arc::new(ResourceClassifierEnricher::with_default_rules()),
        Arc::new(SecurityInfoEnricher::new(params.geo, params.flagged_countries)),
        Arc::new(DataLineageEnricher),
    ]
}

// ============================================================================
// SECTION: Judge Registry
// ============================================================================

/// Judge adapter selection.
pub enum JudgeSpec {
    /// No backend; the stub answers indeterminate.
    Stub,
    /// HTTP JSON adapter.
    Http(HttpJudgeConfig),
}

/// Builds the configured judge adapter.
///
/// # Errors
///
/// Returns [`JudgeError`] when the HTTP adapter cannot be constructed.
pub fn build_judge(spec: JudgeSpec) -> Result<Arc<dyn Judge>, JudgeError> {
    match spec {
        JudgeSpec::Stub => Ok(Arc::new(StubJudge)),
        JudgeSpec::Http(config) => Ok(Arc::new(HttpJudge::new(config)?)),
    }
}
