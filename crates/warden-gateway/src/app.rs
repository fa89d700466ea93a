// crates/warden-gateway/src/app.rs
// ============================================================================
// Module: Gateway Application
// Description: Data-driven assembly of the full enforcement path.
// Purpose: Build every component from configuration and serve a transport.
// Dependencies: all warden crates
// ============================================================================

//! ## Overview
//! The application builder turns a validated configuration into the running
//! gateway: policy store with the default-policy bootstrap, decision
//! pipeline with its cache and judge (optionally batched), the enricher
//! collector, constraint processors, obligation executors, audit logging,
//! anomaly detection, upstream routing, and session tracking. Construction
//! must happen inside a Tokio runtime because connectors and the batch
//! judge spawn tasks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use thiserror::Error;
use warden_config::AuditSinkKind;
use warden_config::GatewayTransport;
use warden_config::JudgeBackend;
use warden_config::WardenConfig;
use warden_core::AlertSink;
use warden_core::AuditSink;
use warden_core::BatchJudge;
use warden_core::CollectorConfig;
use warden_core::ContextCollector;
use warden_core::DecisionCache;
use warden_core::DecisionPipeline;
use warden_core::Judge;
use warden_core::ObligationError;
use warden_core::PipelineConfig;
use warden_core::PolicyStore;
use warden_enforce::AnomalyConfig;
use warden_enforce::AnomalyDetector;
use warden_enforce::AnonymizeMethod;
use warden_enforce::Anonymizer;
use warden_enforce::AnonymizerConfig;
use warden_enforce::AuditLogger;
use warden_enforce::ConstraintPipeline;
use warden_enforce::DataLifecycle;
use warden_enforce::DispatcherConfig;
use warden_enforce::FileAuditSink;
use warden_enforce::GeoRestrictor;
use warden_enforce::LifecycleHandler;
use warden_enforce::LifecycleScheduler;
use warden_enforce::Notifier;
use warden_enforce::NullAuditSink;
use warden_enforce::ObligationDispatcher;
use warden_enforce::RateLimiter;
use warden_enforce::RateLimiterConfig;
use warden_enforce::ScheduledAction;
use warden_enforce::StderrAlertSink;
use warden_enforce::StdoutAuditSink;
use warden_providers::AgentProfile;
use warden_providers::BusinessHours;
use warden_providers::EnricherParams;
use warden_providers::GeoTable;
use warden_providers::HttpJudgeConfig;
use warden_providers::JudgeSpec;
use warden_providers::build_enrichers;
use warden_providers::build_judge;
use warden_store::FilePolicyStore;
use warden_store::InMemoryPolicyStore;
use warden_store::StoreLimits;
use warden_store::ensure_default_policy;
use warden_upstream::RouterConfig;
use warden_upstream::UpstreamRouter;
use warden_upstream::UpstreamSpec;

use crate::interceptor::Interceptor;
use crate::session::SessionConfig;
use crate::session::SessionStore;
use crate::stdio::serve_stdio;
use crate::telemetry::Diagnostics;
use crate::telemetry::GatewayMetrics;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway assembly and serving errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration is unusable.
    #[error("gateway config error: {0}")]
    Config(String),
    /// A component failed to initialize.
    #[error("gateway init error: {0}")]
    Init(String),
    /// The transport failed.
    #[error("gateway transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Application
// ============================================================================

/// The assembled gateway.
pub struct GatewayApp {
    /// Validated configuration.
    pub config: WardenConfig,
    /// The per-request enforcement path.
    pub interceptor: Interceptor,
    /// Session store.
    pub sessions: SessionStore,
    /// Metrics sink.
    pub metrics: Arc<dyn GatewayMetrics>,
    /// Diagnostics facility.
    pub diagnostics: Arc<Diagnostics>,
    /// Upstream router.
    pub router: Arc<UpstreamRouter>,
}

impl GatewayApp {
    /// Assembles the gateway from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when a component cannot be built.
    pub fn from_config(config: WardenConfig) -> Result<Arc<Self>, GatewayError> {
        Self::from_config_with_metrics(config, Arc::new(NoopMetrics))
    }

    /// Assembles the gateway with a custom metrics sink.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when a component cannot be built.
    pub fn from_config_with_metrics(
        config: WardenConfig,
        metrics: Arc<dyn GatewayMetrics>,
    ) -> Result<Arc<Self>, GatewayError> {
        config.validate().map_err(|err| GatewayError::Config(err.to_string()))?;
        let diagnostics = Arc::new(Diagnostics::new(config.log.level));
        let alerts: Arc<dyn AlertSink> = Arc::new(StderrAlertSink);

        let store = build_store(&config)?;
        ensure_default_policy(store.as_ref(), &config.policies.default_policy)
            .map_err(|err| GatewayError::Init(err.to_string()))?;

        let judge = build_configured_judge(&config)?;
        let cache = Arc::new(DecisionCache::new(config.cache.to_cache_config()));
        let pipeline = DecisionPipeline::new(
            Arc::clone(&store),
            cache,
            judge,
            PipelineConfig {
                ai_confidence_threshold: config.ai.confidence_threshold,
                judge_timeout_ms: config.judge.timeout_ms,
                default_policy_id: config.policies.default_policy.clone(),
            },
        );

        let collector = ContextCollector::new(
            build_enrichers(enricher_params(&config)),
            CollectorConfig::default(),
            Arc::clone(&alerts),
        );

        let constraints = ConstraintPipeline::new(
            vec![
                Arc::new(Anonymizer::new(anonymizer_config(&config))),
                Arc::new(RateLimiter::new(RateLimiterConfig {
                    default_window_ms: config.rate_limit.default_window_ms,
                    max_keys: config.rate_limit.max_keys,
                })),
                Arc::new(GeoRestrictor),
            ],
            Arc::clone(&alerts),
        );

        let scheduler = Arc::new(LifecycleScheduler::new(
            Arc::new(DiagnosticLifecycleHandler {
                diagnostics: Arc::clone(&diagnostics),
            }),
            Arc::clone(&alerts),
        ));
        let notifier = Notifier::new(config.notify.channels.clone(), config.notify.timeout_ms)
            .map_err(|err| GatewayError::Init(err.to_string()))?;
        let dispatcher = ObligationDispatcher::new(
            vec![Arc::new(notifier), Arc::new(DataLifecycle::new(scheduler))],
            DispatcherConfig::default(),
        );

        let audit = AuditLogger::new(build_audit_sink(&config)?, Arc::clone(&alerts));
        let anomaly = AnomalyDetector::new(AnomalyConfig::default(), Arc::clone(&alerts));

        let router = UpstreamRouter::start(upstream_specs(&config), RouterConfig {
            circuit: config.circuit_breaker.to_circuit_config(),
            max_inflight_per_upstream: config.server.max_inflight_per_upstream,
        });

        let sessions = SessionStore::new(SessionConfig {
            idle_ms: config.server.session_idle_ms,
            max_inflight: config.server.max_inflight_per_session,
        });

        diagnostics.info("gateway", "warden assembled");
        Ok(Arc::new(Self {
            interceptor: Interceptor {
                collector,
                pipeline,
                constraints,
                dispatcher,
                audit,
                anomaly,
                router: Arc::clone(&router),
                diagnostics: Arc::clone(&diagnostics),
            },
            sessions,
            metrics,
            diagnostics,
            router,
            config,
        }))
    }

    /// Serves the configured transport until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the transport fails.
    pub async fn serve(self: Arc<Self>) -> Result<(), GatewayError> {
        match self.config.server.transport {
            GatewayTransport::Stdio => serve_stdio(self).await,
            GatewayTransport::Http => crate::http::serve_http(self).await,
        }
    }
}

// ============================================================================
// SECTION: Component Builders
// ============================================================================

/// Builds the policy store from configuration.
fn build_store(config: &WardenConfig) -> Result<Arc<dyn PolicyStore>, GatewayError> {
    let limits = StoreLimits {
        max_text_bytes: config.policies.max_text_bytes,
    };
    match &config.policies.dir {
        Some(dir) => {
            let store = FilePolicyStore::open(dir, limits)
                .map_err(|err| GatewayError::Init(err.to_string()))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryPolicyStore::new(limits))),
    }
}

/// Builds the judge, wrapped for batching when enabled.
fn build_configured_judge(config: &WardenConfig) -> Result<Arc<dyn Judge>, GatewayError> {
    let spec = match config.judge.backend {
        JudgeBackend::None => JudgeSpec::Stub,
        JudgeBackend::Http => JudgeSpec::Http(HttpJudgeConfig {
            url: config
                .judge
                .url
                .clone()
                .ok_or_else(|| GatewayError::Config("http judge requires a url".to_string()))?,
            timeout_ms: config.judge.timeout_ms,
            max_attempts: config.judge.max_attempts,
        }),
    };
    let judge = build_judge(spec).map_err(|err| GatewayError::Init(err.to_string()))?;
    if config.batch.enabled {
        let batched =
            BatchJudge::new(judge, config.batch.to_batch_config(config.judge.timeout_ms));
        Ok(Arc::new(batched))
    } else {
        Ok(judge)
    }
}

/// Builds the audit sink from configuration.
fn build_audit_sink(config: &WardenConfig) -> Result<Arc<dyn AuditSink>, GatewayError> {
    match config.audit.sink {
        AuditSinkKind::Null => Ok(Arc::new(NullAuditSink)),
        AuditSinkKind::Stdout => {
            if config.server.transport == GatewayTransport::Stdio {
                return Err(GatewayError::Config(
                    "stdout audit sink conflicts with the stdio transport".to_string(),
                ));
            }
            Ok(Arc::new(StdoutAuditSink))
        }
        AuditSinkKind::File => {
            let dir = config
                .audit
                .dir
                .clone()
                .ok_or_else(|| GatewayError::Config("file audit sink requires a dir".to_string()))?;
            let sink =
                FileAuditSink::new(dir).map_err(|err| GatewayError::Init(err.to_string()))?;
            Ok(Arc::new(sink))
        }
    }
}

/// Extracts enricher construction data from configuration.
fn enricher_params(config: &WardenConfig) -> EnricherParams {
    let directory = config
        .agents
        .iter()
        .map(|(id, entry)| {
            (id.clone(), AgentProfile {
                agent_type: entry.agent_type.clone(),
                clearance_level: entry.clearance_level,
                trust_score: entry.trust_score,
                tags: entry.tags.clone(),
            })
        })
        .collect();
    EnricherParams {
        hours: BusinessHours {
            start: config.hours.start.clone(),
            end: config.hours.end.clone(),
            timezone: config.hours.timezone.clone(),
        },
        directory,
        geo: GeoTable::new(
            config.geo.iter().map(|entry| (entry.prefix.clone(), entry.country.clone())).collect(),
        ),
        flagged_countries: config.security.flagged_countries.clone(),
    }
}

/// Builds the anonymizer configuration, generating a secret when absent.
fn anonymizer_config(config: &WardenConfig) -> AnonymizerConfig {
    let secret = match &config.security.anonymization_secret {
        Some(secret) => secret.as_bytes().to_vec(),
        None => {
            let mut secret = vec![0_u8; 32];
            rand::thread_rng().fill_bytes(&mut secret);
            secret
        }
    };
    AnonymizerConfig {
        default_method: AnonymizeMethod::Mask,
        secret,
    }
}

/// Converts upstream configuration entries into router specs.
fn upstream_specs(config: &WardenConfig) -> Vec<UpstreamSpec> {
    config
        .upstreams
        .iter()
        .filter_map(|upstream| match (&upstream.command, &upstream.url) {
            (Some(command), None) => Some(UpstreamSpec::Stdio {
                name: upstream.name.clone(),
                command: command.clone(),
                args: upstream.args.clone(),
                env: upstream.env.clone().into_iter().collect(),
                readiness: Duration::from_millis(upstream.readiness_ms),
                request_timeout: Duration::from_millis(upstream.request_timeout_ms),
            }),
            (None, Some(url)) => Some(UpstreamSpec::Http {
                name: upstream.name.clone(),
                url: url.clone(),
                request_timeout: Duration::from_millis(upstream.request_timeout_ms),
            }),
            _ => None,
        })
        .collect()
}

// ============================================================================
// SECTION: Lifecycle Handler
// ============================================================================

/// Lifecycle handler surfacing due actions through diagnostics.
///
/// Actual data mutation belongs to the owning upstream; the gateway records
/// that the deadline fired and leaves execution to the deployment's
/// operational tooling.
struct DiagnosticLifecycleHandler {
    /// Diagnostics facility.
    diagnostics: Arc<Diagnostics>,
}

#[async_trait]
impl LifecycleHandler for DiagnosticLifecycleHandler {
    async fn perform(&self, action: &ScheduledAction) -> Result<(), ObligationError> {
        self.diagnostics.info(
            "lifecycle",
            &format!("deferred action due: {} on {}", action.verb.as_str(), action.resource),
        );
        Ok(())
    }
}
