// crates/warden-providers/src/judge.rs
// ============================================================================
// Module: Warden Judge Adapters
// Description: HTTP adapter for the AI policy judge.
// Purpose: Bridge the Judge interface to an external judgment endpoint.
// Dependencies: warden-core, reqwest, serde
// ============================================================================

//! ## Overview
//! The HTTP judge posts the sealed context and the policy text to a
//! configured endpoint and expects a judgment document back. Calls carry a
//! request timeout and a retry budget for transient transport failures; any
//! exhausted or malformed exchange surfaces as a judge error, which the
//! pipeline treats as inconclusive.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use warden_core::DecisionContext;
use warden_core::Judge;
use warden_core::JudgeError;
use warden_core::Judgment;
use warden_core::RetryPolicy;

// ============================================================================
// SECTION: HTTP Judge
// ============================================================================

/// Configuration for the HTTP judge adapter.
#[derive(Debug, Clone)]
pub struct HttpJudgeConfig {
    /// Judgment endpoint URL.
    pub url: String,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Attempts for transient transport failures, including the first.
    pub max_attempts: u32,
}

/// Request payload posted to the judgment endpoint.
#[derive(Serialize)]
struct JudgeRequest<'a> {
    /// Sealed decision context.
    context: &'a DecisionContext,
    /// Canonical policy text.
    policy_text: &'a str,
}

/// Judge adapter over an HTTP JSON endpoint.
pub struct HttpJudge {
    /// Shared HTTP client.
    client: reqwest::Client,
    /// Adapter configuration.
    config: HttpJudgeConfig,
    /// Retry policy for transient failures.
    retry: RetryPolicy,
}

impl HttpJudge {
    /// Creates the adapter from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`JudgeError::Unavailable`] when the client cannot be built.
    pub fn new(config: HttpJudgeConfig) -> Result<Self, JudgeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| JudgeError::Unavailable(err.to_string()))?;
        let retry = RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: 200,
            cap_delay_ms: 2_000,
        };
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    /// Posts one judgment request.
    async fn post(
        &self,
        context: &DecisionContext,
        policy_text: &str,
    ) -> Result<Judgment, JudgeError> {
        let response = self
            .client
            .post(&self.config.url)
            .json(&JudgeRequest {
                context,
                policy_text,
            })
            .send()
            .await
            .map_err(classify_transport_error)?;
        if response.status().is_server_error() {
            return Err(JudgeError::Unavailable(format!(
                "judge endpoint returned {}",
                response.status()
            )));
        }
        if !response.status().is_success() {
            return Err(JudgeError::Backend(format!(
                "judge endpoint returned {}",
                response.status()
            )));
        }
        response.json::<Judgment>().await.map_err(|err| JudgeError::Backend(err.to_string()))
    }
}

#[async_trait]
impl Judge for HttpJudge {
    async fn judge(
        &self,
        context: &DecisionContext,
        policy_text: &str,
    ) -> Result<Judgment, JudgeError> {
        let outcome = self
            .retry
            .run(|_| self.post(context, policy_text), |err| {
                matches!(err, JudgeError::Timeout | JudgeError::Unavailable(_))
            })
            .await;
        outcome.map(|(judgment, _)| judgment)
    }
}

/// Classifies a reqwest failure into the judge error taxonomy.
fn classify_transport_error(err: reqwest::Error) -> JudgeError {
    if err.is_timeout() {
        JudgeError::Timeout
    } else if err.is_connect() {
        JudgeError::Unavailable(err.to_string())
    } else {
        JudgeError::Backend(err.to_string())
    }
}
