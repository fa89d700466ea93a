// crates/warden-enforce/src/notify.rs
// ============================================================================
// Module: Warden Notifier
// Description: Webhook obligation executor for notify directives.
// Purpose: Deliver decision notifications to configured channels.
// Dependencies: warden-core, reqwest, serde
// ============================================================================

//! ## Overview
//! The notifier routes `notify:<channel>` obligations to configured webhook
//! endpoints. Transient transport failures classify for retry by the
//! dispatcher; an unknown channel is permanent. Payloads carry the decision
//! summary only, never raw response data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use warden_core::DecisionContext;
use warden_core::ObligationDirective;
use warden_core::ObligationError;
use warden_core::ObligationExecutor;
use warden_core::PolicyDecision;

use crate::directive::ParsedObligation;
use crate::directive::parse_obligation;

// ============================================================================
// SECTION: Notifier
// ============================================================================

/// Notifier configuration: channel name to webhook URL.
pub type NotifyChannels = BTreeMap<String, String>;

/// Notification payload posted to a channel webhook.
#[derive(Serialize)]
struct Notification<'a> {
    /// Calling agent.
    agent: &'a str,
    /// Request action label.
    action: &'a str,
    /// Request resource URI.
    resource: &'a str,
    /// Decision label.
    decision: &'a str,
    /// Decision reason.
    reason: &'a str,
}

/// Obligation executor delivering webhook notifications.
pub struct Notifier {
    /// Configured channels.
    channels: NotifyChannels,
    /// Shared HTTP client.
    client: reqwest::Client,
}

impl Notifier {
    /// Creates the notifier over the configured channels.
    ///
    /// # Errors
    ///
    /// Returns [`ObligationError::Permanent`] when the client cannot be
    /// built.
    pub fn new(channels: NotifyChannels, timeout_ms: u64) -> Result<Self, ObligationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| ObligationError::Permanent(err.to_string()))?;
        Ok(Self {
            channels,
            client,
        })
    }
}

#[async_trait]
impl ObligationExecutor for Notifier {
    fn name(&self) -> &'static str {
        "notifier"
    }

    fn handles(&self, directive: &ObligationDirective) -> bool {
        directive.as_str().starts_with("notify:")
    }

    async fn execute(
        &self,
        directive: &ObligationDirective,
        context: &DecisionContext,
        decision: &PolicyDecision,
    ) -> Result<(), ObligationError> {
        let parsed =
            parse_obligation(directive).map_err(|err| ObligationError::Permanent(err.to_string()))?;
        let ParsedObligation::Notify {
            channel,
        } = parsed
        else {
            return Err(ObligationError::Permanent("directive is not a notify form".to_string()));
        };
        let Some(url) = self.channels.get(&channel) else {
            return Err(ObligationError::Permanent(format!("unknown notify channel {channel}")));
        };
        let payload = Notification {
            agent: context.agent.as_str(),
            action: context.action.as_str(),
            resource: context.resource.as_str(),
            decision: decision.decision.as_str(),
            reason: &decision.reason,
        };
        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() || err.is_connect() {
                    ObligationError::Transient(err.to_string())
                } else {
                    ObligationError::Permanent(err.to_string())
                }
            })?;
        if response.status().is_server_error() {
            return Err(ObligationError::Transient(format!(
                "channel {channel} returned {}",
                response.status()
            )));
        }
        if !response.status().is_success() {
            return Err(ObligationError::Permanent(format!(
                "channel {channel} returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
