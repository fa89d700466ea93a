// crates/warden-core/src/runtime/batch.rs
// ============================================================================
// Module: Warden Batch Judgment
// Description: Aggregating judge wrapper flushing AI calls in batches.
// Purpose: Amortize judge latency for workloads tolerating short delays.
// Dependencies: crate::core, crate::interfaces, tokio
// ============================================================================

//! ## Overview
//! The batch judge queues judgment requests and flushes when either the
//! batch size or the wait deadline is reached. Each queued item keeps its
//! own response channel and its own timeout, so per-request ordering is
//! preserved and one failing item never fails the batch. The wrapper
//! implements [`Judge`], making batching transparent to the pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

use crate::core::DecisionContext;
use crate::interfaces::Judge;
use crate::interfaces::JudgeError;
use crate::interfaces::Judgment;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Batch judge configuration.
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Maximum queued items before a flush.
    pub max_size: usize,
    /// Maximum wait before a flush in milliseconds.
    pub max_wait_ms: u64,
    /// Per-item judgment timeout in milliseconds.
    pub item_timeout_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            max_wait_ms: 50,
            item_timeout_ms: 5_000,
        }
    }
}

// ============================================================================
// SECTION: Batch Judge
// ============================================================================

/// One queued judgment request.
struct BatchItem {
    /// Sealed context for the request.
    context: Arc<DecisionContext>,
    /// Policy text to judge against.
    policy_text: String,
    /// Channel completing the caller.
    responder: oneshot::Sender<Result<Judgment, JudgeError>>,
}

/// Judge wrapper that aggregates calls into flushed batches.
pub struct BatchJudge {
    /// Queue feeding the flush task.
    queue: mpsc::Sender<BatchItem>,
}

impl BatchJudge {
    /// Spawns the flush task and returns the batching wrapper.
    #[must_use]
    pub fn new(inner: Arc<dyn Judge>, config: BatchConfig) -> Self {
        let (tx, rx) = mpsc::channel::<BatchItem>(config.max_size.max(1) * 4);
        tokio::spawn(flush_loop(inner, config, rx));
        Self {
            queue: tx,
        }
    }
}

#[async_trait]
impl Judge for BatchJudge {
    async fn judge(
        &self,
        context: &DecisionContext,
        policy_text: &str,
    ) -> Result<Judgment, JudgeError> {
        let (responder, receiver) = oneshot::channel();
        let item = BatchItem {
            context: Arc::new(context.clone()),
            policy_text: policy_text.to_string(),
            responder,
        };
        self.queue
            .send(item)
            .await
            .map_err(|_| JudgeError::Unavailable("batch queue closed".to_string()))?;
        receiver.await.map_err(|_| JudgeError::Unavailable("batch task dropped".to_string()))?
    }
}

// ============================================================================
// SECTION: Flush Loop
// ============================================================================

/// Drains the queue, flushing on size or deadline.
async fn flush_loop(inner: Arc<dyn Judge>, config: BatchConfig, mut rx: mpsc::Receiver<BatchItem>) {
    let wait = Duration::from_millis(config.max_wait_ms.max(1));
    let mut pending: Vec<BatchItem> = Vec::new();
    loop {
        let first = if pending.is_empty() {
            match rx.recv().await {
                Some(item) => Some(item),
                None => break,
            }
        } else {
            None
        };
        if let Some(item) = first {
            pending.push(item);
        }
        let deadline = tokio::time::sleep(wait);
        tokio::pin!(deadline);
        while pending.len() < config.max_size {
            tokio::select! {
                () = &mut deadline => break,
                received = rx.recv() => match received {
                    Some(item) => pending.push(item),
                    None => break,
                },
            }
        }
        flush(&inner, config, std::mem::take(&mut pending)).await;
    }
    // Channel closed; answer any stragglers with an unavailable error.
    for item in pending {
        let _ = item.responder.send(Err(JudgeError::Unavailable("shutting down".to_string())));
    }
}

/// Judges every item in the batch concurrently with per-item timeouts.
async fn flush(inner: &Arc<dyn Judge>, config: BatchConfig, batch: Vec<BatchItem>) {
    let timeout = Duration::from_millis(config.item_timeout_ms);
    let mut tasks = Vec::with_capacity(batch.len());
    for item in batch {
        let judge = Arc::clone(inner);
        tasks.push(tokio::spawn(async move {
            let outcome =
                tokio::time::timeout(timeout, judge.judge(&item.context, &item.policy_text)).await;
            let result = match outcome {
                Ok(result) => result,
                Err(_) => Err(JudgeError::Timeout),
            };
            let _ = item.responder.send(result);
        }));
    }
    for task in tasks {
        let _ = task.await;
    }
}
