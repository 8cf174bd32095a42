//! Solo: single-orderer consensus.
//!
//! Envelopes queue until either `block_size` is reached (cut immediately)
//! or the cut timer fires. The timer is armed by the first pending envelope
//! and cancelled by a size-triggered cut.

use super::Consensus;
use crate::error::NodeError;
use crate::orderer::OrdererService;
use async_trait::async_trait;
use litefab_chain::TransactionEnvelope;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error};

struct Pending {
    envelopes: Vec<TransactionEnvelope>,
    timer: Option<JoinHandle<()>>,
}

struct SoloInner {
    core: Arc<OrdererService>,
    block_size: usize,
    block_timeout: Duration,
    pending: Mutex<Pending>,
}

pub struct SoloConsensus {
    inner: Arc<SoloInner>,
}

impl SoloConsensus {
    pub fn new(core: Arc<OrdererService>, block_size: usize, block_timeout_ms: u64) -> Self {
        Self {
            inner: Arc::new(SoloInner {
                core,
                block_size,
                block_timeout: Duration::from_millis(block_timeout_ms),
                pending: Mutex::new(Pending {
                    envelopes: Vec::new(),
                    timer: None,
                }),
            }),
        }
    }

    fn arm_timer(inner: &Arc<SoloInner>) -> JoinHandle<()> {
        let inner = inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.block_timeout).await;
            let batch = {
                let mut pending = inner.pending.lock();
                pending.timer = None;
                std::mem::take(&mut pending.envelopes)
            };
            if batch.is_empty() {
                return;
            }
            debug!(txs = batch.len(), "cut timer fired");
            if let Err(e) = inner.core.commit_cut(batch).await {
                error!(error = %e, "timer-driven block cut failed");
            }
        })
    }
}

#[async_trait]
impl Consensus for SoloConsensus {
    async fn submit_tx(&self, envelope: TransactionEnvelope) -> Result<(), NodeError> {
        let batch = {
            let mut pending = self.inner.pending.lock();
            pending.envelopes.push(envelope);
            if pending.envelopes.len() >= self.inner.block_size {
                // size threshold reached: cancel the timer and cut now
                if let Some(timer) = pending.timer.take() {
                    timer.abort();
                }
                Some(std::mem::take(&mut pending.envelopes))
            } else {
                if pending.timer.is_none() {
                    pending.timer = Some(Self::arm_timer(&self.inner));
                }
                None
            }
        };
        if let Some(batch) = batch {
            self.inner.core.commit_cut(batch).await?;
        }
        Ok(())
    }
}
