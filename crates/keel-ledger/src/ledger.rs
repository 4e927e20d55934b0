//! The ledger writer task and its handle.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use keel_core::config::LedgerConfig;

use crate::apply::Applier;
use crate::error::{LedgerError, TransitionError};
use crate::transition::{Receipt, Transition};

struct Submission {
    transition: Transition,
    reply: oneshot::Sender<Result<Receipt, TransitionError>>,
}

/// Spawns the single writer that serializes every transition.
pub struct Ledger;

impl Ledger {
    /// Start the writer on the current tokio runtime.
    ///
    /// The writer stops once every [`LedgerHandle`] has been dropped.
    pub fn spawn(
        applier: Applier,
        config: &LedgerConfig,
    ) -> Result<(LedgerHandle, JoinHandle<()>), LedgerError> {
        let height = applier.store().height()?;
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let (height_tx, height_rx) = watch::channel(height);
        let task = tokio::spawn(run(applier, rx, height_tx));
        info!(height, "ledger writer started");
        Ok((
            LedgerHandle {
                tx,
                height: height_rx,
                timeout: config.finality_timeout(),
            },
            task,
        ))
    }
}

async fn run(
    applier: Applier,
    mut rx: mpsc::Receiver<Submission>,
    height_tx: watch::Sender<u64>,
) {
    let mut height = *height_tx.borrow();
    while let Some(Submission { transition, reply }) = rx.recv().await {
        let next = height + 1;
        let result = applier.apply(&transition, next);
        let result = match result {
            Ok(outcome) => {
                if outcome.committed() {
                    height = next;
                    height_tx.send_replace(height);
                    info!(kind = transition.kind(), height, "transition finalized");
                } else {
                    debug!(kind = transition.kind(), height, "transition left state unchanged");
                }
                Ok(Receipt { height, outcome })
            }
            Err(e) => {
                warn!(kind = transition.kind(), error = %e, "transition rejected");
                Err(e)
            }
        };
        // The submitter may have timed out and gone away.
        let _ = reply.send(result);
    }
    info!(height, "ledger writer stopped");
}

/// Submission side of the ledger. Cheap to clone.
#[derive(Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<Submission>,
    height: watch::Receiver<u64>,
    timeout: Duration,
}

impl LedgerHandle {
    /// Submit a transition and wait until it is finalized or rejected.
    ///
    /// On `Timeout` the transition may still be applied later; compare
    /// heights before resubmitting.
    pub async fn submit(&self, transition: Transition) -> Result<Receipt, LedgerError> {
        let (reply, rx) = oneshot::channel();
        let submission = Submission { transition, reply };
        let finalized = async {
            self.tx
                .send(submission)
                .await
                .map_err(|_| LedgerError::Closed)?;
            rx.await
                .map_err(|_| LedgerError::Closed)?
                .map_err(LedgerError::Rejected)
        };
        tokio::time::timeout(self.timeout, finalized)
            .await
            .map_err(|_| LedgerError::Timeout)?
    }

    /// Wait until the ledger reaches at least `height`.
    pub async fn wait_for_height(&self, height: u64) -> Result<u64, LedgerError> {
        let mut rx = self.height.clone();
        let reached = tokio::time::timeout(self.timeout, rx.wait_for(|h| *h >= height))
            .await
            .map_err(|_| LedgerError::Timeout)?
            .map_err(|_| LedgerError::Closed)?;
        Ok(*reached)
    }

    /// Height of the last finalized transition.
    pub fn current_height(&self) -> u64 {
        *self.height.borrow()
    }
}
