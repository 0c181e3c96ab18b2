//! Bulk paste as a small driven state machine.
//!
//! Each step is: paste, wait for its completion, wait `bulk_paste_delay`,
//! repeat. The controller owns the [`BulkPaste`]; the delay runs as a spawned
//! timer that reports back with [`TaskResult::BulkStepDue`], so a second paste
//! can never be issued before the previous completion has been handled.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::controller::event_loop::TaskResult;
use crate::model::queue_state::OperationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkPhase {
    /// A paste has been issued and its completion is outstanding
    Pasting,

    /// Between two pastes, waiting for the settle timer
    Settling,
}

/// What to do after a paste of the batch completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkStep {
    Settle,
    Finished,
}

#[derive(Debug)]
pub struct BulkPaste {
    remaining: usize,
    phase: BulkPhase,
    token: CancellationToken,
}

impl BulkPaste {
    /// A batch whose first paste is about to be issued.
    pub fn new(count: usize) -> Self {
        Self {
            remaining: count,
            phase: BulkPhase::Pasting,
            token: CancellationToken::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn phase(&self) -> BulkPhase {
        self.phase
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn paste_completed(&mut self) -> BulkStep {
        self.remaining = self.remaining.saturating_sub(1);

        if self.remaining == 0 || self.is_cancelled() {
            return BulkStep::Finished;
        }
        self.phase = BulkPhase::Settling;
        BulkStep::Settle
    }

    pub fn begin_paste(&mut self) {
        self.phase = BulkPhase::Pasting;
    }
}

/// Deliver `BulkStepDue` after `delay`, or at once if the batch is cancelled meanwhile.
pub fn schedule_step(
    task_tx: UnboundedSender<TaskResult>,
    operation_id: OperationId,
    delay: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(
                    marker = "BULK_PASTE_TIMER",
                    operation_id = %operation_id,
                    "Settle timer cut short by cancellation"
                );
            }
            _ = tokio::time::sleep(delay) => {
                trace!(
                    marker = "BULK_PASTE_TIMER",
                    operation_id = %operation_id,
                    delay_ms = delay.as_millis() as u64,
                    "Settle timer elapsed"
                );
            }
        }

        let _ = task_tx.send(TaskResult::BulkStepDue { operation_id });
    })
}
