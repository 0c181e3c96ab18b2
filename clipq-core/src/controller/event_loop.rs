//! Event loop: merges console/watcher actions with task completions.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::controller::actions::Action;
use crate::error::AppError;
use crate::model::queue_state::OperationId;

/// Completion of background work started by the controller.
#[derive(Debug)]
pub enum TaskResult {
    CopyFinished {
        operation_id: OperationId,
        result: Result<(), AppError>,
    },

    PasteFinished {
        operation_id: OperationId,
        result: Result<(), AppError>,
    },

    /// The settle delay between two pastes of a batch has passed.
    BulkStepDue { operation_id: OperationId },

    /// A completed queued copy stops waiting for its capture.
    CaptureWindowClosed { operation_id: OperationId },
}

pub struct EventLoop {
    task_rx: mpsc::UnboundedReceiver<TaskResult>,
    action_rx: mpsc::UnboundedReceiver<Action>,
    event_count: u64,
}

impl EventLoop {
    pub fn new(
        task_rx: mpsc::UnboundedReceiver<TaskResult>,
        action_rx: mpsc::UnboundedReceiver<Action>,
    ) -> Self {
        info!("Initializing queue event loop");
        Self {
            task_rx,
            action_rx,
            event_count: 0,
        }
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Next action to process. Task completions are preferred so a finished
    /// paste is accounted before the next user request is looked at.
    pub async fn next_action(&mut self) -> Option<Action> {
        let action = tokio::select! {
            biased;

            Some(task_result) = self.task_rx.recv() => {
                debug!("Task result received: {:?}", task_result);
                Some(Action::TaskResult(task_result))
            }

            Some(action) = self.action_rx.recv() => {
                debug!("Direct action received: {:?}", action);
                Some(action)
            }

            else => {
                info!("Event loop terminated - no more events");
                None
            }
        };

        if action.is_some() {
            self.event_count += 1;
        }
        action
    }
}

/// Log a failed action at a level matching how bad it is.
pub fn report_error(err: &AppError) {
    if err.is_desync() {
        error!(marker = "QUEUE_DESYNC", error = %err, "Queue cursor out of sync with history");
    } else if err.is_refusal() {
        warn!(marker = "ACTION_REFUSED", error = %err, "Action refused");
    } else {
        error!(marker = "ACTION_FAILED", error = %err, "Action failed");
    }
}
