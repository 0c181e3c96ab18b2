//!
//! Controller -> Effector Operator -> spawned effector call -> TaskResult
//!
//! The controller never awaits the effector inline. Each call runs on its own
//! task under a timeout and reports back through the task channel, where the
//! event loop hands it to the controller as a completion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::controller::event_loop::TaskResult;
use crate::error::AppError;
use crate::model::queue_state::OperationId;
use crate::platform::effector::ClipboardEffector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectorCall {
    Copy,
    Paste,
}

impl EffectorCall {
    pub fn name(&self) -> &'static str {
        match self {
            EffectorCall::Copy => "copy",
            EffectorCall::Paste => "paste",
        }
    }
}

#[derive(Clone)]
pub struct EffectorOperator {
    effector: Arc<dyn ClipboardEffector>,
    task_tx: UnboundedSender<TaskResult>,
    timeout: Duration,
}

impl EffectorOperator {
    pub fn new(
        effector: Arc<dyn ClipboardEffector>,
        task_tx: UnboundedSender<TaskResult>,
        timeout: Duration,
    ) -> Self {
        Self {
            effector,
            task_tx,
            timeout,
        }
    }

    pub fn task_sender(&self) -> UnboundedSender<TaskResult> {
        self.task_tx.clone()
    }

    pub fn spawn(&self, call: EffectorCall, operation_id: OperationId) -> JoinHandle<()> {
        let effector = Arc::clone(&self.effector);
        let task_tx = self.task_tx.clone();
        let timeout = self.timeout;

        let span = info_span!(
            "effector_call",
            operation_type = call.name(),
            operation_id = %operation_id
        );

        debug!(
            marker = "EFFECTOR_SPAWN",
            operation_type = call.name(),
            operation_id = %operation_id,
            "Issuing effector call"
        );

        tokio::spawn(
            async move {
                let start = Instant::now();

                let outcome = match call {
                    EffectorCall::Copy => tokio::time::timeout(timeout, effector.invoke_copy()).await,
                    EffectorCall::Paste => {
                        tokio::time::timeout(timeout, effector.invoke_paste()).await
                    }
                };

                let result = match outcome {
                    Ok(Ok(())) => {
                        info!(
                            marker = "EFFECTOR_DONE",
                            duration_us = start.elapsed().as_micros() as u64,
                            "Effector call completed"
                        );
                        Ok(())
                    }
                    Ok(Err(e)) => {
                        warn!(marker = "EFFECTOR_FAILED", error = %e, "Effector call failed");
                        Err(AppError::effector(call.name(), e.to_string()))
                    }
                    Err(_) => {
                        warn!(
                            marker = "EFFECTOR_TIMEOUT",
                            timeout_ms = timeout.as_millis() as u64,
                            "Effector call timed out"
                        );
                        Err(AppError::TaskTimeout {
                            task_type: format!("effector_{}", call.name()),
                            timeout_ms: timeout.as_millis() as u64,
                        })
                    }
                };

                let message = match call {
                    EffectorCall::Copy => TaskResult::CopyFinished {
                        operation_id,
                        result,
                    },
                    EffectorCall::Paste => TaskResult::PasteFinished {
                        operation_id,
                        result,
                    },
                };

                if task_tx.send(message).is_err() {
                    debug!("Task channel closed before effector completion was delivered");
                }
            }
            .instrument(span),
        )
    }

    /// Report [`TaskResult::CaptureWindowClosed`] once `window` has passed.
    pub fn expire_capture(&self, operation_id: OperationId, window: Duration) -> JoinHandle<()> {
        let task_tx = self.task_tx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if task_tx
                .send(TaskResult::CaptureWindowClosed { operation_id })
                .is_err()
            {
                debug!("Task channel closed before capture window expired");
            }
        })
    }
}
