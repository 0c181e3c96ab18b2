//! QueueController: user-facing queue operations on top of the cursor
//!
//! Runs on the single control task. Effector calls are spawned through the
//! [`EffectorOperator`] and come back as [`TaskResult`]s; between issue and
//! completion the controller is not blocked, but every user-facing entry
//! point refuses to start while [`Activity`] is not `Idle`.

use std::sync::Arc;

use clipq::{
    ClipboardMirror, HistoryItem, HistoryLog, HistoryStore, PinMode, QueueConfig, QueueCursor,
    QueueError,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::controller::actions::Action;
use crate::controller::event_loop::TaskResult;
use crate::error::AppError;
use crate::model::queue_state::{Activity, OperationId, QueueSnapshot};
use crate::operators::bulk_paste::{self, BulkPaste, BulkPhase, BulkStep};
use crate::operators::effector_operator::{EffectorCall, EffectorOperator};
use crate::platform::effector::ClipboardEffector;
use crate::platform::permission::PermissionGate;
use crate::platform::presentation::Presentation;

/// External collaborators the controller drives.
#[derive(Clone)]
pub struct Collaborators {
    pub mirror: Arc<dyn ClipboardMirror>,
    pub effector: Arc<dyn ClipboardEffector>,
    pub permission: Arc<dyn PermissionGate>,
    pub presentation: Arc<dyn Presentation>,
}

pub struct QueueController<H: HistoryStore = HistoryLog> {
    history: H,
    cursor: QueueCursor,
    config: QueueConfig,
    mirror: Arc<dyn ClipboardMirror>,
    permission: Arc<dyn PermissionGate>,
    presentation: Arc<dyn Presentation>,
    operator: EffectorOperator,
    activity: Activity,
    /// Queued copy whose capture has not arrived yet
    pending_capture: Option<OperationId>,
    highlighted: Option<usize>,
    signalled_head: Option<usize>,
    signalled_busy: bool,
}

impl<H: HistoryStore> QueueController<H> {
    pub fn new(
        history: H,
        config: QueueConfig,
        collaborators: Collaborators,
        task_tx: UnboundedSender<TaskResult>,
    ) -> Self {
        let operator =
            EffectorOperator::new(collaborators.effector, task_tx, config.effector_timeout);

        Self {
            history,
            cursor: QueueCursor::new(config.pin_mode),
            config,
            mirror: collaborators.mirror,
            permission: collaborators.permission,
            presentation: collaborators.presentation,
            operator,
            activity: Activity::Idle,
            pending_capture: None,
            highlighted: None,
            signalled_head: None,
            signalled_busy: false,
        }
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn cursor(&self) -> &QueueCursor {
        &self.cursor
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.activity.is_busy()
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            is_on: self.cursor.is_on(),
            size: self.cursor.size(),
            head_index: self.cursor.head_index(),
            busy: self.is_busy(),
            mode: self.cursor.mode(),
            history_len: self.history.len(),
        }
    }

    /// Route one action. Console-only actions (`Status`, `History`, `Quit`)
    /// are the caller's business and are ignored here.
    pub fn dispatch(&mut self, action: Action) -> Result<(), AppError> {
        match action {
            Action::StartQueueMode => self.start_queue_mode(),
            Action::QueuedCopy => self.queued_copy(),
            Action::QueuedPaste => self.queued_paste(),
            Action::QueuedPasteMultiple(count) => self.queued_paste_multiple(count),
            Action::CancelBulkPaste => {
                self.cancel_bulk_paste();
                Ok(())
            }
            Action::CancelQueueMode => self.cancel_queue_mode(),
            Action::DeleteHistoryItem(index) => self.delete_history_item(index),
            Action::DeleteHighlightedItem => self.delete_highlighted_item(),
            Action::UndoLastCopy => self.undo_last_copy(),
            Action::JumpTo(index) => self.jump_to(index),
            Action::Highlight(index) => self.highlight(index),
            Action::SetPinMode(mode) => self.set_pin_mode(mode),
            Action::ClearHistory => self.clear_history(),
            Action::CaptureObserved(item) => self.capture_observed(item),
            Action::TaskResult(result) => self.handle_task_result(result),
            Action::Status | Action::History | Action::Quit => Ok(()),
        }
    }

    /* ===================== user-facing operations ===================== */

    #[instrument(level = "info", skip(self))]
    pub fn start_queue_mode(&mut self) -> Result<(), AppError> {
        self.ensure_idle()?;
        self.presentation.cancel_interaction();
        self.ensure_permission()?;

        self.cursor.on(true);
        info!(marker = "QUEUE_START", "Queue mode started");

        self.emit_signals();
        Ok(())
    }

    #[instrument(level = "info", skip(self))]
    pub fn queued_copy(&mut self) -> Result<(), AppError> {
        self.ensure_idle()?;
        self.ensure_permission()?;

        let operation_id = OperationId::new();
        self.pending_capture = Some(operation_id.clone());
        self.operator.spawn(EffectorCall::Copy, operation_id.clone());
        self.activity = Activity::CopyInFlight { operation_id };

        self.emit_signals();
        Ok(())
    }

    #[instrument(level = "info", skip(self))]
    pub fn queued_paste(&mut self) -> Result<(), AppError> {
        self.ensure_idle()?;
        if !self.cursor.is_on() || self.cursor.size() == 0 {
            return Err(QueueError::NoSuchItem.into());
        }
        self.ensure_permission()?;

        self.cursor
            .put_next_on_clipboard(self.history.all(), self.mirror.as_ref())?;

        let operation_id = OperationId::new();
        self.operator.spawn(EffectorCall::Paste, operation_id.clone());
        self.activity = Activity::PasteInFlight {
            operation_id,
            bulk: None,
        };

        self.emit_signals();
        Ok(())
    }

    #[instrument(level = "info", skip(self))]
    pub fn queued_paste_multiple(&mut self, count: usize) -> Result<(), AppError> {
        self.ensure_idle()?;

        let size = self.cursor.size();
        if count == 0 || count > size {
            return Err(AppError::invalid_input(
                "count",
                format!("must be between 1 and {size}, got {count}"),
            ));
        }
        if count == 1 {
            return self.queued_paste();
        }
        self.ensure_permission()?;

        self.cursor
            .put_next_on_clipboard(self.history.all(), self.mirror.as_ref())?;

        let operation_id = OperationId::new();
        info!(
            marker = "BULK_PASTE_START",
            operation_id = %operation_id,
            count,
            "Starting bulk paste"
        );

        self.operator.spawn(EffectorCall::Paste, operation_id.clone());
        self.activity = Activity::PasteInFlight {
            operation_id,
            bulk: Some(BulkPaste::new(count)),
        };

        self.emit_signals();
        Ok(())
    }

    /// Stop a bulk paste once the paste in flight completes.
    /// Returns false when no bulk paste is running.
    pub fn cancel_bulk_paste(&mut self) -> bool {
        match &self.activity {
            Activity::PasteInFlight {
                operation_id,
                bulk: Some(bulk),
            } => {
                info!(
                    marker = "BULK_PASTE_CANCEL",
                    operation_id = %operation_id,
                    remaining = bulk.remaining(),
                    "Cancelling bulk paste"
                );
                bulk.cancel();
                true
            }
            _ => false,
        }
    }

    /// Abort queueing. Allowed while busy; a running bulk paste is cancelled.
    #[instrument(level = "info", skip(self))]
    pub fn cancel_queue_mode(&mut self) -> Result<(), AppError> {
        self.cancel_bulk_paste();
        self.pending_capture = None;

        self.cursor.off(self.history.all(), self.mirror.as_ref());
        if self.cursor.mode() == PinMode::Latest
            && let Some(latest) = self.history.get(0)
        {
            self.mirror.write(latest);
        }

        info!(marker = "QUEUE_CANCEL", "Queue mode cancelled");
        self.emit_signals();
        Ok(())
    }

    /// Delete a log entry. Queue accounting follows, the clipboard does not.
    #[instrument(level = "info", skip(self))]
    pub fn delete_history_item(&mut self, index: usize) -> Result<(), AppError> {
        self.ensure_idle()?;

        let id = self
            .history
            .get(index)
            .map(|item| item.id)
            .ok_or_else(|| AppError::invalid_input("index", format!("no history entry at {index}")))?;

        self.history.remove(id);
        let was_queued = self.cursor.forget_slot(index);
        self.shift_highlight_after_removal(index);

        info!(
            marker = "HISTORY_DELETE",
            index,
            was_queued,
            size = self.cursor.size(),
            "History entry deleted"
        );

        self.emit_signals();
        Ok(())
    }

    pub fn delete_highlighted_item(&mut self) -> Result<(), AppError> {
        let index = self
            .highlighted
            .ok_or_else(|| AppError::invalid_input("highlight", "nothing is highlighted"))?;
        self.delete_history_item(index)
    }

    /// Drop the newest capture. An in-progress queue keeps its paste target
    /// on the clipboard.
    #[instrument(level = "info", skip(self))]
    pub fn undo_last_copy(&mut self) -> Result<(), AppError> {
        self.ensure_idle()?;

        let id = self
            .history
            .get(0)
            .map(|item| item.id)
            .ok_or_else(|| AppError::invalid_input("history", "nothing to undo"))?;

        self.history.remove(id);
        self.cursor.forget_slot(0);
        self.shift_highlight_after_removal(0);

        let pin_index = self.cursor.head_index().unwrap_or(0);
        match self.history.get(pin_index) {
            Some(item) => self.mirror.write(item),
            None if self.cursor.head_index().is_some() => {
                self.emit_signals();
                return Err(QueueError::SizeExceedsHistory {
                    index: pin_index,
                    len: self.history.len(),
                }
                .into());
            }
            None => self.mirror.clear(),
        }

        info!(marker = "UNDO_COPY", size = self.cursor.size(), "Last copy undone");
        self.emit_signals();
        Ok(())
    }

    /// Replay from history: everything from `index` to the newest entry is queued.
    #[instrument(level = "info", skip(self))]
    pub fn jump_to(&mut self, index: usize) -> Result<(), AppError> {
        self.ensure_idle()?;
        self.cursor
            .set_head(index, self.history.all(), self.mirror.as_ref())?;
        self.emit_signals();
        Ok(())
    }

    pub fn highlight(&mut self, index: Option<usize>) -> Result<(), AppError> {
        if let Some(i) = index
            && i >= self.history.len()
        {
            return Err(AppError::invalid_input(
                "highlight",
                format!("{i} is outside a history of {}", self.history.len()),
            ));
        }
        self.highlighted = index;
        Ok(())
    }

    pub fn set_pin_mode(&mut self, mode: PinMode) -> Result<(), AppError> {
        self.ensure_idle()?;
        self.cursor
            .set_mode(mode, self.history.all(), self.mirror.as_ref())?;
        self.config.pin_mode = mode;
        info!(marker = "PIN_MODE", mode = ?mode, "Pinning policy changed");
        Ok(())
    }

    pub fn clear_history(&mut self) -> Result<(), AppError> {
        self.ensure_idle()?;
        self.pending_capture = None;
        self.history.clear();
        self.cursor.off(self.history.all(), self.mirror.as_ref());
        self.highlighted = None;

        info!(marker = "HISTORY_CLEAR", "History cleared");
        self.emit_signals();
        Ok(())
    }

    /* ======================= capture and completions ======================= */

    /// New clipboard contents seen by the watcher: log first, then track.
    pub fn capture_observed(&mut self, item: HistoryItem) -> Result<(), AppError> {
        if item.is_engine_write() {
            trace!(marker = "CAPTURE_SELF", "Ignoring the engine's own clipboard write");
            return Ok(());
        }

        let pending = self.pending_capture.take().is_some();
        let joins = self.cursor.is_on() || pending;

        let Some(outcome) = self.history.add(item) else {
            return Ok(());
        };

        let tracked = if joins {
            // Equal entries already inside the queue are re-queued once, at the tail.
            for &replaced in outcome.replaced.iter().rev() {
                self.cursor.forget_slot(replaced);
            }
            self.cursor
                .add(self.history.all(), self.mirror.as_ref())
                .map_err(AppError::from)
        } else {
            Ok(())
        };

        let evicted = self
            .history
            .trim(self.config.history_limit, self.cursor.size());
        if !evicted.is_empty() {
            self.highlighted = self.highlighted.filter(|h| *h < self.history.len());
        }

        debug!(
            marker = "CAPTURE",
            joins,
            merged = outcome.replaced.len(),
            size = self.cursor.size(),
            history_len = self.history.len(),
            "Capture recorded"
        );

        self.emit_signals();
        tracked
    }

    pub fn handle_task_result(&mut self, result: TaskResult) -> Result<(), AppError> {
        match result {
            TaskResult::CopyFinished {
                operation_id,
                result,
            } => self.on_copy_finished(operation_id, result),
            TaskResult::PasteFinished {
                operation_id,
                result,
            } => self.on_paste_finished(operation_id, result),
            TaskResult::BulkStepDue { operation_id } => self.on_bulk_step_due(operation_id),
            TaskResult::CaptureWindowClosed { operation_id } => {
                self.on_capture_window_closed(operation_id);
                Ok(())
            }
        }
    }

    fn on_copy_finished(
        &mut self,
        operation_id: OperationId,
        result: Result<(), AppError>,
    ) -> Result<(), AppError> {
        let current = matches!(
            &self.activity,
            Activity::CopyInFlight { operation_id: id } if *id == operation_id
        );
        if !current {
            warn!(marker = "STALE_COMPLETION", operation_id = %operation_id, "Ignoring stale copy completion");
            return Ok(());
        }

        self.activity = Activity::Idle;
        match &result {
            Err(_) => self.pending_capture = None,
            Ok(()) if self.pending_capture.as_ref() == Some(&operation_id) => {
                self.operator
                    .expire_capture(operation_id, self.config.capture_window);
            }
            Ok(()) => {}
        }

        self.emit_signals();
        result
    }

    fn on_capture_window_closed(&mut self, operation_id: OperationId) {
        if self.pending_capture.as_ref() != Some(&operation_id) {
            trace!(operation_id = %operation_id, "Capture window closed after its capture");
            return;
        }

        self.pending_capture = None;
        info!(
            marker = "CAPTURE_WINDOW_CLOSED",
            operation_id = %operation_id,
            "Queued copy produced no capture"
        );
    }

    fn on_paste_finished(
        &mut self,
        operation_id: OperationId,
        result: Result<(), AppError>,
    ) -> Result<(), AppError> {
        let bulk = match std::mem::take(&mut self.activity) {
            Activity::PasteInFlight {
                operation_id: id,
                bulk,
            } if id == operation_id => bulk,
            other => {
                self.activity = other;
                warn!(marker = "STALE_COMPLETION", operation_id = %operation_id, "Ignoring stale paste completion");
                return Ok(());
            }
        };

        let Some(mut bulk) = bulk else {
            let outcome = match result {
                Ok(()) => self.pop_after_paste(),
                Err(err) => {
                    // The head was staged for this paste; hand the clipboard back.
                    if let Err(restore) = self
                        .cursor
                        .restore_latest(self.history.all(), self.mirror.as_ref())
                    {
                        error!(marker = "QUEUE_DESYNC", error = %restore, "Could not restore clipboard after failed paste");
                    }
                    Err(err)
                }
            };
            self.emit_signals();
            return outcome;
        };

        if let Err(err) = result {
            warn!(
                marker = "BULK_PASTE_ABORT",
                operation_id = %operation_id,
                remaining = bulk.remaining(),
                "Bulk paste stopped by failed paste"
            );
            self.finish_bulk()?;
            return Err(err);
        }

        if self.cursor.size() > 0
            && let Err(err) = self
                .cursor
                .bulk_remove_next(self.history.all(), self.mirror.as_ref())
        {
            self.finish_bulk()?;
            return Err(err.into());
        }

        let step = match bulk.paste_completed() {
            BulkStep::Settle if self.cursor.size() > 0 => BulkStep::Settle,
            _ => BulkStep::Finished,
        };

        match step {
            BulkStep::Finished => self.finish_bulk(),
            BulkStep::Settle => {
                bulk_paste::schedule_step(
                    self.operator.task_sender(),
                    operation_id.clone(),
                    self.config.bulk_paste_delay,
                    bulk.token().clone(),
                );
                self.activity = Activity::PasteInFlight {
                    operation_id,
                    bulk: Some(bulk),
                };
                self.emit_signals();
                Ok(())
            }
        }
    }

    fn on_bulk_step_due(&mut self, operation_id: OperationId) -> Result<(), AppError> {
        let cancelled = match &self.activity {
            Activity::PasteInFlight {
                operation_id: id,
                bulk: Some(bulk),
            } if *id == operation_id && bulk.phase() == BulkPhase::Settling => bulk.is_cancelled(),
            _ => {
                warn!(marker = "STALE_COMPLETION", operation_id = %operation_id, "Ignoring stale bulk step");
                return Ok(());
            }
        };

        if cancelled || self.cursor.size() == 0 {
            info!(marker = "BULK_PASTE_STOP", operation_id = %operation_id, "Bulk paste stopped early");
            return self.finish_bulk();
        }

        if !self.permission.is_granted() {
            self.finish_bulk()?;
            return Err(AppError::PermissionDenied);
        }

        if let Activity::PasteInFlight {
            bulk: Some(bulk), ..
        } = &mut self.activity
        {
            bulk.begin_paste();
        }
        self.operator.spawn(EffectorCall::Paste, operation_id);
        Ok(())
    }

    fn pop_after_paste(&mut self) -> Result<(), AppError> {
        if self.cursor.size() == 0 {
            debug!("Queue emptied while the paste was in flight");
            return Ok(());
        }

        self.cursor
            .remove(None, self.history.all(), self.mirror.as_ref())?;
        self.cursor
            .restore_latest(self.history.all(), self.mirror.as_ref())?;
        Ok(())
    }

    fn finish_bulk(&mut self) -> Result<(), AppError> {
        self.activity = Activity::Idle;
        let outcome = self
            .cursor
            .finish_bulk_remove(self.history.all(), self.mirror.as_ref());

        info!(marker = "BULK_PASTE_DONE", size = self.cursor.size(), "Bulk paste finished");
        self.emit_signals();
        outcome.map_err(AppError::from)
    }

    /* ============================== helpers ============================== */

    fn ensure_idle(&self) -> Result<(), AppError> {
        if self.activity.is_busy() {
            return Err(AppError::Busy {
                activity: self.activity.name(),
            });
        }
        Ok(())
    }

    fn ensure_permission(&self) -> Result<(), AppError> {
        if self.permission.is_granted() {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    fn shift_highlight_after_removal(&mut self, removed: usize) {
        self.highlighted = match self.highlighted {
            Some(h) if h > removed => Some(h - 1),
            Some(h) if h == removed => None,
            other => other,
        };
    }

    /// Tell presentation about head/busy changes and verify the cursor invariants.
    fn emit_signals(&mut self) {
        let head = self.cursor.head_index();
        if head != self.signalled_head {
            self.signalled_head = head;
            self.presentation.on_head_of_queue_changed(head);
        }

        let busy = self.activity.is_busy();
        if busy != self.signalled_busy {
            self.signalled_busy = busy;
            self.presentation.on_busy_changed(busy);
        }

        if let Err(err) = self.cursor.check(self.history.len()) {
            error!(marker = "QUEUE_INVARIANT", error = %err, "Queue invariant broken");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::effector::EffectorError;
    use crate::platform::shared_clipboard::SharedClipboard;
    use async_trait::async_trait;
    use clipq::{Payload, PayloadKind};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio::time::Instant;

    struct ScriptedEffector {
        clipboard: SharedClipboard,
        pastes: Mutex<Vec<(Instant, Option<String>)>>,
        fail_copy: AtomicBool,
        fail_paste_at: Mutex<Option<usize>>,
    }

    impl ScriptedEffector {
        fn new(clipboard: SharedClipboard) -> Self {
            Self {
                clipboard,
                pastes: Mutex::new(Vec::new()),
                fail_copy: AtomicBool::new(false),
                fail_paste_at: Mutex::new(None),
            }
        }

        fn pasted(&self) -> Vec<String> {
            self.pastes
                .lock()
                .unwrap()
                .iter()
                .filter_map(|(_, text)| text.clone())
                .collect()
        }

        fn paste_times(&self) -> Vec<Instant> {
            self.pastes.lock().unwrap().iter().map(|(at, _)| *at).collect()
        }
    }

    #[async_trait]
    impl ClipboardEffector for ScriptedEffector {
        async fn invoke_copy(&self) -> Result<(), EffectorError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail_copy.load(Ordering::SeqCst) {
                return Err(EffectorError::Unavailable("no focused window".to_string()));
            }
            Ok(())
        }

        async fn invoke_paste(&self) -> Result<(), EffectorError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let mut pastes = self.pastes.lock().unwrap();
            if *self.fail_paste_at.lock().unwrap() == Some(pastes.len()) {
                return Err(EffectorError::Rejected("secure input".to_string()));
            }
            pastes.push((Instant::now(), self.clipboard.current_text()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPresentation {
        heads: Mutex<Vec<Option<usize>>>,
        busy: Mutex<Vec<bool>>,
        cancelled: AtomicUsize,
    }

    impl Presentation for RecordingPresentation {
        fn on_head_of_queue_changed(&self, index: Option<usize>) {
            self.heads.lock().unwrap().push(index);
        }

        fn on_busy_changed(&self, busy: bool) {
            self.busy.lock().unwrap().push(busy);
        }

        fn cancel_interaction(&self) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Gate(AtomicBool);

    impl PermissionGate for Gate {
        fn is_granted(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct Harness {
        controller: QueueController,
        task_rx: UnboundedReceiver<TaskResult>,
        clipboard: SharedClipboard,
        effector: Arc<ScriptedEffector>,
        presentation: Arc<RecordingPresentation>,
        gate: Arc<Gate>,
    }

    impl Harness {
        fn new(mode: PinMode) -> Self {
            Self::with_config(QueueConfig {
                pin_mode: mode,
                ..QueueConfig::default()
            })
        }

        fn with_config(config: QueueConfig) -> Self {
            let clipboard = SharedClipboard::new();
            let effector = Arc::new(ScriptedEffector::new(clipboard.clone()));
            let presentation = Arc::new(RecordingPresentation::default());
            let gate = Arc::new(Gate(AtomicBool::new(true)));
            let (task_tx, task_rx) = mpsc::unbounded_channel();

            let controller = QueueController::new(
                HistoryLog::new(),
                config,
                Collaborators {
                    mirror: Arc::new(clipboard.clone()),
                    effector: effector.clone(),
                    permission: gate.clone(),
                    presentation: presentation.clone(),
                },
                task_tx,
            );

            Self {
                controller,
                task_rx,
                clipboard,
                effector,
                presentation,
                gate,
            }
        }

        /// A copy made in some application, reported by the watcher.
        fn capture(&mut self, text: &str) {
            let item = HistoryItem::from_text(text);
            self.clipboard.set(item.clone());
            self.controller.capture_observed(item).unwrap();
        }

        async fn queued_capture(&mut self, text: &str) {
            self.controller.queued_copy().unwrap();
            self.pump().await.unwrap();
            self.capture(text);
        }

        async fn pump(&mut self) -> Result<(), AppError> {
            let result = self.task_rx.recv().await.expect("task channel open");
            self.controller.handle_task_result(result)
        }

        fn clipboard_text(&self) -> Option<String> {
            self.clipboard.current_text()
        }

        fn head_title(&self) -> Option<String> {
            let head = self.controller.cursor().head_index()?;
            Some(self.controller.history().get(head)?.title.to_string())
        }

        fn assert_invariants(&self) {
            let cursor = self.controller.cursor();
            assert!(cursor.check(self.controller.history().len()).is_ok());
            if !cursor.is_on() {
                assert_eq!(cursor.size(), 0);
            }
        }
    }

    #[test]
    fn start_cancels_interaction_then_checks_permission() {
        let mut h = Harness::new(PinMode::Latest);
        h.gate.0.store(false, Ordering::SeqCst);

        assert!(matches!(
            h.controller.start_queue_mode(),
            Err(AppError::PermissionDenied)
        ));
        assert_eq!(h.presentation.cancelled.load(Ordering::SeqCst), 1);
        assert!(!h.controller.cursor().is_on());

        h.gate.0.store(true, Ordering::SeqCst);
        h.controller.start_queue_mode().unwrap();
        assert!(h.controller.cursor().is_on());
        assert!(!h.controller.cursor().turn_off_when_emptied());
        assert_eq!(h.controller.cursor().size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_copy_is_busy_until_completion() {
        let mut h = Harness::new(PinMode::Latest);

        h.controller.queued_copy().unwrap();
        assert!(h.controller.is_busy());
        assert!(matches!(
            h.controller.queued_copy(),
            Err(AppError::Busy { activity: "copy" })
        ));

        h.pump().await.unwrap();
        assert!(!h.controller.is_busy());

        h.capture("a");
        assert!(h.controller.cursor().is_on());
        assert!(h.controller.cursor().turn_off_when_emptied());
        assert_eq!(h.controller.cursor().size(), 1);
        assert_eq!(*h.presentation.busy.lock().unwrap(), [true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_copy_does_not_queue_the_next_capture() {
        let mut h = Harness::new(PinMode::Latest);
        h.effector.fail_copy.store(true, Ordering::SeqCst);

        h.controller.queued_copy().unwrap();
        assert!(matches!(h.pump().await, Err(AppError::Effector { .. })));
        assert!(!h.controller.is_busy());

        h.capture("organic");
        assert!(!h.controller.cursor().is_on());
        assert_eq!(h.controller.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_queued_copy_stops_claiming_captures() {
        let mut h = Harness::new(PinMode::Latest);

        h.controller.queued_copy().unwrap();
        h.pump().await.unwrap();
        let copied = Instant::now();
        h.pump().await.unwrap();
        assert!(Instant::now() - copied >= h.controller.config().capture_window);

        h.capture("later");
        assert!(!h.controller.cursor().is_on());
        assert_eq!(h.controller.cursor().size(), 0);
        assert_eq!(h.controller.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_window_closing_after_capture_changes_nothing() {
        let mut h = Harness::new(PinMode::Latest);
        h.queued_capture("a").await;

        h.pump().await.unwrap();
        h.capture("b");
        assert_eq!(h.controller.cursor().size(), 2);
        assert_eq!(h.head_title().as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn paste_pops_head_under_latest() {
        let mut h = Harness::new(PinMode::Latest);
        h.controller.start_queue_mode().unwrap();
        h.capture("a");
        h.capture("b");

        h.controller.queued_paste().unwrap();
        assert_eq!(h.clipboard_text().as_deref(), Some("a"));
        h.pump().await.unwrap();

        assert_eq!(h.effector.pasted(), ["a"]);
        assert_eq!(h.controller.cursor().size(), 1);
        assert_eq!(h.head_title().as_deref(), Some("b"));
        assert_eq!(h.clipboard_text().as_deref(), Some("b"));
        assert!(!h.controller.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn paste_pops_head_under_next() {
        let mut h = Harness::new(PinMode::Next);
        h.controller.start_queue_mode().unwrap();
        h.capture("a");
        h.capture("b");
        assert_eq!(h.clipboard_text().as_deref(), Some("a"));

        h.controller.queued_paste().unwrap();
        h.pump().await.unwrap();

        assert_eq!(h.effector.pasted(), ["a"]);
        assert_eq!(h.clipboard_text().as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn paste_refusals() {
        let mut h = Harness::new(PinMode::Latest);
        assert!(matches!(
            h.controller.queued_paste(),
            Err(AppError::Queue(QueueError::NoSuchItem))
        ));

        h.controller.start_queue_mode().unwrap();
        assert!(matches!(
            h.controller.queued_paste(),
            Err(AppError::Queue(QueueError::NoSuchItem))
        ));

        h.capture("a");
        h.gate.0.store(false, Ordering::SeqCst);
        assert!(matches!(
            h.controller.queued_paste(),
            Err(AppError::PermissionDenied)
        ));
        assert!(!h.controller.is_busy());

        assert!(matches!(
            h.controller.queued_paste_multiple(2),
            Err(AppError::InvalidInput { .. })
        ));
        assert!(matches!(
            h.controller.queued_paste_multiple(0),
            Err(AppError::InvalidInput { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_single_paste_keeps_queue() {
        let mut h = Harness::new(PinMode::Latest);
        h.controller.start_queue_mode().unwrap();
        h.capture("a");
        *h.effector.fail_paste_at.lock().unwrap() = Some(0);

        h.controller.queued_paste().unwrap();
        assert!(matches!(h.pump().await, Err(AppError::Effector { .. })));
        assert_eq!(h.controller.cursor().size(), 1);
        assert!(!h.controller.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_single_paste_restores_latest() {
        let mut h = Harness::new(PinMode::Latest);
        h.controller.start_queue_mode().unwrap();
        h.capture("a");
        h.capture("b");
        *h.effector.fail_paste_at.lock().unwrap() = Some(0);

        h.controller.queued_paste().unwrap();
        assert_eq!(h.clipboard_text().as_deref(), Some("a"));
        assert!(matches!(h.pump().await, Err(AppError::Effector { .. })));

        assert_eq!(h.clipboard_text().as_deref(), Some("b"));
        assert_eq!(h.controller.cursor().size(), 2);
        assert_eq!(h.head_title().as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_paste_drains_in_order_with_delay() {
        let mut h = Harness::new(PinMode::Latest);
        for text in ["a", "b", "c"] {
            h.queued_capture(text).await;
        }
        assert_eq!(h.controller.cursor().size(), 3);
        assert!(h.controller.cursor().turn_off_when_emptied());
        h.presentation.busy.lock().unwrap().clear();

        h.controller.queued_paste_multiple(3).unwrap();
        while h.controller.is_busy() {
            h.pump().await.unwrap();
            if h.controller.cursor().size() > 0 {
                assert!(h.controller.is_busy());
            }
        }

        assert_eq!(h.effector.pasted(), ["a", "b", "c"]);
        let times = h.effector.paste_times();
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(333));
        }
        assert_eq!(h.controller.cursor().size(), 0);
        assert!(!h.controller.cursor().is_on());
        assert_eq!(*h.presentation.busy.lock().unwrap(), [true, false]);
        h.assert_invariants();
    }

    #[tokio::test(start_paused = true)]
    async fn partial_bulk_paste_restores_latest() {
        let mut h = Harness::new(PinMode::Latest);
        h.controller.start_queue_mode().unwrap();
        for text in ["a", "b", "c", "d"] {
            h.capture(text);
        }

        h.controller.queued_paste_multiple(2).unwrap();
        while h.controller.is_busy() {
            h.pump().await.unwrap();
        }

        assert_eq!(h.effector.pasted(), ["a", "b"]);
        assert_eq!(h.controller.cursor().size(), 2);
        assert_eq!(h.head_title().as_deref(), Some("c"));
        assert_eq!(h.clipboard_text().as_deref(), Some("d"));
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_paste_can_be_cancelled() {
        let mut h = Harness::new(PinMode::Next);
        h.controller.start_queue_mode().unwrap();
        for text in ["a", "b", "c"] {
            h.capture(text);
        }

        h.controller.queued_paste_multiple(3).unwrap();
        assert!(h.controller.cancel_bulk_paste());
        while h.controller.is_busy() {
            h.pump().await.unwrap();
        }

        assert_eq!(h.effector.pasted(), ["a"]);
        assert_eq!(h.controller.cursor().size(), 2);
        assert!(!h.controller.cancel_bulk_paste());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_settle_stops_early() {
        let mut h = Harness::new(PinMode::Next);
        h.controller.start_queue_mode().unwrap();
        for text in ["a", "b", "c"] {
            h.capture(text);
        }

        h.controller.queued_paste_multiple(3).unwrap();
        h.pump().await.unwrap();
        assert!(h.controller.is_busy());

        let before = Instant::now();
        h.controller.cancel_queue_mode().unwrap();
        h.pump().await.unwrap();

        assert!(Instant::now() - before < Duration::from_millis(333));
        assert!(!h.controller.is_busy());
        assert!(!h.controller.cursor().is_on());
        assert_eq!(h.effector.pasted(), ["a"]);
        assert_eq!(h.clipboard_text().as_deref(), Some("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_bulk_step_stops_loop() {
        let mut h = Harness::new(PinMode::Latest);
        h.controller.start_queue_mode().unwrap();
        for text in ["a", "b", "c"] {
            h.capture(text);
        }
        *h.effector.fail_paste_at.lock().unwrap() = Some(1);

        h.controller.queued_paste_multiple(3).unwrap();
        let mut failures = 0;
        while h.controller.is_busy() {
            if h.pump().await.is_err() {
                failures += 1;
            }
        }

        assert_eq!(failures, 1);
        assert_eq!(h.effector.pasted(), ["a"]);
        assert_eq!(h.controller.cursor().size(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn user_requests_refused_while_bulk_running() {
        let mut h = Harness::new(PinMode::Latest);
        h.controller.start_queue_mode().unwrap();
        for text in ["a", "b"] {
            h.capture(text);
        }

        h.controller.queued_paste_multiple(2).unwrap();
        assert!(matches!(
            h.controller.delete_history_item(0),
            Err(AppError::Busy { activity: "bulk paste" })
        ));
        assert!(matches!(h.controller.undo_last_copy(), Err(AppError::Busy { .. })));
        assert!(matches!(h.controller.jump_to(0), Err(AppError::Busy { .. })));
    }

    #[test]
    fn deleting_before_head_keeps_queued_item() {
        let mut h = Harness::new(PinMode::Latest);
        h.controller.start_queue_mode().unwrap();
        for text in ["a", "b", "c", "d"] {
            h.capture(text);
        }
        assert_eq!(h.head_title().as_deref(), Some("a"));

        h.controller.delete_history_item(1).unwrap();
        assert_eq!(h.controller.cursor().size(), 3);
        assert_eq!(h.controller.cursor().head_index(), Some(2));
        assert_eq!(h.head_title().as_deref(), Some("a"));
        h.assert_invariants();
    }

    #[test]
    fn deleting_outside_queue_keeps_size() {
        let mut h = Harness::new(PinMode::Latest);
        h.capture("old");
        h.controller.start_queue_mode().unwrap();
        h.capture("a");

        h.controller.delete_history_item(1).unwrap();
        assert_eq!(h.controller.cursor().size(), 1);
        assert!(matches!(
            h.controller.delete_history_item(5),
            Err(AppError::InvalidInput { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_last_queued_item_turns_off_self_closing_queue() {
        let mut h = Harness::new(PinMode::Latest);
        h.queued_capture("a").await;

        h.controller.highlight(Some(0)).unwrap();
        h.controller.delete_highlighted_item().unwrap();
        assert!(!h.controller.cursor().is_on());
        assert_eq!(h.controller.highlighted(), None);
        assert!(matches!(
            h.controller.delete_highlighted_item(),
            Err(AppError::InvalidInput { .. })
        ));
    }

    #[test]
    fn undo_keeps_queue_target_on_clipboard() {
        let mut h = Harness::new(PinMode::Latest);
        h.controller.start_queue_mode().unwrap();
        for text in ["a", "b", "c"] {
            h.capture(text);
        }

        h.controller.undo_last_copy().unwrap();
        assert_eq!(h.controller.history().len(), 2);
        assert_eq!(h.controller.cursor().size(), 2);
        assert_eq!(h.clipboard_text().as_deref(), Some("a"));
    }

    #[test]
    fn undo_without_queue_restores_previous_copy() {
        let mut h = Harness::new(PinMode::Latest);
        h.capture("a");
        h.capture("b");

        h.controller.undo_last_copy().unwrap();
        assert_eq!(h.clipboard_text().as_deref(), Some("a"));

        h.controller.undo_last_copy().unwrap();
        assert!(h.clipboard.current().is_none());
        assert!(matches!(
            h.controller.undo_last_copy(),
            Err(AppError::InvalidInput { .. })
        ));
    }

    #[test]
    fn cancel_restores_newest_in_any_mode() {
        for mode in [PinMode::Latest, PinMode::Next] {
            let mut h = Harness::new(mode);
            h.controller.start_queue_mode().unwrap();
            h.capture("a");
            h.capture("b");
            h.controller.jump_to(1).unwrap();

            h.controller.cancel_queue_mode().unwrap();
            assert!(!h.controller.cursor().is_on());
            assert_eq!(h.controller.cursor().size(), 0);
            assert_eq!(h.clipboard_text().as_deref(), Some("b"));
        }
    }

    #[test]
    fn engine_writes_are_not_captured() {
        let mut h = Harness::new(PinMode::Next);
        h.controller.start_queue_mode().unwrap();
        h.capture("a");
        h.capture("b");

        let pinned = h.clipboard.current().unwrap();
        assert!(pinned.is_engine_write());
        h.controller.capture_observed(pinned).unwrap();
        assert_eq!(h.controller.cursor().size(), 2);
        assert_eq!(h.controller.history().len(), 2);
    }

    #[test]
    fn recapturing_queued_item_requeues_it_at_tail() {
        let mut h = Harness::new(PinMode::Latest);
        h.controller.start_queue_mode().unwrap();
        for text in ["a", "b", "c"] {
            h.capture(text);
        }

        h.capture("a");
        assert_eq!(h.controller.history().len(), 3);
        assert_eq!(h.controller.cursor().size(), 3);
        assert_eq!(h.head_title().as_deref(), Some("b"));
        assert_eq!(h.controller.history().get(0).unwrap().copy_count, 2);
        h.assert_invariants();
    }

    #[test]
    fn superset_recapture_requeues_every_merged_entry_once() {
        let mut h = Harness::new(PinMode::Latest);
        h.controller.start_queue_mode().unwrap();
        h.capture("a");
        let html = HistoryItem::new([Payload::new(PayloadKind::Html, "<p>a</p>")]);
        h.clipboard.set(html.clone());
        h.controller.capture_observed(html).unwrap();
        h.capture("z");
        assert_eq!(h.controller.cursor().size(), 3);

        let both = HistoryItem::from_text("a")
            .with_payload(Payload::new(PayloadKind::Html, "<p>a</p>"));
        h.clipboard.set(both.clone());
        h.controller.capture_observed(both).unwrap();

        assert_eq!(h.controller.history().len(), 2);
        assert_eq!(h.controller.cursor().size(), 2);
        assert_eq!(h.head_title().as_deref(), Some("z"));
        let all = h.controller.history().all();
        assert!(!all[0].structurally_equal(&all[1]));
        h.assert_invariants();
    }

    #[test]
    fn history_limit_never_evicts_queued_items() {
        let mut h = Harness::with_config(QueueConfig {
            history_limit: 2,
            ..QueueConfig::default()
        });
        h.controller.start_queue_mode().unwrap();
        for text in ["a", "b", "c", "d"] {
            h.capture(text);
        }
        assert_eq!(h.controller.history().len(), 4);
        assert_eq!(h.head_title().as_deref(), Some("a"));

        h.controller.cancel_queue_mode().unwrap();
        h.capture("e");
        let titles: Vec<_> = h
            .controller
            .history()
            .all()
            .iter()
            .map(|i| i.title.to_string())
            .collect();
        assert_eq!(titles, ["e", "d"]);
    }

    #[test]
    fn jump_to_replays_from_history() {
        let mut h = Harness::new(PinMode::Next);
        for text in ["a", "b", "c"] {
            h.capture(text);
        }

        h.controller.jump_to(1).unwrap();
        assert!(h.controller.cursor().is_on());
        assert_eq!(h.controller.cursor().size(), 2);
        assert_eq!(h.clipboard_text().as_deref(), Some("b"));

        assert!(matches!(
            h.controller.jump_to(3),
            Err(AppError::Queue(QueueError::NoSuchItem))
        ));
        assert_eq!(h.controller.cursor().size(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_completions_are_ignored() {
        let mut h = Harness::new(PinMode::Latest);
        h.controller.start_queue_mode().unwrap();
        h.capture("a");

        let stale = TaskResult::PasteFinished {
            operation_id: OperationId::new(),
            result: Ok(()),
        };
        h.controller.handle_task_result(stale).unwrap();
        assert_eq!(h.controller.cursor().size(), 1);

        h.controller.queued_paste().unwrap();
        let stale = TaskResult::BulkStepDue {
            operation_id: OperationId::new(),
        };
        h.controller.handle_task_result(stale).unwrap();
        assert!(h.controller.is_busy());
        h.pump().await.unwrap();
        assert_eq!(h.controller.cursor().size(), 0);
    }

    #[test]
    fn head_signal_fires_only_on_change() {
        let mut h = Harness::new(PinMode::Latest);
        h.controller.start_queue_mode().unwrap();
        h.capture("a");
        h.capture("b");
        h.controller.highlight(Some(1)).unwrap();
        h.controller.cancel_queue_mode().unwrap();
        h.controller.cancel_queue_mode().unwrap();

        assert_eq!(*h.presentation.heads.lock().unwrap(), [Some(0), Some(1), None]);
        assert!(h.presentation.busy.lock().unwrap().is_empty());
    }

    #[test]
    fn pin_mode_switch_repins() {
        let mut h = Harness::new(PinMode::Latest);
        h.controller.start_queue_mode().unwrap();
        h.capture("a");
        h.capture("b");
        assert_eq!(h.clipboard_text().as_deref(), Some("b"));

        h.controller.set_pin_mode(PinMode::Next).unwrap();
        assert_eq!(h.clipboard_text().as_deref(), Some("a"));
        assert_eq!(h.controller.config().pin_mode, PinMode::Next);
    }

    #[test]
    fn clear_history_turns_queue_off() {
        let mut h = Harness::new(PinMode::Latest);
        h.controller.start_queue_mode().unwrap();
        h.capture("a");

        h.controller.clear_history().unwrap();
        assert!(h.controller.history().is_empty());
        assert!(!h.controller.cursor().is_on());
        h.assert_invariants();
    }

    #[test]
    fn invariants_hold_through_mixed_operations() {
        let mut h = Harness::new(PinMode::Next);
        h.capture("x");
        h.controller.start_queue_mode().unwrap();
        for text in ["a", "b", "c", "d"] {
            h.capture(text);
            h.assert_invariants();
        }
        h.controller.delete_history_item(4).unwrap();
        h.assert_invariants();
        h.controller.undo_last_copy().unwrap();
        h.assert_invariants();
        h.capture("b");
        h.assert_invariants();
        h.controller.jump_to(0).unwrap();
        h.assert_invariants();
        h.controller.cancel_queue_mode().unwrap();
        h.assert_invariants();
    }
}
