//! src/controller/actions.rs
//! ============================================================================
//! # Actions: Centralized Queue Commands
//!
//! Every user request, clipboard capture and task completion reaches the
//! controller as an `Action`, processed one at a time on the control task.

use clipq::{HistoryItem, PinMode};

use crate::controller::event_loop::TaskResult;

#[derive(Debug)]
pub enum Action {
    /// Turn queue mode on with an empty queue that survives being drained.
    StartQueueMode,

    /// Copy in the foreground application and queue the capture.
    QueuedCopy,

    /// Paste the head of the queue.
    QueuedPaste,

    /// Paste the next `n` queued items, one at a time.
    QueuedPasteMultiple(usize),

    /// Stop an in-progress bulk paste after the paste in flight.
    CancelBulkPaste,

    /// Abort queueing and restore normal clipboard behaviour.
    CancelQueueMode,

    DeleteHistoryItem(usize),

    DeleteHighlightedItem,

    UndoLastCopy,

    /// Replay from history: make `index` the head of the queue.
    JumpTo(usize),

    /// Presentation moved its highlight.
    Highlight(Option<usize>),

    SetPinMode(PinMode),

    ClearHistory,

    /// The clipboard watcher saw new clipboard contents.
    CaptureObserved(HistoryItem),

    /// An effector call or timer finished.
    TaskResult(TaskResult),

    /// Print the queue state (console only).
    Status,

    /// Print the history log (console only).
    History,

    Quit,
}
