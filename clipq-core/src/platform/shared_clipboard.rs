use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clipq::{ClipboardMirror, HistoryItem};
use tracing::trace;

#[derive(Debug, Default)]
struct ClipboardState {
    contents: Option<HistoryItem>,
    change_count: u64,
}

/// In-process stand-in for the OS clipboard, cheap to clone and share.
///
/// Writes made through [`ClipboardMirror`] carry the engine marker so a
/// capture watcher can tell them apart from organic copies.
#[derive(Debug, Clone, Default)]
pub struct SharedClipboard {
    inner: Arc<Mutex<ClipboardState>>,
}

impl SharedClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ClipboardState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Organic write, as done by a copy in some application.
    pub fn set(&self, item: HistoryItem) {
        let mut state = self.state();
        state.contents = Some(item);
        state.change_count += 1;
    }

    pub fn current(&self) -> Option<HistoryItem> {
        self.state().contents.clone()
    }

    pub fn current_text(&self) -> Option<String> {
        self.state()
            .contents
            .as_ref()
            .and_then(|item| item.text().map(str::to_owned))
    }

    pub fn change_count(&self) -> u64 {
        self.state().change_count
    }
}

impl ClipboardMirror for SharedClipboard {
    fn write(&self, item: &HistoryItem) {
        trace!(marker = "CLIPBOARD_WRITE", title = %item.title, "Engine clipboard write");
        self.set(item.marked());
    }

    fn clear(&self) {
        let mut state = self.state();
        state.contents = None;
        state.change_count += 1;
    }
}
