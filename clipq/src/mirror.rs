use crate::item::HistoryItem;

/// The single OS clipboard as seen by the queue engine.
///
/// Only pinning writes go through here; reading the clipboard back is the
/// capture watcher's business.
pub trait ClipboardMirror: Send + Sync {
    fn write(&self, item: &HistoryItem);

    fn clear(&self);
}
