use crate::item::HistoryItem;
use smallvec::SmallVec;
use tracing::{debug, trace};
use uuid::Uuid;

/// Result of appending a capture to the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    /// Positions, ascending and counted before the add, of the structurally
    /// equal entries merged away
    pub replaced: SmallVec<[usize; 2]>,
}

impl AddOutcome {
    pub fn merged(&self) -> bool {
        !self.replaced.is_empty()
    }
}

/// The interface the queue engine needs from a history store.
///
/// Entries are ordered newest first; index 0 is the most recent capture.
/// Indices are only stable until the next mutation.
pub trait HistoryStore {
    /// Append a capture, merging it with any structurally equal entry.
    /// Returns `None` when the capture carries no content.
    fn add(&mut self, item: HistoryItem) -> Option<AddOutcome>;

    /// Remove an entry by identity, returning the index it occupied.
    fn remove(&mut self, id: Uuid) -> Option<usize>;

    fn all(&self) -> &[HistoryItem];

    /// Evict the oldest entries beyond `max(limit, keep)`.
    fn trim(&mut self, limit: usize, keep: usize) -> Vec<HistoryItem>;

    fn clear(&mut self);

    fn get(&self, index: usize) -> Option<&HistoryItem> {
        self.all().get(index)
    }

    fn len(&self) -> usize {
        self.all().len()
    }

    fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.all().iter().position(|item| item.id == id)
    }
}

/// In-memory, deduplicated, newest-first history log.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    items: Vec<HistoryItem>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Map an index in the shrunken log back to its position before any of the
/// `removed` (ascending, pre-add positions) entries were taken out.
fn original_index(removed: &[usize], mut index: usize) -> usize {
    for &r in removed {
        if r <= index {
            index += 1;
        }
    }
    index
}

impl HistoryStore for HistoryLog {
    fn add(&mut self, item: HistoryItem) -> Option<AddOutcome> {
        if item.is_empty() {
            trace!(marker = "HISTORY_ADD_EMPTY", "Ignoring capture without content");
            return None;
        }

        let mut item = item;
        let mut replaced: SmallVec<[usize; 2]> = SmallVec::new();

        // Merging can widen the payload set, so keep folding until nothing
        // left in the log matches the merged entry.
        while let Some(index) = self
            .items
            .iter()
            .position(|existing| existing.structurally_equal(&item))
        {
            let earlier = self.items.remove(index);
            let original = original_index(&replaced, index);
            debug!(
                marker = "HISTORY_MERGE",
                replaced_index = original,
                title = %earlier.title,
                "Merged capture into existing history entry"
            );

            let slot = replaced.partition_point(|&r| r < original);
            replaced.insert(slot, original);
            item = item.merge_earlier(earlier);
        }

        self.items.insert(0, item);
        Some(AddOutcome { replaced })
    }

    fn remove(&mut self, id: Uuid) -> Option<usize> {
        let index = self.position(id)?;
        self.items.remove(index);
        Some(index)
    }

    fn all(&self) -> &[HistoryItem] {
        &self.items
    }

    fn clear(&mut self) {
        self.items.clear();
    }

    fn trim(&mut self, limit: usize, keep: usize) -> Vec<HistoryItem> {
        let bound = limit.max(keep);
        if self.items.len() <= bound {
            return Vec::new();
        }

        let evicted = self.items.split_off(bound);
        debug!(
            marker = "HISTORY_TRIM",
            evicted = evicted.len(),
            retained = self.items.len(),
            "Evicted oldest history entries"
        );
        evicted
    }
}
