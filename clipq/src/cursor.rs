//! Paste-queue cursor over the newest-first history log
//!
//! The cursor is a counter over the front of the log: `size` items, the
//! newest `size` entries, are queued, and the head of the paste queue (the
//! earliest copied of them) sits at `size - 1`. Every transition decides what
//! the clipboard must show afterwards under the configured [`PinMode`].

use crate::error::{QueueError, QueueResult};
use crate::item::HistoryItem;
use crate::mirror::ClipboardMirror;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// What the clipboard mirrors while the queue is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    /// The most recently copied item, as the OS would show it
    #[default]
    Latest,

    /// The item the next paste will consume
    Next,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueCursor {
    is_on: bool,
    size: usize,
    mode: PinMode,
    turn_off_when_emptied: bool,
}

impl QueueCursor {
    pub fn new(mode: PinMode) -> Self {
        Self {
            is_on: false,
            size: 0,
            mode,
            turn_off_when_emptied: false,
        }
    }

    #[inline]
    pub fn is_on(&self) -> bool {
        self.is_on
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn mode(&self) -> PinMode {
        self.mode
    }

    #[inline]
    pub fn turn_off_when_emptied(&self) -> bool {
        self.turn_off_when_emptied
    }

    /// Index of the next item a paste consumes, absent while nothing is queued.
    #[inline]
    pub fn head_index(&self) -> Option<usize> {
        self.size.checked_sub(1)
    }

    /// Switch pinning policy, re-pinning immediately if items are queued.
    pub fn set_mode(
        &mut self,
        mode: PinMode,
        entries: &[HistoryItem],
        mirror: &dyn ClipboardMirror,
    ) -> QueueResult<()> {
        if self.mode == mode {
            return Ok(());
        }
        self.mode = mode;

        match (mode, self.head_index()) {
            (PinMode::Next, Some(head)) => pin(entries, mirror, head),
            (PinMode::Latest, Some(_)) => pin(entries, mirror, 0),
            (_, None) => Ok(()),
        }
    }

    pub fn on(&mut self, allow_empty_decrement: bool) {
        self.is_on = true;
        self.size = 0;
        self.turn_off_when_emptied = !allow_empty_decrement;

        debug!(
            marker = "QUEUE_ON",
            turn_off_when_emptied = self.turn_off_when_emptied,
            "Queue mode on"
        );
    }

    pub fn off(&mut self, entries: &[HistoryItem], mirror: &dyn ClipboardMirror) {
        self.is_on = false;
        self.size = 0;

        debug!(marker = "QUEUE_OFF", mode = ?self.mode, "Queue mode off");

        if self.mode == PinMode::Next
            && let Some(latest) = entries.first()
        {
            mirror.write(latest);
        }
    }

    /// Track a capture that has already been appended to the log.
    pub fn add(&mut self, entries: &[HistoryItem], mirror: &dyn ClipboardMirror) -> QueueResult<()> {
        let next_size = if self.is_on { self.size + 1 } else { 1 };
        if next_size > entries.len() {
            return Err(QueueError::SizeExceedsHistory {
                index: next_size - 1,
                len: entries.len(),
            });
        }

        if !self.is_on {
            self.on(false);
        }
        self.size = next_size;

        debug!(marker = "QUEUE_ADD", size = self.size, "Capture queued");

        if self.mode == PinMode::Next && self.size > 1 {
            pin(entries, mirror, self.size - 1)?;
        }
        Ok(())
    }

    /// Stage the queue head on the clipboard ahead of a paste.
    pub fn put_next_on_clipboard(
        &self,
        entries: &[HistoryItem],
        mirror: &dyn ClipboardMirror,
    ) -> QueueResult<()> {
        let head = self.head_index().ok_or(QueueError::NoSuchItem)?;
        if head >= entries.len() {
            return Err(QueueError::SizeExceedsHistory {
                index: head,
                len: entries.len(),
            });
        }

        match self.mode {
            PinMode::Next => Ok(()),
            PinMode::Latest => pin(entries, mirror, head),
        }
    }

    /// Pop one slot off the paste queue; `at` defaults to the head.
    pub fn remove(
        &mut self,
        at: Option<usize>,
        entries: &[HistoryItem],
        mirror: &dyn ClipboardMirror,
    ) -> QueueResult<()> {
        let head = self.head_index().ok_or(QueueError::NoSuchItem)?;
        let index = at.unwrap_or(head);
        if index > head {
            return Err(QueueError::NoSuchItem);
        }

        self.size -= 1;
        debug!(marker = "QUEUE_REMOVE", index, size = self.size, "Queue slot removed");

        if self.size == 0 {
            self.is_on = !self.turn_off_when_emptied;
            return Ok(());
        }

        match self.mode {
            PinMode::Latest if index == 0 => pin(entries, mirror, 0),
            PinMode::Next if index == head => pin(entries, mirror, self.size - 1),
            _ => Ok(()),
        }
    }

    /// Jump the head to an arbitrary log position.
    pub fn set_head(
        &mut self,
        index: usize,
        entries: &[HistoryItem],
        mirror: &dyn ClipboardMirror,
    ) -> QueueResult<()> {
        if index >= entries.len() {
            return Err(QueueError::NoSuchItem);
        }

        if !self.is_on {
            self.on(true);
        }
        self.size = index + 1;

        debug!(marker = "QUEUE_SET_HEAD", index, size = self.size, "Queue head moved");

        if self.mode == PinMode::Next && self.size > 1 {
            pin(entries, mirror, index)?;
        }
        Ok(())
    }

    /// One step of a bulk paste: pop the head and stage the next one whatever the mode.
    pub fn bulk_remove_next(
        &mut self,
        entries: &[HistoryItem],
        mirror: &dyn ClipboardMirror,
    ) -> QueueResult<()> {
        if self.size == 0 {
            return Err(QueueError::NoSuchItem);
        }

        self.size -= 1;
        trace!(marker = "QUEUE_BULK_STEP", size = self.size, "Bulk paste step");

        if self.size == 0 {
            self.is_on = !self.turn_off_when_emptied;
            return Ok(());
        }
        pin(entries, mirror, self.size - 1)
    }

    pub fn finish_bulk_remove(
        &self,
        entries: &[HistoryItem],
        mirror: &dyn ClipboardMirror,
    ) -> QueueResult<()> {
        if self.mode == PinMode::Latest && self.size > 1 {
            return pin(entries, mirror, 0);
        }
        Ok(())
    }

    /// After a single paste under [`PinMode::Latest`], put the newest capture back.
    pub fn restore_latest(
        &self,
        entries: &[HistoryItem],
        mirror: &dyn ClipboardMirror,
    ) -> QueueResult<()> {
        if self.mode == PinMode::Latest && self.size > 0 {
            return pin(entries, mirror, 0);
        }
        Ok(())
    }

    /// Account for a log entry deleted at `index` without touching the clipboard.
    ///
    /// Returns true when the deleted entry was queued and the queue shrank.
    pub fn forget_slot(&mut self, index: usize) -> bool {
        match self.head_index() {
            Some(head) if self.is_on && index <= head => {
                self.size -= 1;
                if self.size == 0 && self.turn_off_when_emptied {
                    self.is_on = false;
                }
                debug!(marker = "QUEUE_FORGET", index, size = self.size, "Queued entry deleted");
                true
            }
            _ => false,
        }
    }

    /// Verify the on/size invariants against the current log length.
    pub fn check(&self, history_len: usize) -> QueueResult<()> {
        if !self.is_on && self.size != 0 {
            return Err(QueueError::LogicError("queue is off but holds items"));
        }
        if self.size > history_len {
            return Err(QueueError::SizeExceedsHistory {
                index: self.size - 1,
                len: history_len,
            });
        }
        Ok(())
    }
}

impl Default for QueueCursor {
    fn default() -> Self {
        Self::new(PinMode::default())
    }
}

fn pin(entries: &[HistoryItem], mirror: &dyn ClipboardMirror, index: usize) -> QueueResult<()> {
    let item = entries.get(index).ok_or(QueueError::SizeExceedsHistory {
        index,
        len: entries.len(),
    })?;

    trace!(marker = "CLIPBOARD_PIN", index, title = %item.title, "Pinning clipboard");
    mirror.write(item);
    Ok(())
}
