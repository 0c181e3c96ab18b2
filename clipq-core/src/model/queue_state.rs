//! Read model and in-flight bookkeeping for the queue controller.

use std::fmt;

use clipq::PinMode;
use compact_str::CompactString;

use crate::operators::bulk_paste::BulkPaste;

/// Identifies one effector round trip (or one whole bulk paste).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationId(CompactString);

impl OperationId {
    pub fn new() -> Self {
        Self(CompactString::from(nanoid::nanoid!(10)))
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the controller is waiting on. Anything but `Idle` is "busy".
#[derive(Debug, Default)]
pub enum Activity {
    #[default]
    Idle,

    CopyInFlight {
        operation_id: OperationId,
    },

    PasteInFlight {
        operation_id: OperationId,
        bulk: Option<BulkPaste>,
    },
}

impl Activity {
    #[inline]
    pub fn is_busy(&self) -> bool {
        !matches!(self, Activity::Idle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Activity::Idle => "idle",
            Activity::CopyInFlight { .. } => "copy",
            Activity::PasteInFlight { bulk: None, .. } => "paste",
            Activity::PasteInFlight { bulk: Some(_), .. } => "bulk paste",
        }
    }

    pub fn operation_id(&self) -> Option<&OperationId> {
        match self {
            Activity::Idle => None,
            Activity::CopyInFlight { operation_id }
            | Activity::PasteInFlight { operation_id, .. } => Some(operation_id),
        }
    }
}

/// What presentation needs to draw the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub is_on: bool,
    pub size: usize,
    pub head_index: Option<usize>,
    pub busy: bool,
    pub mode: PinMode,
    pub history_len: usize,
}

impl fmt::Display for QueueSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match (self.is_on, self.size) {
            (false, _) => "off",
            (true, 0) => "on (empty)",
            (true, _) => "on",
        };
        write!(
            f,
            "queue {state}, size {}, head {}, mode {:?}, {} in history{}",
            self.size,
            self.head_index.map_or_else(|| "-".to_string(), |i| i.to_string()),
            self.mode,
            self.history_len,
            if self.busy { ", busy" } else { "" }
        )
    }
}
