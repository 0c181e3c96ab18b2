//! # clipq - Clipboard History and Paste Queue Engine
//!
//! Keeps a deduplicated, newest-first log of clipboard captures and a cursor
//! over its front that turns sequential copies into an in-order paste queue.
//!
//! ## Key Pieces
//! - [`HistoryLog`]: structural deduplication with copy-count merging
//! - [`QueueCursor`]: on/off flag, queue size and the clipboard pinning policy
//! - [`ClipboardMirror`]: the seam through which the cursor re-pins the clipboard

pub mod config;
pub mod cursor;
pub mod error;
pub mod history;
pub mod item;
pub mod mirror;

// Re-export main types for easy use
pub use config::QueueConfig;
pub use cursor::{PinMode, QueueCursor};
pub use error::{ClipError, ClipResult, QueueError, QueueResult};
pub use history::{AddOutcome, HistoryLog, HistoryStore};
pub use item::{HistoryItem, Payload, PayloadKind};
pub use mirror::ClipboardMirror;
