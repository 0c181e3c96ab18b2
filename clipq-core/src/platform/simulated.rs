//! A headless effector: the "foreground application" is a staged selection
//! and a transcript of pastes.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use clipq::HistoryItem;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::debug;

use crate::controller::actions::Action;
use crate::platform::effector::{ClipboardEffector, EffectorError};
use crate::platform::shared_clipboard::SharedClipboard;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteRecord {
    pub at: Instant,
    pub text: Option<String>,
}

pub struct SimulatedEffector {
    clipboard: SharedClipboard,
    selection: Mutex<Option<String>>,
    pastes: Mutex<Vec<PasteRecord>>,
    capture_tx: Option<UnboundedSender<Action>>,
    latency: Duration,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedEffector {
    pub fn new(clipboard: SharedClipboard) -> Self {
        Self {
            clipboard,
            selection: Mutex::new(None),
            pastes: Mutex::new(Vec::new()),
            capture_tx: None,
            latency: Duration::from_millis(20),
        }
    }

    /// Report every copy as a clipboard capture on `tx`.
    #[must_use]
    pub fn with_capture_sink(mut self, tx: UnboundedSender<Action>) -> Self {
        self.capture_tx = Some(tx);
        self
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Stage the text the next copy will pick up.
    pub fn select(&self, text: impl Into<String>) {
        *guard(&self.selection) = Some(text.into());
    }

    pub fn pastes(&self) -> Vec<PasteRecord> {
        guard(&self.pastes).clone()
    }

    pub fn pasted_texts(&self) -> Vec<String> {
        guard(&self.pastes)
            .iter()
            .filter_map(|record| record.text.clone())
            .collect()
    }
}

#[async_trait]
impl ClipboardEffector for SimulatedEffector {
    async fn invoke_copy(&self) -> Result<(), EffectorError> {
        tokio::time::sleep(self.latency).await;

        let text = guard(&self.selection)
            .clone()
            .ok_or_else(|| EffectorError::Rejected("nothing selected".to_string()))?;

        let item = HistoryItem::from_text(&text);
        self.clipboard.set(item.clone());
        debug!(marker = "SIM_COPY", title = %item.title, "Simulated copy");

        if let Some(tx) = &self.capture_tx {
            tx.send(Action::CaptureObserved(item))
                .map_err(|_| EffectorError::Unavailable("capture watcher closed".to_string()))?;
        }
        Ok(())
    }

    async fn invoke_paste(&self) -> Result<(), EffectorError> {
        tokio::time::sleep(self.latency).await;

        let text = self.clipboard.current_text();
        debug!(marker = "SIM_PASTE", text = ?text, "Simulated paste");
        guard(&self.pastes).push(PasteRecord {
            at: Instant::now(),
            text,
        });
        Ok(())
    }
}
