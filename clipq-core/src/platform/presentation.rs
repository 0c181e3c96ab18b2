use tracing::info;

/// Read-only consumer of queue state, e.g. a menu.
pub trait Presentation: Send + Sync {
    fn on_head_of_queue_changed(&self, index: Option<usize>);

    fn on_busy_changed(&self, busy: bool);

    /// Close any open menu or popover before a modal prompt can appear.
    fn cancel_interaction(&self) {}
}

/// Reports presentation signals through tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresentation;

impl Presentation for LogPresentation {
    fn on_head_of_queue_changed(&self, index: Option<usize>) {
        info!(marker = "PRESENTATION_HEAD", head_index = ?index, "Head of queue changed");
    }

    fn on_busy_changed(&self, busy: bool) {
        info!(marker = "PRESENTATION_BUSY", busy, "Busy state changed");
    }
}
