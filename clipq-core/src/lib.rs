pub mod error;

pub mod config;

pub mod controller {

    pub mod actions;
    pub use actions::Action;

    pub mod event_loop;
    pub use event_loop::{EventLoop, TaskResult, report_error};

    pub mod queue_controller;
    pub use queue_controller::{Collaborators, QueueController};
}

pub mod model {
    pub mod queue_state;
    pub use queue_state::{Activity, OperationId, QueueSnapshot};
}

pub mod operators {
    pub mod bulk_paste;

    pub mod effector_operator;
}

pub mod platform {
    pub mod effector;
    pub use effector::{ClipboardEffector, EffectorError};

    pub mod permission;
    pub use permission::{AlwaysGranted, PermissionGate};

    pub mod presentation;
    pub use presentation::{LogPresentation, Presentation};

    pub mod shared_clipboard;
    pub use shared_clipboard::SharedClipboard;

    pub mod simulated;
    pub use simulated::{PasteRecord, SimulatedEffector};
}

pub mod logging;
pub use logging::Logger;

pub use config::Config;
pub use controller::{Action, QueueController};
pub use error::AppError;
