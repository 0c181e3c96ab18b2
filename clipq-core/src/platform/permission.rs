/// Whether the process may synthesize keystrokes in other applications.
///
/// Implementations may kick off a non-blocking prompt; the answer is taken as is.
pub trait PermissionGate: Send + Sync {
    fn is_granted(&self) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn is_granted(&self) -> bool {
        true
    }
}
