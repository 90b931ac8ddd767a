/// Wakes up the UI loop when background work has produced something to apply.
pub trait Messenger: Send + Sync {
    /// Requests the next frame to be drawn.
    fn request_redraw(&self);
}

/// Messenger that does nothing. Used when no UI loop needs to be woken up (e.g. in tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyMessenger;

impl Messenger for DummyMessenger {
    fn request_redraw(&self) {}
}
