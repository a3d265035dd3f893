use super::state::SessionSnapshot;

/// Event name the shell uses for session updates.
pub const SESSION_CHANGED_EVENT: &str = "ar-session-changed";

/// Receives a snapshot after every session state change.
pub trait EventSink: Send + Sync {
    fn publish(&self, snapshot: &SessionSnapshot);
}

/// Page-level input locking while the AR overlay is up.
pub trait Viewport: Send + Sync {
    fn lock_scroll(&self);
    fn unlock_scroll(&self);
}

/// Sink for hosts that only read the watch channel.
pub struct NoopEvents;

impl EventSink for NoopEvents {
    fn publish(&self, _snapshot: &SessionSnapshot) {}
}
