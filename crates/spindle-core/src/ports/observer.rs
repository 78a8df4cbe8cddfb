//! Observer port: subscribers to task status changes.

use crate::domain::TaskEvent;

/// Receives every committed status change.
///
/// Called synchronously by the scheduler, never while a scheduler lock is
/// held. The submission event is delivered before the task can be admitted;
/// every later event after the change is visible to `result()`. Events for
/// one task therefore arrive in lifecycle order and never concurrently;
/// events of different tasks may interleave.
pub trait TaskObserver: Send + Sync {
    fn on_transition(&self, event: &TaskEvent);
}

impl<F> TaskObserver for F
where
    F: Fn(&TaskEvent) + Send + Sync,
{
    fn on_transition(&self, event: &TaskEvent) {
        self(event)
    }
}
