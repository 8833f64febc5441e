use std::time::Duration;

use tokio::time::Instant;

/// Trailing-edge debounce timer for a single value.
///
/// Owned by its caller and driven explicitly: there is no background task.
/// Scheduling a new value replaces the pending one and restarts the window.
#[derive(Debug)]
pub struct Debounce<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debounce<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Arms the timer for `value`, discarding any value still waiting.
    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    /// Disarms the timer. Returns the value that was waiting, if any.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    /// Takes the waiting value if its window has elapsed at `now`.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        if self.deadline().is_some_and(|deadline| deadline <= now) {
            self.cancel()
        } else {
            None
        }
    }
}
