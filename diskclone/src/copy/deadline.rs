use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Wall-clock budget of one execution.
///
/// The guard is advisory: it never interrupts an in-flight call, callers
/// consult [`Deadline::expired`] before starting the next unit of work.
#[derive(Clone)]
pub struct Deadline {
    expires_at: Option<Instant>,
    clock: Arc<dyn Clock>,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self::with_clock(budget, Arc::new(SystemClock))
    }

    pub fn with_clock(budget: Duration, clock: Arc<dyn Clock>) -> Self {
        // An unrepresentable expiry means the budget can never run out.
        let expires_at = clock.now().checked_add(budget);
        Self { expires_at, clock }
    }

    pub fn expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| self.clock.now() >= expires_at)
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| expires_at.saturating_duration_since(self.clock.now()))
    }
}

impl std::fmt::Debug for Deadline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deadline")
            .field("remaining", &self.remaining())
            .finish()
    }
}
