//! Per-command deadline with explicit cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::spec::Timeout;

/// Point in time after which a running command must be killed.
///
/// The deadline is measured from [`Deadline::start`]. A negative timeout
/// yields a deadline that is already expired. A [`DeadlineCanceller`] can
/// expire it early from another thread; cancellation only ever affects the
/// command this deadline was handed to.
#[derive(Debug, Clone)]
pub struct Deadline {
    timeout: Timeout,
    expires_at: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Deadline {
    /// Starts the clock for `timeout`.
    #[must_use]
    pub fn start(timeout: Timeout) -> Self {
        let budget = timeout.as_duration().unwrap_or(Duration::ZERO);
        Self {
            timeout,
            // Budgets too large to represent never expire.
            expires_at: Instant::now().checked_add(budget),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Timeout the deadline was derived from.
    #[must_use]
    pub const fn timeout(&self) -> Timeout {
        self.timeout
    }

    /// Returns a handle that expires this deadline immediately.
    #[must_use]
    pub fn canceller(&self) -> DeadlineCanceller {
        DeadlineCanceller {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// Whether [`DeadlineCanceller::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Whether the deadline elapsed or was cancelled.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_cancelled()
            || self
                .expires_at
                .is_some_and(|expires_at| Instant::now() >= expires_at)
    }

    /// Time left before expiry; zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        if self.is_cancelled() {
            return Duration::ZERO;
        }
        self.expires_at.map_or(Duration::MAX, |expires_at| {
            expires_at.saturating_duration_since(Instant::now())
        })
    }
}

/// Cancels a [`Deadline`] from another thread.
#[derive(Debug, Clone)]
pub struct DeadlineCanceller {
    cancelled: Arc<AtomicBool>,
}

impl DeadlineCanceller {
    /// Expires the associated deadline.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
