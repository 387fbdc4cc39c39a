use crate::domain::ports::Clock;
use crate::error::{EscrowError, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Arc, PoisonError, RwLock};

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to, and only forwards.
///
/// Clones share the same instant, so a test (or a script replayer) can keep a
/// handle while the engine owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    /// Moves the clock forward by `by`. Negative steps and steps past the
    /// representable range leave it where it is.
    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        if by > TimeDelta::zero() {
            if let Some(next) = now.checked_add_signed(by) {
                *now = next;
            }
        }
    }

    /// Moves the clock to `instant`. Moving backwards is an error.
    pub fn set(&self, instant: DateTime<Utc>) -> Result<()> {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        if instant < *now {
            return Err(EscrowError::ValidationError(format!(
                "clock cannot move backwards from {} to {instant}",
                *now
            )));
        }
        *now = instant;
        Ok(())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}
