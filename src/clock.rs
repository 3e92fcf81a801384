//! Time and identity sources.
//!
//! Both are passed explicitly to the services that need them so tests can
//! pin timestamps and ids without touching process-wide state.

#[cfg(test)]
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> Uuid;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Random v4 ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn new_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// A clock frozen at one instant.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl FixedClock {
    /// 2000-01-01T00:00:00Z
    pub fn epoch_2000() -> Self {
        Self(DateTime::UNIX_EPOCH + chrono::Duration::seconds(946_684_800))
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Ids counting up from 1, so assertions can name them.
#[cfg(test)]
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU64,
}

#[cfg(test)]
impl SequentialIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

#[cfg(test)]
impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl IdGenerator for SequentialIds {
    fn new_id(&self) -> Uuid {
        Uuid::from_u128(u128::from(self.next.fetch_add(1, Ordering::Relaxed)))
    }
}
