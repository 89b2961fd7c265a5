//! Virtual clock for training scenarios.
//!
//! The clock adds an instructor-controlled offset to a base time. The base
//! is real wall-clock time in production and a fixed instant in tests, so
//! the protocol engine never reads `Utc::now()` directly. The offset is
//! process-local and resets on restart.

pub mod eastern;

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;

/// Source of "now" for protocol decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy)]
enum ClockBase {
    Wall,
    Fixed(DateTime<Utc>),
}

/// Wall-clock (or fixed) time shifted by an accumulated offset.
#[derive(Debug)]
pub struct VirtualClock {
    base: ClockBase,
    offset_ms: AtomicI64,
}

/// Snapshot returned by [`VirtualClock::status`].
#[derive(Debug, Clone, Serialize)]
pub struct ClockStatus {
    pub current_time: DateTime<FixedOffset>,
    pub current_time_display: String,
    pub time_zone: &'static str,
    pub is_simulating: bool,
    pub offset_hours: i64,
    pub offset_minutes: i64,
}

impl VirtualClock {
    /// Real time, no offset.
    pub fn new() -> Self {
        Self {
            base: ClockBase::Wall,
            offset_ms: AtomicI64::new(0),
        }
    }

    /// Frozen base time. Only `advance`/`reset` move it.
    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self {
            base: ClockBase::Fixed(base),
            offset_ms: AtomicI64::new(0),
        }
    }

    fn base_now(&self) -> DateTime<Utc> {
        match self.base {
            ClockBase::Wall => Utc::now(),
            ClockBase::Fixed(at) => at,
        }
    }

    /// Current offset from the base time.
    pub fn offset(&self) -> Duration {
        Duration::milliseconds(self.offset_ms.load(Ordering::SeqCst))
    }

    /// Skip forward. Repeated calls accumulate. Returns the new simulated time.
    pub fn advance(&self, hours: u32, minutes: u32) -> DateTime<Utc> {
        let delta = (i64::from(hours) * 60 + i64::from(minutes)) * 60_000;
        self.offset_ms.fetch_add(delta, Ordering::SeqCst);
        let now = self.now();
        tracing::info!(hours, minutes, offset_ms = self.offset_ms.load(Ordering::SeqCst), "Virtual clock advanced");
        now
    }

    /// Return to real (or base) time.
    pub fn reset(&self) -> DateTime<Utc> {
        self.offset_ms.store(0, Ordering::SeqCst);
        tracing::info!("Virtual clock reset");
        self.now()
    }

    pub fn is_simulating(&self) -> bool {
        self.offset_ms.load(Ordering::SeqCst) != 0
    }

    pub fn status(&self) -> ClockStatus {
        let now = self.now();
        let total_minutes = self.offset().num_minutes();
        ClockStatus {
            current_time: eastern::to_eastern(now),
            current_time_display: eastern::format_eastern(now),
            time_zone: eastern::abbreviation(now),
            is_simulating: self.is_simulating(),
            offset_hours: total_minutes / 60,
            offset_minutes: total_minutes % 60,
        }
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        self.base_now() + self.offset()
    }
}
