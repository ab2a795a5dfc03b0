//! Wall clock used by the simulator.
//!
//! The simulator reads the local hour on every tick to pick the time-of-day
//! multiplier, so the clock is injected rather than read from the system
//! directly. Tests pin it with [FixedClock].

use std::sync::Mutex;

use chrono::{DateTime, Local, TimeZone, Timelike};

pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    fn hour(&self) -> u32 {
        self.now().hour()
    }
}

/// Real local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Today's date at `hour:00` local time. Hours past 23 wrap.
    pub fn at_hour(hour: u32) -> Self {
        Self::new(local_at_hour(hour))
    }

    pub fn set(&self, now: DateTime<Local>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn set_hour(&self, hour: u32) {
        self.set(local_at_hour(hour));
    }
}

impl WallClock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

fn local_at_hour(hour: u32) -> DateTime<Local> {
    let today = Local::now().date_naive();
    let naive = today
        .and_hms_opt(hour % 24, 0, 0)
        .unwrap_or_else(|| today.and_time(chrono::NaiveTime::MIN));
    // Ambiguous or skipped local times (DST) resolve to the earliest valid instant.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(Local::now)
}
