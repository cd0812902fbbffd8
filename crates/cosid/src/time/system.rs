use std::time::{SystemTime, UNIX_EPOCH};

use crate::time::TimeSource;

/// The operating system's wall clock.
///
/// Reads [`SystemTime::now`] on every call. The wall clock is what makes
/// Snowflake ids meaningful across processes, but it may step backwards; pair
/// it with a [`ClockSyncSnowflakeGenerator`] to absorb small regressions.
///
/// [`ClockSyncSnowflakeGenerator`]: crate::ClockSyncSnowflakeGenerator
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_millis(&self) -> u64 {
        // A clock before 1970 reads as 0, which every layout rejects as before
        // its epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}
