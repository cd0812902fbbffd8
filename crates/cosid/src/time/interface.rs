use core::time::Duration;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// CosId epoch: Wednesday, December 25, 2019 00:00:00 UTC+8
pub const COSID_EPOCH: Duration = Duration::from_millis(1_577_203_200_000);

/// Twitter epoch: Thursday, November 4, 2010 1:42:54.657 UTC
pub const TWITTER_EPOCH: Duration = Duration::from_millis(1_288_834_974_657);

/// Standard UNIX epoch: Thursday, January 1, 1970 00:00:00 UTC
pub const UNIX_EPOCH: Duration = Duration::from_millis(0);

/// A trait for wall-clock time sources.
///
/// This abstraction allows you to plug in the real system clock or a mocked
/// time source in tests. Implementations return milliseconds since the Unix
/// epoch; generators subtract their own epoch and scale to their
/// [`TimeUnit`].
///
/// Unlike a monotonic timer, a wall clock may move backwards (NTP steps,
/// manual adjustments). Generators detect that and refuse to issue ids until
/// the clock has caught up again.
///
/// # Example
///
/// ```
/// use cosid::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1234
///     }
/// }
///
/// assert_eq!(FixedTime.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn current_millis(&self) -> u64;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn current_millis(&self) -> u64 {
        (**self).current_millis()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn current_millis(&self) -> u64 {
        (**self).current_millis()
    }
}

/// Resolution of the timestamp field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    /// One tick per millisecond.
    #[default]
    Millisecond,
    /// One tick per second.
    Second,
}

impl TimeUnit {
    /// Milliseconds per tick.
    pub const fn millis_per_tick(self) -> u64 {
        match self {
            Self::Millisecond => 1,
            Self::Second => 1_000,
        }
    }

    /// Length of one tick.
    pub const fn tick(self) -> Duration {
        Duration::from_millis(self.millis_per_tick())
    }

    /// Converts a millisecond duration into whole ticks, rounding down.
    pub const fn from_millis(self, millis: u64) -> u64 {
        millis / self.millis_per_tick()
    }

    /// Converts ticks back into milliseconds.
    pub const fn to_millis(self, ticks: u64) -> u64 {
        ticks.saturating_mul(self.millis_per_tick())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_unit_rounds_down() {
        assert_eq!(TimeUnit::Second.from_millis(1_999), 1);
        assert_eq!(TimeUnit::Second.to_millis(1), 1_000);
        assert_eq!(TimeUnit::Millisecond.from_millis(1_999), 1_999);
    }
}
