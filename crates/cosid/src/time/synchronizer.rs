use core::time::Duration;
use std::{thread, time::Instant};

use crate::{
    error::{Error, Result},
    time::TimeSource,
};

/// Regressions up to this long are absorbed by busy-yielding.
pub const DEFAULT_SPIN_THRESHOLD: Duration = Duration::from_millis(20);

/// Regressions this long or longer fail immediately.
pub const DEFAULT_BROKEN_THRESHOLD: Duration = Duration::from_millis(2_000);

/// Waits out small backward jumps of the wall clock and rejects large ones.
///
/// Given a target timestamp that the clock has fallen behind, the synchronizer
/// either blocks until the clock reaches the target again, or fails with
/// [`Error::ClockTooManyBackwards`]:
///
/// - behind by less than `spin_threshold`: yield the thread until caught up
/// - behind by less than `broken_threshold`: sleep most of the gap, then yield
/// - behind by `broken_threshold` or more: fail fast
///
/// The total wait is capped at `broken_threshold`, so a clock that never
/// recovers still produces an error instead of blocking forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClockBackwardsSynchronizer {
    spin_threshold: Duration,
    broken_threshold: Duration,
}

impl Default for ClockBackwardsSynchronizer {
    fn default() -> Self {
        Self {
            spin_threshold: DEFAULT_SPIN_THRESHOLD,
            broken_threshold: DEFAULT_BROKEN_THRESHOLD,
        }
    }
}

impl ClockBackwardsSynchronizer {
    /// Creates a synchronizer with custom thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `spin_threshold` exceeds
    /// `broken_threshold` or `broken_threshold` is zero.
    pub fn new(spin_threshold: Duration, broken_threshold: Duration) -> Result<Self> {
        if broken_threshold.is_zero() {
            return Err(Error::configuration("broken threshold must be non-zero"));
        }
        if spin_threshold > broken_threshold {
            return Err(Error::configuration(format!(
                "spin threshold {spin_threshold:?} exceeds broken threshold {broken_threshold:?}"
            )));
        }
        Ok(Self {
            spin_threshold,
            broken_threshold,
        })
    }

    pub const fn spin_threshold(&self) -> Duration {
        self.spin_threshold
    }

    pub const fn broken_threshold(&self) -> Duration {
        self.broken_threshold
    }

    /// Returns how far `now` lags behind `target`, `None` if it does not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClockTooManyBackwards`] if the lag reaches the broken
    /// threshold.
    pub fn backwards(&self, target_millis: u64, now_millis: u64) -> Result<Option<Duration>> {
        if now_millis >= target_millis {
            return Ok(None);
        }
        let backwards = Duration::from_millis(target_millis - now_millis);
        if backwards >= self.broken_threshold {
            return Err(self.too_many_backwards(backwards));
        }
        Ok(Some(backwards))
    }

    /// Blocks the current thread until `time` reads at least `target_millis`
    /// (milliseconds since the Unix epoch).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClockTooManyBackwards`] if the clock is behind by the
    /// broken threshold or more, or does not catch up within it.
    pub fn sync<T>(&self, target_millis: u64, time: &T) -> Result<()>
    where
        T: TimeSource + ?Sized,
    {
        let Some(backwards) = self.backwards(target_millis, time.current_millis())? else {
            return Ok(());
        };
        tracing::warn!(?backwards, target_millis, "clock moved backwards, waiting to catch up");

        let deadline = Instant::now() + self.broken_threshold;
        if backwards > self.spin_threshold {
            thread::sleep(backwards - self.spin_threshold);
        }
        loop {
            let now = time.current_millis();
            if now >= target_millis {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(self.too_many_backwards(Duration::from_millis(target_millis - now)));
            }
            thread::yield_now();
        }
    }

    /// Async counterpart of [`Self::sync`] that sleeps on the tokio timer
    /// instead of blocking the thread.
    ///
    /// # Errors
    ///
    /// Same as [`Self::sync`].
    pub async fn sync_async<T>(&self, target_millis: u64, time: &T) -> Result<()>
    where
        T: TimeSource + ?Sized,
    {
        let Some(backwards) = self.backwards(target_millis, time.current_millis())? else {
            return Ok(());
        };
        tracing::warn!(?backwards, target_millis, "clock is behind the lease, waiting to catch up");

        let deadline = Instant::now() + self.broken_threshold;
        if backwards > self.spin_threshold {
            tokio::time::sleep(backwards - self.spin_threshold).await;
        }
        loop {
            let now = time.current_millis();
            if now >= target_millis {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(self.too_many_backwards(Duration::from_millis(target_millis - now)));
            }
            tokio::task::yield_now().await;
        }
    }

    const fn too_many_backwards(&self, backwards: Duration) -> Error {
        Error::ClockTooManyBackwards {
            backwards,
            threshold: self.broken_threshold,
        }
    }
}
