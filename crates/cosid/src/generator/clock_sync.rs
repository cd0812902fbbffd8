use crate::{
    error::{Error, Result},
    generator::{IdGenerator, Poll, SnowflakeGenerator, interface::generate_blocking},
    id::SnowflakeLayout,
    time::ClockBackwardsSynchronizer,
};

/// Wraps a Snowflake generator and waits out small clock regressions instead
/// of failing.
///
/// When the inner generator reports [`Error::ClockBackwards`], the
/// [`ClockBackwardsSynchronizer`] blocks until the clock is back at the last
/// issued timestamp and the attempt is retried. Regressions past the
/// synchronizer's broken threshold surface as
/// [`Error::ClockTooManyBackwards`].
///
/// # Example
/// ```
/// use cosid::{ClockSyncSnowflakeGenerator, IdGenerator, LockSnowflakeGenerator, SnowflakeLayout, SystemClock};
///
/// let inner = LockSnowflakeGenerator::new(SnowflakeLayout::MILLISECOND, 1, SystemClock)?;
/// let generator = ClockSyncSnowflakeGenerator::new(inner);
/// assert!(generator.generate()? > 0);
/// # Ok::<(), cosid::Error>(())
/// ```
pub struct ClockSyncSnowflakeGenerator<G> {
    inner: G,
    synchronizer: ClockBackwardsSynchronizer,
}

impl<G> ClockSyncSnowflakeGenerator<G>
where
    G: SnowflakeGenerator,
{
    /// Uses the default synchronizer thresholds.
    pub fn new(inner: G) -> Self {
        Self::with_synchronizer(inner, ClockBackwardsSynchronizer::default())
    }

    pub const fn with_synchronizer(inner: G, synchronizer: ClockBackwardsSynchronizer) -> Self {
        Self {
            inner,
            synchronizer,
        }
    }

    pub const fn inner(&self) -> &G {
        &self.inner
    }

    pub const fn synchronizer(&self) -> &ClockBackwardsSynchronizer {
        &self.synchronizer
    }
}

impl<G> IdGenerator for ClockSyncSnowflakeGenerator<G>
where
    G: SnowflakeGenerator,
{
    fn generate(&self) -> Result<u64> {
        generate_blocking(self)
    }
}

impl<G> SnowflakeGenerator for ClockSyncSnowflakeGenerator<G>
where
    G: SnowflakeGenerator,
{
    type Time = G::Time;

    fn layout(&self) -> &SnowflakeLayout {
        self.inner.layout()
    }

    fn machine_id(&self) -> u64 {
        self.inner.machine_id()
    }

    fn time(&self) -> &G::Time {
        self.inner.time()
    }

    fn last_timestamp(&self) -> u64 {
        self.inner.last_timestamp()
    }

    /// Absorbs [`Error::ClockBackwards`]: waits for the clock and reports
    /// [`Poll::Pending`] so the caller polls again.
    fn try_poll_id(&self) -> Result<Poll> {
        match self.inner.try_poll_id() {
            Err(Error::ClockBackwards { last_timestamp, .. }) => {
                let target = self.inner.layout().to_unix_millis(last_timestamp);
                self.synchronizer.sync(target, self.inner.time())?;
                Ok(Poll::Pending { yield_for: 0 })
            }
            other => other,
        }
    }
}
