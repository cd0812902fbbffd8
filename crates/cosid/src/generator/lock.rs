use parking_lot::Mutex;
use tracing::instrument;

use crate::{
    error::{Error, Result},
    generator::{
        IdGenerator, Poll, SnowflakeGenerator,
        interface::generate_blocking,
        sequence::{Advance, SequenceCounter},
    },
    id::SnowflakeLayout,
    time::{SystemClock, TimeSource},
};

/// A lock-based Snowflake generator suitable for multi-threaded
/// environments.
///
/// The last timestamp and sequence live behind a [`parking_lot::Mutex`]. The
/// clock is read while the lock is held, so the order in which ids are issued
/// matches the order of the clock readings they are built from.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Fair access across threads
/// - ✅ Works with any [`SnowflakeLayout`]
///
/// ## See Also
/// - [`AtomicSnowflakeGenerator`]
///
/// [`AtomicSnowflakeGenerator`]: crate::generator::AtomicSnowflakeGenerator
pub struct LockSnowflakeGenerator<T = SystemClock>
where
    T: TimeSource,
{
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<Mutex<SequenceCounter>>,
    #[cfg(not(feature = "cache-padded"))]
    state: Mutex<SequenceCounter>,
    layout: SnowflakeLayout,
    machine_id: u64,
    time: T,
}

impl<T> LockSnowflakeGenerator<T>
where
    T: TimeSource,
{
    /// Creates a generator for `machine_id` with an empty history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `machine_id` does not fit in the
    /// layout's machine id field.
    ///
    /// # Example
    /// ```
    /// use cosid::{IdGenerator, LockSnowflakeGenerator, SnowflakeLayout, SystemClock};
    ///
    /// let generator = LockSnowflakeGenerator::new(SnowflakeLayout::MILLISECOND, 1, SystemClock)?;
    /// let first = generator.generate()?;
    /// let second = generator.generate()?;
    /// assert!(second > first);
    /// # Ok::<(), cosid::Error>(())
    /// ```
    pub fn new(layout: SnowflakeLayout, machine_id: u64, time: T) -> Result<Self> {
        Self::from_components(layout, machine_id, 0, 0, time)
    }

    /// Creates a generator that continues after a known last timestamp and
    /// sequence, e.g. restored from a previous run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `machine_id`, `last_timestamp` or
    /// `sequence` does not fit its field.
    pub fn from_components(
        layout: SnowflakeLayout,
        machine_id: u64,
        last_timestamp: u64,
        sequence: u64,
        time: T,
    ) -> Result<Self> {
        layout.allocation().check_machine_id(machine_id)?;
        layout.allocation().check_counter(last_timestamp, sequence)?;
        let counter = SequenceCounter::new(last_timestamp, sequence);
        Ok(Self {
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(Mutex::new(counter)),
            #[cfg(not(feature = "cache-padded"))]
            state: Mutex::new(counter),
            layout,
            machine_id,
            time,
        })
    }

    /// Attempts to generate the next id.
    ///
    /// # Returns
    /// - `Ok(Poll::Ready { id })`: a new id is available
    /// - `Ok(Poll::Pending { yield_for })`: the sequence of the current tick
    ///   is exhausted
    ///
    /// # Errors
    /// - [`Error::ClockBackwards`] if the clock reads earlier than the last
    ///   issued timestamp
    /// - [`Error::TimestampOutOfRange`] if the clock is outside the layout
    #[instrument(level = "trace", skip(self))]
    pub fn try_poll_id(&self) -> Result<Poll> {
        let allocation = self.layout.allocation();
        let mut state = self.state.lock();
        let now = self
            .layout
            .ticks_since_epoch(self.time.current_millis())?;

        match state.advance(now, allocation.max_sequence()) {
            Advance::Next(next) => {
                *state = next;
                Ok(Poll::Ready {
                    id: allocation.pack(next.last_timestamp, self.machine_id, next.sequence),
                })
            }
            Advance::Exhausted => Ok(Poll::Pending { yield_for: 1 }),
            Advance::Behind => Err(Self::cold_clock_behind(state.last_timestamp, now)),
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(last_timestamp: u64, current_timestamp: u64) -> Error {
        Error::ClockBackwards {
            last_timestamp,
            current_timestamp,
        }
    }
}

impl<T> IdGenerator for LockSnowflakeGenerator<T>
where
    T: TimeSource,
{
    fn generate(&self) -> Result<u64> {
        generate_blocking(self)
    }
}

impl<T> SnowflakeGenerator for LockSnowflakeGenerator<T>
where
    T: TimeSource,
{
    type Time = T;

    fn layout(&self) -> &SnowflakeLayout {
        &self.layout
    }

    fn machine_id(&self) -> u64 {
        self.machine_id
    }

    fn time(&self) -> &T {
        &self.time
    }

    fn last_timestamp(&self) -> u64 {
        self.state.lock().last_timestamp
    }

    fn try_poll_id(&self) -> Result<Poll> {
        self.try_poll_id()
    }
}
