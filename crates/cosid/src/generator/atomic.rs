use portable_atomic::{AtomicU64, Ordering};
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

/// A lock-free Snowflake generator suitable for multi-threaded environments.
///
/// The last timestamp and sequence are packed into a single [`AtomicU64`] and
/// advanced with compare-and-swap.
///
/// ## Features
/// - ✅ Thread-safe
/// - ❌ Fair access across threads: a thread that keeps losing the race gets
///   [`Poll::Pending`] with `yield_for == 0` and must retry
///
/// ## Recommended When
/// - Throughput matters more than fairness
///
/// ## See Also
/// - [`LockSnowflakeGenerator`]
///
/// [`LockSnowflakeGenerator`]: crate::generator::LockSnowflakeGenerator
pub struct AtomicSnowflakeGenerator<T = SystemClock>
where
    T: TimeSource,
{
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<AtomicU64>,
    #[cfg(not(feature = "cache-padded"))]
    state: AtomicU64,
    layout: SnowflakeLayout,
    machine_id: u64,
    time: T,
}

impl<T> AtomicSnowflakeGenerator<T>
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
    /// use cosid::{AtomicSnowflakeGenerator, IdGenerator, SnowflakeLayout, SystemClock};
    ///
    /// let generator = AtomicSnowflakeGenerator::new(SnowflakeLayout::SECOND, 7, SystemClock)?;
    /// let id = generator.generate()?;
    /// assert_eq!(SnowflakeLayout::SECOND.allocation().machine_id_of(id), 7);
    /// # Ok::<(), cosid::Error>(())
    /// ```
    pub fn new(layout: SnowflakeLayout, machine_id: u64, time: T) -> Result<Self> {
        Self::from_components(layout, machine_id, 0, 0, time)
    }

    /// Creates a generator that continues after a known last timestamp and
    /// sequence.
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
        let initial =
            SequenceCounter::new(last_timestamp, sequence).to_raw(layout.allocation().sequence_bits());
        Ok(Self {
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(AtomicU64::new(initial)),
            #[cfg(not(feature = "cache-padded"))]
            state: AtomicU64::new(initial),
            layout,
            machine_id,
            time,
        })
    }

    /// Attempts to generate the next id.
    ///
    /// The state is loaded before the clock is read: any timestamp already
    /// stored was read earlier, so a lagging reader loses the
    /// compare-and-swap instead of mistaking a concurrent update for a clock
    /// regression.
    ///
    /// # Returns
    /// - `Ok(Poll::Ready { id })`: a new id is available
    /// - `Ok(Poll::Pending { yield_for: 1 })`: the sequence is exhausted
    /// - `Ok(Poll::Pending { yield_for: 0 })`: another thread won the race
    ///
    /// # Errors
    /// - [`Error::ClockBackwards`] if the clock reads earlier than the last
    ///   issued timestamp
    /// - [`Error::TimestampOutOfRange`] if the clock is outside the layout
    #[instrument(level = "trace", skip(self))]
    pub fn try_poll_id(&self) -> Result<Poll> {
        let allocation = self.layout.allocation();
        let sequence_bits = allocation.sequence_bits();

        let current_raw = self.state.load(Ordering::Acquire);
        let current = SequenceCounter::from_raw(current_raw, sequence_bits);
        let now = self
            .layout
            .ticks_since_epoch(self.time.current_millis())?;

        let next = match current.advance(now, allocation.max_sequence()) {
            Advance::Next(next) => next,
            Advance::Exhausted => return Ok(Poll::Pending { yield_for: 1 }),
            Advance::Behind => return Err(Self::cold_clock_behind(current.last_timestamp, now)),
        };

        if self
            .state
            .compare_exchange(
                current_raw,
                next.to_raw(sequence_bits),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            Ok(Poll::Ready {
                id: allocation.pack(next.last_timestamp, self.machine_id, next.sequence),
            })
        } else {
            // Another thread won the race; retry immediately.
            Ok(Poll::Pending { yield_for: 0 })
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

impl<T> IdGenerator for AtomicSnowflakeGenerator<T>
where
    T: TimeSource,
{
    fn generate(&self) -> Result<u64> {
        generate_blocking(self)
    }
}

impl<T> SnowflakeGenerator for AtomicSnowflakeGenerator<T>
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
        let raw = self.state.load(Ordering::Acquire);
        SequenceCounter::from_raw(raw, self.layout.allocation().sequence_bits()).last_timestamp
    }

    fn try_poll_id(&self) -> Result<Poll> {
        self.try_poll_id()
    }
}
