use crate::{
    error::Result,
    friendly::{SnowflakeIdState, SnowflakeIdStateParser},
    generator::{Poll, backoff},
    id::SnowflakeLayout,
    time::TimeSource,
};

/// Anything that hands out unique numeric ids.
pub trait IdGenerator {
    /// Generates the next id, blocking briefly if the generator is throttled.
    ///
    /// # Errors
    ///
    /// Clock problems ([`Error::ClockBackwards`],
    /// [`Error::ClockTooManyBackwards`], [`Error::TimestampOutOfRange`]).
    /// No id is returned in that case, never a duplicate or a lower one.
    ///
    /// [`Error::ClockBackwards`]: crate::Error::ClockBackwards
    /// [`Error::ClockTooManyBackwards`]: crate::Error::ClockTooManyBackwards
    /// [`Error::TimestampOutOfRange`]: crate::Error::TimestampOutOfRange
    fn generate(&self) -> Result<u64>;
}

/// Generators that render ids as strings.
pub trait StringIdGenerator: IdGenerator {
    /// Generates the next id in its string form.
    ///
    /// # Errors
    ///
    /// Same as [`IdGenerator::generate`], plus converter failures.
    fn generate_as_string(&self) -> Result<String>;
}

/// Snowflake generators: ids packing a timestamp, a machine id and a
/// sequence according to a [`SnowflakeLayout`].
pub trait SnowflakeGenerator: IdGenerator {
    /// The clock timestamps are read from.
    type Time: TimeSource;

    fn layout(&self) -> &SnowflakeLayout;

    fn machine_id(&self) -> u64;

    fn time(&self) -> &Self::Time;

    /// Timestamp (in ticks since the epoch) of the most recently issued id.
    fn last_timestamp(&self) -> u64;

    /// Attempts to generate the next id without blocking.
    ///
    /// # Errors
    ///
    /// Same as [`IdGenerator::generate`].
    fn try_poll_id(&self) -> Result<Poll>;

    /// Polls until an id is ready, calling `f` with the suggested back-off
    /// every time the generator is pending.
    ///
    /// # Errors
    ///
    /// Same as [`Self::try_poll_id`].
    fn try_next_id(&self, mut f: impl FnMut(u64)) -> Result<u64>
    where
        Self: Sized,
    {
        loop {
            match self.try_poll_id()? {
                Poll::Ready { id } => break Ok(id),
                Poll::Pending { yield_for } => f(yield_for),
            }
        }
    }

    /// Whether every id fits in a JavaScript `Number`.
    fn is_safe_javascript(&self) -> bool {
        self.layout().allocation().is_safe_javascript()
    }
}

/// Generators that can decompose their ids into a [`SnowflakeIdState`] and
/// back.
pub trait FriendlyIdGenerator: IdGenerator {
    fn parser(&self) -> &SnowflakeIdStateParser;

    /// Generates an id and decomposes it.
    ///
    /// # Errors
    ///
    /// Same as [`IdGenerator::generate`].
    fn generate_as_state(&self) -> Result<SnowflakeIdState> {
        let id = self.generate()?;
        self.parser().parse(id)
    }

    /// Decomposes an existing id.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidId`](crate::Error::InvalidId) if `id` does not fit the
    /// layout.
    fn friendly_id(&self, id: u64) -> Result<SnowflakeIdState> {
        self.parser().parse(id)
    }

    /// Rebuilds the state of an id from its friendly string.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidId`](crate::Error::InvalidId) for malformed input.
    fn of_friendly_id(&self, friendly_id: &str) -> Result<SnowflakeIdState> {
        self.parser().parse_friendly_id(friendly_id)
    }
}

/// Blocking generation loop shared by the base generators.
pub(crate) fn generate_blocking<G: SnowflakeGenerator>(generator: &G) -> Result<u64> {
    generator.try_next_id(backoff)
}
