/// Outcome of a single non-blocking generation attempt.
///
/// - [`Poll::Ready`] carries a freshly issued id.
/// - [`Poll::Pending`] means no id could be issued right now. `yield_for` is
///   the number of ticks to back off: `1` when the sequence of the current
///   tick is exhausted, `0` when another thread won a compare-and-swap race
///   and the attempt can be retried immediately.
///
/// # Example
///
/// ```
/// use cosid::{LockSnowflakeGenerator, Poll, SnowflakeGenerator, SnowflakeLayout, SystemClock};
///
/// let generator = LockSnowflakeGenerator::new(SnowflakeLayout::MILLISECOND, 1, SystemClock).unwrap();
/// match generator.try_poll_id().unwrap() {
///     Poll::Ready { id } => println!("id: {id}"),
///     Poll::Pending { yield_for } => println!("back off for {yield_for} ticks"),
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// A unique id was generated and is ready to use.
    Ready {
        /// The generated id.
        id: u64,
    },
    /// No id could be generated on this attempt.
    Pending {
        /// Ticks to wait before trying again.
        yield_for: u64,
    },
}
