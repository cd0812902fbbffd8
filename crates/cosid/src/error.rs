use core::time::Duration;

/// A result type defaulting to [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `cosid` can emit.
///
/// Construction problems ([`Error::Configuration`]) surface immediately and
/// are never deferred to the first generation call. Distribution problems
/// ([`Error::MachineIdOverflow`], [`Error::BackendUnavailable`]) are fatal to
/// startup: a process must not generate ids without a leased machine id.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid bit widths, a machine id that does not fit its field, or an
    /// otherwise unusable setting.
    #[error("invalid configuration: {reason}")]
    Configuration {
        /// Human readable description of the offending setting.
        reason: String,
    },

    /// The clock reads earlier than the last issued timestamp.
    ///
    /// Raised by the base generators. The clock-sync decorator absorbs it by
    /// waiting for the clock to catch up.
    #[error("clock moved backwards: last timestamp {last_timestamp}, current {current_timestamp}")]
    ClockBackwards {
        /// Last timestamp (in layout ticks since the epoch) an id was issued
        /// for.
        last_timestamp: u64,
        /// The current clock reading in the same unit.
        current_timestamp: u64,
    },

    /// The clock moved backwards further than the synchronizer tolerates.
    #[error("clock moved backwards by {backwards:?}, tolerated threshold is {threshold:?}")]
    ClockTooManyBackwards {
        /// How far the clock is behind.
        backwards: Duration,
        /// The configured broken threshold.
        threshold: Duration,
    },

    /// The clock is before the epoch or beyond what the timestamp field can
    /// hold.
    #[error("timestamp {timestamp} is outside the representable range 0..={max}")]
    TimestampOutOfRange {
        /// The offending timestamp, in layout ticks since the epoch (zero when
        /// the clock is before the epoch).
        timestamp: u64,
        /// Largest timestamp the allocation can hold.
        max: u64,
    },

    /// Every machine id of the namespace is leased.
    #[error("machine id overflow in namespace `{namespace}`: all {max_machine_ids} machine ids are leased")]
    MachineIdOverflow {
        /// The exhausted namespace.
        namespace: String,
        /// Size of the machine id space.
        max_machine_ids: u64,
    },

    /// The instance no longer owns the lease it is trying to refresh.
    #[error("machine id lease of `{instance}` in namespace `{namespace}` was lost")]
    MachineIdLost {
        /// Namespace of the lease.
        namespace: String,
        /// Instance that lost its lease.
        instance: String,
    },

    /// The coordination backend failed or did not answer in time.
    #[error("coordination backend unavailable: {reason}")]
    BackendUnavailable {
        /// Backend error or timeout description.
        reason: String,
    },

    /// A string or raw value could not be decoded into an id.
    #[error("invalid id `{input}`: {reason}")]
    InvalidId {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Local machine state storage failed.
    #[error("machine state storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Local machine state could not be (de)serialized.
    #[error("machine state format error: {0}")]
    StorageFormat(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_id(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidId {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Wraps any backend failure as [`Error::BackendUnavailable`].
    pub fn backend(reason: impl core::fmt::Display) -> Self {
        Self::BackendUnavailable {
            reason: reason.to_string(),
        }
    }
}
