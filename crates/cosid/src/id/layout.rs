use core::time::Duration;

use crate::{
    error::{Error, Result},
    id::BitAllocation,
    time::{COSID_EPOCH, TimeUnit},
};

/// Last instant whose friendly id keeps a four digit year in every zone,
/// 9999-12-30T23:59:59.999Z.
pub const MAX_UNIX_MILLIS: u64 = 253_402_214_399_999;

/// Everything needed to turn a wall-clock reading into id fields and back:
/// the bit allocation, the epoch and the tick resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SnowflakeLayout {
    allocation: BitAllocation,
    epoch_millis: u64,
    unit: TimeUnit,
}

impl SnowflakeLayout {
    /// Millisecond ticks, 41/10/12 bits, CosId epoch.
    pub const MILLISECOND: Self =
        Self::new(BitAllocation::MILLISECOND, COSID_EPOCH, TimeUnit::Millisecond);

    /// Second ticks, 31/10/22 bits, CosId epoch.
    pub const SECOND: Self = Self::new(BitAllocation::SECOND, COSID_EPOCH, TimeUnit::Second);

    /// Millisecond ticks, 41/3/9 bits, CosId epoch.
    pub const SAFE_JAVASCRIPT_MILLISECOND: Self = Self::new(
        BitAllocation::SAFE_JAVASCRIPT_MILLISECOND,
        COSID_EPOCH,
        TimeUnit::Millisecond,
    );

    /// Second ticks, 31/3/19 bits, CosId epoch.
    pub const SAFE_JAVASCRIPT_SECOND: Self = Self::new(
        BitAllocation::SAFE_JAVASCRIPT_SECOND,
        COSID_EPOCH,
        TimeUnit::Second,
    );

    /// Epochs are truncated to whole ticks. No range checks are made, see
    /// [`Self::try_new`].
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(allocation: BitAllocation, epoch: Duration, unit: TimeUnit) -> Self {
        let epoch_millis = epoch.as_millis() as u64;
        Self {
            allocation,
            epoch_millis: epoch_millis - epoch_millis % unit.millis_per_tick(),
            unit,
        }
    }

    /// Creates a layout whose every timestamp can be rendered as a friendly
    /// id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the epoch is not a whole number of
    /// ticks, or if the largest timestamp falls after [`MAX_UNIX_MILLIS`].
    pub fn try_new(allocation: BitAllocation, epoch: Duration, unit: TimeUnit) -> Result<Self> {
        let epoch_millis = u64::try_from(epoch.as_millis())
            .map_err(|_| Error::configuration(format!("epoch {epoch:?} is out of range")))?;
        if epoch_millis % unit.millis_per_tick() != 0 {
            return Err(Error::configuration(format!(
                "epoch {epoch_millis}ms is not a whole number of {unit:?} ticks"
            )));
        }
        let last = allocation
            .max_timestamp()
            .checked_mul(unit.millis_per_tick())
            .and_then(|millis| millis.checked_add(epoch_millis));
        match last {
            Some(last) if last <= MAX_UNIX_MILLIS => Ok(Self::new(allocation, epoch, unit)),
            _ => Err(Error::configuration(format!(
                "{} timestamp bits of {unit:?} ticks run past year 9999",
                allocation.timestamp_bits()
            ))),
        }
    }

    pub const fn allocation(&self) -> &BitAllocation {
        &self.allocation
    }

    pub const fn epoch(&self) -> Duration {
        Duration::from_millis(self.epoch_millis)
    }

    pub const fn epoch_millis(&self) -> u64 {
        self.epoch_millis
    }

    pub const fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Converts milliseconds since the Unix epoch into timestamp ticks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimestampOutOfRange`] if `unix_millis` is before the
    /// epoch or the tick count does not fit in the timestamp field.
    pub fn ticks_since_epoch(&self, unix_millis: u64) -> Result<u64> {
        let max = self.allocation.max_timestamp();
        let Some(elapsed) = unix_millis.checked_sub(self.epoch_millis) else {
            return Err(Error::TimestampOutOfRange { timestamp: 0, max });
        };
        let ticks = self.unit.from_millis(elapsed);
        if ticks > max {
            return Err(Error::TimestampOutOfRange {
                timestamp: ticks,
                max,
            });
        }
        Ok(ticks)
    }

    /// Converts timestamp ticks back into milliseconds since the Unix epoch.
    pub const fn to_unix_millis(&self, ticks: u64) -> u64 {
        self.epoch_millis.saturating_add(self.unit.to_millis(ticks))
    }
}

impl Default for SnowflakeLayout {
    fn default() -> Self {
        Self::MILLISECOND
    }
}
