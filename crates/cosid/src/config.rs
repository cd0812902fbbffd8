use core::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    friendly::SnowflakeIdStateParser,
    generator::{ClockSyncSnowflakeGenerator, FriendlySnowflakeGenerator, LockSnowflakeGenerator},
    id::{BitAllocation, SnowflakeLayout},
    time::{
        COSID_EPOCH, ClockBackwardsSynchronizer, DEFAULT_BROKEN_THRESHOLD,
        DEFAULT_SPIN_THRESHOLD, SystemClock, TimeUnit,
    },
};

/// The generator stack [`SnowflakeConfig::build`] produces: a lock-based
/// generator that waits out clock regressions and renders friendly ids.
pub type DefaultSnowflakeGenerator =
    FriendlySnowflakeGenerator<ClockSyncSnowflakeGenerator<LockSnowflakeGenerator<SystemClock>>>;

/// Settings of a Snowflake generator.
///
/// Bit widths left unset come from the preset matching `time_unit` and
/// `safe_javascript`.
///
/// # Example
/// ```
/// use cosid::{IdGenerator, SnowflakeConfig, TimeUnit};
///
/// let config: SnowflakeConfig = serde_json::from_str(r#"{ "time_unit": "second" }"#)?;
/// assert_eq!(config.time_unit, TimeUnit::Second);
/// let generator = config.build(3)?;
/// assert!(generator.generate()? > 0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowflakeConfig {
    /// Milliseconds since the Unix epoch that timestamp zero stands for.
    pub epoch_millis: u64,
    pub time_unit: TimeUnit,
    pub safe_javascript: bool,
    pub timestamp_bits: Option<u32>,
    pub machine_bits: Option<u32>,
    pub sequence_bits: Option<u32>,
    /// Offset from UTC of friendly id timestamps.
    pub zone_offset_seconds: i32,
    pub friendly_pad_start: bool,
    #[serde(with = "duration_millis")]
    pub spin_threshold: Duration,
    #[serde(with = "duration_millis")]
    pub broken_threshold: Duration,
}

impl Default for SnowflakeConfig {
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        Self {
            epoch_millis: COSID_EPOCH.as_millis() as u64,
            time_unit: TimeUnit::Millisecond,
            safe_javascript: false,
            timestamp_bits: None,
            machine_bits: None,
            sequence_bits: None,
            zone_offset_seconds: 0,
            friendly_pad_start: true,
            spin_threshold: DEFAULT_SPIN_THRESHOLD,
            broken_threshold: DEFAULT_BROKEN_THRESHOLD,
        }
    }
}

impl SnowflakeConfig {
    fn preset(&self) -> BitAllocation {
        match (self.time_unit, self.safe_javascript) {
            (TimeUnit::Millisecond, false) => BitAllocation::MILLISECOND,
            (TimeUnit::Millisecond, true) => BitAllocation::SAFE_JAVASCRIPT_MILLISECOND,
            (TimeUnit::Second, false) => BitAllocation::SECOND,
            (TimeUnit::Second, true) => BitAllocation::SAFE_JAVASCRIPT_SECOND,
        }
    }

    /// # Errors
    ///
    /// [`Error::Configuration`] if the bit widths are invalid, or exceed 53
    /// bits with `safe_javascript` set, and for the epoch and range errors of
    /// [`SnowflakeLayout::try_new`].
    pub fn layout(&self) -> Result<SnowflakeLayout> {
        let preset = self.preset();
        let allocation = BitAllocation::new(
            self.timestamp_bits.unwrap_or(preset.timestamp_bits()),
            self.machine_bits.unwrap_or(preset.machine_bits()),
            self.sequence_bits.unwrap_or(preset.sequence_bits()),
        )?;
        if self.safe_javascript && !allocation.is_safe_javascript() {
            return Err(Error::configuration(format!(
                "{} bits are not JavaScript safe",
                allocation.total_bits()
            )));
        }
        SnowflakeLayout::try_new(
            allocation,
            Duration::from_millis(self.epoch_millis),
            self.time_unit,
        )
    }

    /// # Errors
    ///
    /// [`Error::Configuration`] for offsets of a day or more.
    pub fn zone(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.zone_offset_seconds).ok_or_else(|| {
            Error::configuration(format!(
                "zone offset {}s is out of range",
                self.zone_offset_seconds
            ))
        })
    }

    /// # Errors
    ///
    /// Same as [`ClockBackwardsSynchronizer::new`].
    pub fn synchronizer(&self) -> Result<ClockBackwardsSynchronizer> {
        ClockBackwardsSynchronizer::new(self.spin_threshold, self.broken_threshold)
    }

    /// # Errors
    ///
    /// Same as [`Self::layout`] and [`Self::zone`].
    pub fn parser(&self) -> Result<SnowflakeIdStateParser> {
        Ok(SnowflakeIdStateParser::with_zone(
            self.layout()?,
            self.zone()?,
            self.friendly_pad_start,
        ))
    }

    /// Builds the default generator stack for `machine_id`.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for any invalid setting or a machine id that
    /// does not fit.
    pub fn build(&self, machine_id: u64) -> Result<DefaultSnowflakeGenerator> {
        let layout = self.layout()?;
        let inner = LockSnowflakeGenerator::new(layout, machine_id, SystemClock)?;
        Ok(FriendlySnowflakeGenerator::with_parser(
            ClockSyncSnowflakeGenerator::with_synchronizer(inner, self.synchronizer()?),
            self.parser()?,
        ))
    }
}

/// Settings of [`LeaseMachineIdDistributor`] and [`MachineIdGuarder`].
///
/// [`LeaseMachineIdDistributor`]: crate::machine::LeaseMachineIdDistributor
/// [`MachineIdGuarder`]: crate::machine::MachineIdGuarder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributorConfig {
    /// Upper bound of every backend call.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Age after which a silent non-stable lease may be reclaimed. Zero
    /// disables expiry.
    #[serde(with = "duration_millis")]
    pub safe_guard_duration: Duration,
    /// Heartbeat period of the guarder. Keep it well below
    /// `safe_guard_duration`.
    #[serde(with = "duration_millis")]
    pub guard_interval: Duration,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            safe_guard_duration: Duration::ZERO,
            guard_interval: Duration::from_secs(60),
        }
    }
}

impl DistributorConfig {
    /// # Errors
    ///
    /// [`Error::Configuration`] for a zero timeout or guard interval, or a
    /// guard interval not below a non-zero safe-guard duration.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::configuration("distributor timeout must be non-zero"));
        }
        if self.guard_interval.is_zero() {
            return Err(Error::configuration("guard interval must be non-zero"));
        }
        if !self.safe_guard_duration.is_zero() && self.guard_interval >= self.safe_guard_duration {
            return Err(Error::configuration(format!(
                "guard interval {:?} must be shorter than the safe-guard duration {:?}",
                self.guard_interval, self.safe_guard_duration
            )));
        }
        Ok(())
    }
}

mod duration_millis {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
