use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, TimeZone, Timelike, Utc};

use crate::{
    error::{Error, Result},
    friendly::SnowflakeIdState,
    id::SnowflakeLayout,
    time::TimeUnit,
};

const DELIMITER: char = '-';

/// Converts between Snowflake ids, their [`SnowflakeIdState`] and the
/// friendly string `yyyyMMddHHmmssSSS-<machineId>-<sequence>`.
///
/// Second layouts drop the `SSS` part. With `pad_start` the machine id and
/// sequence are left-padded with zeros to the digit count of their maxima,
/// which keeps friendly ids of one layout the same length. The decoder
/// accepts padded and unpadded input alike.
///
/// # Example
/// ```
/// use cosid::{SnowflakeIdStateParser, SnowflakeLayout};
///
/// let layout = SnowflakeLayout::MILLISECOND;
/// let parser = SnowflakeIdStateParser::new(layout);
///
/// let id = layout.allocation().pack(1_000, 1, 2);
/// let state = parser.parse(id)?;
/// assert_eq!(state.friendly_id, "20191224160001000-0001-0002");
/// assert_eq!(parser.parse_friendly_id(&state.friendly_id)?, state);
/// # Ok::<(), cosid::Error>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnowflakeIdStateParser {
    layout: SnowflakeLayout,
    zone: FixedOffset,
    pad_start: bool,
    machine_width: usize,
    sequence_width: usize,
}

impl SnowflakeIdStateParser {
    /// UTC timestamps, padded fields.
    pub fn new(layout: SnowflakeLayout) -> Self {
        Self::with_zone(layout, Utc.fix(), true)
    }

    pub fn with_zone(layout: SnowflakeLayout, zone: FixedOffset, pad_start: bool) -> Self {
        let allocation = layout.allocation();
        Self {
            layout,
            zone,
            pad_start,
            machine_width: digits(allocation.max_machine_id()),
            sequence_width: digits(allocation.max_sequence()),
        }
    }

    pub const fn layout(&self) -> &SnowflakeLayout {
        &self.layout
    }

    pub const fn zone(&self) -> FixedOffset {
        self.zone
    }

    pub const fn pad_start(&self) -> bool {
        self.pad_start
    }

    /// Decomposes `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] if `id` carries bits beyond the layout's
    /// allocation, or if its timestamp cannot be represented. The latter never
    /// happens for layouts from [`SnowflakeLayout::try_new`].
    pub fn parse(&self, id: u64) -> Result<SnowflakeIdState> {
        let allocation = self.layout.allocation();
        if id > allocation.max_id() {
            return Err(Error::invalid_id(
                id.to_string(),
                format!("exceeds the largest id {} of the layout", allocation.max_id()),
            ));
        }
        let unix_millis = self.layout.to_unix_millis(allocation.timestamp_of(id));
        let timestamp = i64::try_from(unix_millis)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| Error::invalid_id(id.to_string(), "timestamp is not representable"))?
            .with_timezone(&self.zone);
        let machine_id = allocation.machine_id_of(id);
        let sequence = allocation.sequence_of(id);
        Ok(SnowflakeIdState {
            id,
            friendly_id: self.to_friendly_id(&timestamp, machine_id, sequence),
            timestamp,
            machine_id,
            sequence,
        })
    }

    /// Renders the friendly id of the given fields.
    pub fn to_friendly_id(
        &self,
        timestamp: &DateTime<FixedOffset>,
        machine_id: u64,
        sequence: u64,
    ) -> String {
        let time = timestamp.with_timezone(&self.zone);
        let mut out = format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}",
            time.year(),
            time.month(),
            time.day(),
            time.hour(),
            time.minute(),
            time.second()
        );
        if self.layout.unit() == TimeUnit::Millisecond {
            out.push_str(&format!("{:03}", time.timestamp_subsec_millis()));
        }
        if self.pad_start {
            out.push_str(&format!(
                "{DELIMITER}{machine_id:0mw$}{DELIMITER}{sequence:0sw$}",
                mw = self.machine_width,
                sw = self.sequence_width
            ));
        } else {
            out.push_str(&format!("{DELIMITER}{machine_id}{DELIMITER}{sequence}"));
        }
        out
    }

    /// Rebuilds the state of the id a friendly string was rendered from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] for malformed input, fields beyond their
    /// maxima, or a time outside the layout's timestamp range.
    pub fn parse_friendly_id(&self, friendly_id: &str) -> Result<SnowflakeIdState> {
        let invalid = |reason: &str| Error::invalid_id(friendly_id, reason);

        let mut parts = friendly_id.split(DELIMITER);
        let (Some(time), Some(machine), Some(sequence), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected `<time>-<machineId>-<sequence>`"));
        };

        let allocation = self.layout.allocation();
        let machine_id = parse_digits(machine).ok_or_else(|| invalid("machine id is not a number"))?;
        if machine_id > allocation.max_machine_id() {
            return Err(invalid("machine id exceeds its field"));
        }
        let sequence = parse_digits(sequence).ok_or_else(|| invalid("sequence is not a number"))?;
        if sequence > allocation.max_sequence() {
            return Err(invalid("sequence exceeds its field"));
        }

        let timestamp = self.parse_time(time).ok_or_else(|| invalid("malformed time"))?;
        let unix_millis =
            u64::try_from(timestamp.timestamp_millis()).map_err(|_| invalid("time before 1970"))?;
        let ticks = self
            .layout
            .ticks_since_epoch(unix_millis)
            .map_err(|_| invalid("time outside the layout's range"))?;

        self.parse(allocation.pack(ticks, machine_id, sequence))
    }

    /// `yyyy…MMddHHmmss[SSS]`: the trailing fields are fixed-width, the year
    /// takes whatever digits remain.
    fn parse_time(&self, time: &str) -> Option<DateTime<FixedOffset>> {
        let fixed = match self.layout.unit() {
            TimeUnit::Millisecond => 13,
            TimeUnit::Second => 10,
        };
        if !time.bytes().all(|b| b.is_ascii_digit()) || time.len() <= fixed {
            return None;
        }
        let (year, rest) = time.split_at(time.len() - fixed);
        let field = |range: core::ops::Range<usize>| rest.get(range)?.parse::<u32>().ok();

        let date = NaiveDate::from_ymd_opt(year.parse().ok()?, field(0..2)?, field(2..4)?)?;
        let millis = match self.layout.unit() {
            TimeUnit::Millisecond => field(10..13)?,
            TimeUnit::Second => 0,
        };
        let local = date.and_hms_milli_opt(field(4..6)?, field(6..8)?, field(8..10)?, millis)?;
        self.zone.from_local_datetime(&local).single()
    }
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

const fn digits(mut value: u64) -> usize {
    let mut count = 1;
    while value >= 10 {
        value /= 10;
        count += 1;
    }
    count
}
