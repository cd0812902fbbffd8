use core::fmt;

use chrono::{DateTime, FixedOffset};

/// The decomposed fields of a Snowflake id.
#[derive(Clone, Debug)]
pub struct SnowflakeIdState {
    pub id: u64,
    /// Wall-clock time of the id's timestamp field, in the parser's zone.
    pub timestamp: DateTime<FixedOffset>,
    pub machine_id: u64,
    pub sequence: u64,
    pub friendly_id: String,
}

/// Two states are equal when id, timestamp, machine id and sequence match.
/// The friendly string is a rendering and may differ in padding or zone.
impl PartialEq for SnowflakeIdState {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.timestamp == other.timestamp
            && self.machine_id == other.machine_id
            && self.sequence == other.sequence
    }
}

impl Eq for SnowflakeIdState {}

impl fmt::Display for SnowflakeIdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.friendly_id)
    }
}
