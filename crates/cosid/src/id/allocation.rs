use crate::error::{Error, Result};

/// Bits available to an id. The sign bit of an `i64` is never used, so every
/// id is also a valid non-negative signed 64-bit integer.
pub const TOTAL_BITS: u32 = 63;

/// Largest number of bits an id may use and still be an exact JavaScript
/// `Number` (`Number.MAX_SAFE_INTEGER` is `2^53 - 1`).
pub const SAFE_JAVASCRIPT_BITS: u32 = 53;

/// Partitions an id into timestamp, machine id and sequence fields, from the
/// most to the least significant bits:
///
/// ```text
///  Bit Index:  62 ....... machine+seq | machine+seq-1 ... seq | seq-1 ... 0
///              +-------------------------------------------------------------+
///  Field:      |  timestamp           |  machine id          |  sequence     |
///              +-------------------------------------------------------------+
/// ```
///
/// Unused high bits (when the fields sum to fewer than 63) are always zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitAllocation {
    timestamp_bits: u32,
    machine_bits: u32,
    sequence_bits: u32,
}

impl BitAllocation {
    /// 41 timestamp / 10 machine / 12 sequence bits, for millisecond ticks.
    pub const MILLISECOND: Self = Self::new_unchecked(41, 10, 12);

    /// 31 timestamp / 10 machine / 22 sequence bits, for second ticks.
    pub const SECOND: Self = Self::new_unchecked(31, 10, 22);

    /// 41 / 3 / 9 bits: millisecond ids that fit in 53 bits.
    pub const SAFE_JAVASCRIPT_MILLISECOND: Self = Self::new_unchecked(41, 3, 9);

    /// 31 / 3 / 19 bits: second ids that fit in 53 bits.
    pub const SAFE_JAVASCRIPT_SECOND: Self = Self::new_unchecked(31, 3, 19);

    /// Creates an allocation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the timestamp field is empty or
    /// the three widths add up to more than [`TOTAL_BITS`].
    pub fn new(timestamp_bits: u32, machine_bits: u32, sequence_bits: u32) -> Result<Self> {
        if timestamp_bits == 0 {
            return Err(Error::configuration("timestamp bits must be at least 1"));
        }
        let total = timestamp_bits
            .checked_add(machine_bits)
            .and_then(|bits| bits.checked_add(sequence_bits));
        match total {
            Some(total) if total <= TOTAL_BITS => Ok(Self::new_unchecked(
                timestamp_bits,
                machine_bits,
                sequence_bits,
            )),
            _ => Err(Error::configuration(format!(
                "timestamp ({timestamp_bits}) + machine ({machine_bits}) + sequence \
                 ({sequence_bits}) bits exceed {TOTAL_BITS}"
            ))),
        }
    }

    const fn new_unchecked(timestamp_bits: u32, machine_bits: u32, sequence_bits: u32) -> Self {
        Self {
            timestamp_bits,
            machine_bits,
            sequence_bits,
        }
    }

    pub const fn timestamp_bits(&self) -> u32 {
        self.timestamp_bits
    }

    pub const fn machine_bits(&self) -> u32 {
        self.machine_bits
    }

    pub const fn sequence_bits(&self) -> u32 {
        self.sequence_bits
    }

    pub const fn total_bits(&self) -> u32 {
        self.timestamp_bits + self.machine_bits + self.sequence_bits
    }

    pub const fn max_timestamp(&self) -> u64 {
        mask(self.timestamp_bits)
    }

    pub const fn max_machine_id(&self) -> u64 {
        mask(self.machine_bits)
    }

    /// Number of distinct machine ids, i.e. `2^machine_bits`.
    pub const fn machine_id_count(&self) -> u64 {
        1 << self.machine_bits
    }

    pub const fn max_sequence(&self) -> u64 {
        mask(self.sequence_bits)
    }

    /// Largest id this allocation can produce.
    pub const fn max_id(&self) -> u64 {
        mask(self.total_bits())
    }

    const fn machine_shift(&self) -> u32 {
        self.sequence_bits
    }

    const fn timestamp_shift(&self) -> u32 {
        self.machine_bits + self.sequence_bits
    }

    /// Whether every id fits in [`SAFE_JAVASCRIPT_BITS`].
    pub const fn is_safe_javascript(&self) -> bool {
        self.total_bits() <= SAFE_JAVASCRIPT_BITS
    }

    /// Checks that a restored timestamp and sequence fit in their fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] otherwise.
    pub fn check_counter(&self, timestamp: u64, sequence: u64) -> Result<()> {
        if timestamp > self.max_timestamp() {
            return Err(Error::configuration(format!(
                "timestamp {timestamp} does not fit in {} bits",
                self.timestamp_bits
            )));
        }
        if sequence > self.max_sequence() {
            return Err(Error::configuration(format!(
                "sequence {sequence} does not fit in {} bits",
                self.sequence_bits
            )));
        }
        Ok(())
    }

    /// Checks that `machine_id` fits in the machine id field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] otherwise.
    pub fn check_machine_id(&self, machine_id: u64) -> Result<()> {
        if machine_id > self.max_machine_id() {
            return Err(Error::configuration(format!(
                "machine id {machine_id} does not fit in {} bits (max {})",
                self.machine_bits,
                self.max_machine_id()
            )));
        }
        Ok(())
    }

    /// Packs the three fields into an id. Each field is masked to its width.
    pub const fn pack(&self, timestamp: u64, machine_id: u64, sequence: u64) -> u64 {
        ((timestamp & self.max_timestamp()) << self.timestamp_shift())
            | ((machine_id & self.max_machine_id()) << self.machine_shift())
            | (sequence & self.max_sequence())
    }

    pub const fn timestamp_of(&self, id: u64) -> u64 {
        (id >> self.timestamp_shift()) & self.max_timestamp()
    }

    pub const fn machine_id_of(&self, id: u64) -> u64 {
        (id >> self.machine_shift()) & self.max_machine_id()
    }

    pub const fn sequence_of(&self, id: u64) -> u64 {
        id & self.max_sequence()
    }
}

impl Default for BitAllocation {
    fn default() -> Self {
        Self::MILLISECOND
    }
}

const fn mask(bits: u32) -> u64 {
    if bits == 0 { 0 } else { u64::MAX >> (64 - bits) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_fill_their_budget() {
        assert_eq!(BitAllocation::MILLISECOND.total_bits(), 63);
        assert_eq!(BitAllocation::SECOND.total_bits(), 63);
        assert_eq!(BitAllocation::SAFE_JAVASCRIPT_MILLISECOND.total_bits(), 53);
        assert_eq!(BitAllocation::SAFE_JAVASCRIPT_SECOND.total_bits(), 53);
        assert!(!BitAllocation::MILLISECOND.is_safe_javascript());
        assert!(BitAllocation::SAFE_JAVASCRIPT_SECOND.is_safe_javascript());
    }

    #[test]
    fn rejects_invalid_widths() {
        assert!(matches!(
            BitAllocation::new(42, 10, 12),
            Err(Error::Configuration { .. })
        ));
        assert!(matches!(
            BitAllocation::new(0, 10, 12),
            Err(Error::Configuration { .. })
        ));
        assert!(matches!(
            BitAllocation::new(u32::MAX, 1, 1),
            Err(Error::Configuration { .. })
        ));
        assert!(BitAllocation::new(41, 5, 10).is_ok());
    }

    #[test]
    fn machine_id_must_fit() {
        let allocation = BitAllocation::new(41, 5, 10).unwrap();
        assert!(allocation.check_machine_id(31).is_ok());
        assert!(allocation.check_machine_id(32).is_err());

        let no_machine = BitAllocation::new(50, 0, 13).unwrap();
        assert_eq!(no_machine.max_machine_id(), 0);
        assert_eq!(no_machine.machine_id_count(), 1);
        assert!(no_machine.check_machine_id(0).is_ok());
        assert!(no_machine.check_machine_id(1).is_err());
    }

    #[test]
    fn fields_are_extracted_from_their_positions() {
        let allocation = BitAllocation::MILLISECOND;
        let id = allocation.pack(0x1_2345_6789, 0x2AB, 0xCDE);
        assert_eq!(allocation.timestamp_of(id), 0x1_2345_6789);
        assert_eq!(allocation.machine_id_of(id), 0x2AB);
        assert_eq!(allocation.sequence_of(id), 0xCDE);
        assert!(id < 1 << 63);
    }

    #[test]
    fn max_fields_produce_max_id() {
        let allocation = BitAllocation::SAFE_JAVASCRIPT_MILLISECOND;
        let id = allocation.pack(
            allocation.max_timestamp(),
            allocation.max_machine_id(),
            allocation.max_sequence(),
        );
        assert_eq!(id, allocation.max_id());
        assert_eq!(id, (1 << 53) - 1);
    }
}
