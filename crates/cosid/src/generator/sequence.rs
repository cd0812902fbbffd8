use core::cmp::Ordering;

/// The mutable half of a generator: the timestamp of the last issued id and
/// the sequence used within it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SequenceCounter {
    pub(crate) last_timestamp: u64,
    pub(crate) sequence: u64,
}

/// Result of advancing a [`SequenceCounter`] to the current tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Advance {
    /// The next state; its fields make up the new id.
    Next(SequenceCounter),
    /// Every sequence of the current tick has been handed out.
    Exhausted,
    /// The clock reads earlier than `last_timestamp`.
    Behind,
}

impl SequenceCounter {
    pub(crate) const fn new(last_timestamp: u64, sequence: u64) -> Self {
        Self {
            last_timestamp,
            sequence,
        }
    }

    pub(crate) fn advance(self, now: u64, max_sequence: u64) -> Advance {
        match now.cmp(&self.last_timestamp) {
            Ordering::Equal => {
                if self.sequence < max_sequence {
                    Advance::Next(Self::new(now, self.sequence + 1))
                } else {
                    Advance::Exhausted
                }
            }
            Ordering::Greater => Advance::Next(Self::new(now, 0)),
            Ordering::Less => Advance::Behind,
        }
    }

    /// Packs the counter into a single word. The timestamp and sequence
    /// fields of a valid allocation never exceed 63 bits together.
    pub(crate) const fn to_raw(self, sequence_bits: u32) -> u64 {
        (self.last_timestamp << sequence_bits) | self.sequence
    }

    pub(crate) const fn from_raw(raw: u64, sequence_bits: u32) -> Self {
        let sequence_mask = if sequence_bits == 0 {
            0
        } else {
            u64::MAX >> (64 - sequence_bits)
        };
        Self::new(raw >> sequence_bits, raw & sequence_mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_tick_increments_sequence() {
        let counter = SequenceCounter::new(42, 3);
        assert_eq!(
            counter.advance(42, 4095),
            Advance::Next(SequenceCounter::new(42, 4))
        );
    }

    #[test]
    fn new_tick_resets_sequence() {
        let counter = SequenceCounter::new(42, 4095);
        assert_eq!(
            counter.advance(43, 4095),
            Advance::Next(SequenceCounter::new(43, 0))
        );
    }

    #[test]
    fn exhausted_and_behind() {
        let counter = SequenceCounter::new(42, 4095);
        assert_eq!(counter.advance(42, 4095), Advance::Exhausted);
        assert_eq!(counter.advance(41, 4095), Advance::Behind);
    }

    #[test]
    fn raw_form_keeps_both_fields() {
        let counter = SequenceCounter::new((1 << 41) - 1, 4095);
        assert_eq!(SequenceCounter::from_raw(counter.to_raw(12), 12), counter);

        let no_sequence = SequenceCounter::new(7, 0);
        assert_eq!(SequenceCounter::from_raw(no_sequence.to_raw(0), 0), no_sequence);
    }
}
