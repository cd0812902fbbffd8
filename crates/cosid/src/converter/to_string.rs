use crate::{
    converter::IdConverter,
    error::{Error, Result},
};

/// Largest 63-bit id.
const MAX_ID: u64 = i64::MAX as u64;

/// Width of the largest 63-bit id in decimal.
const PADDED_WIDTH: usize = 19;

/// Plain decimal ids, optionally zero-padded to 19 digits so that string
/// order matches numeric order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ToStringIdConverter {
    pad_start: bool,
}

impl ToStringIdConverter {
    pub const fn new(pad_start: bool) -> Self {
        Self { pad_start }
    }
}

impl IdConverter for ToStringIdConverter {
    fn encode(&self, id: u64) -> Result<String> {
        if id > MAX_ID {
            return Err(Error::invalid_id(
                id.to_string(),
                format!("exceeds the largest id {MAX_ID}"),
            ));
        }
        if self.pad_start {
            Ok(format!("{id:0width$}", width = PADDED_WIDTH))
        } else {
            Ok(id.to_string())
        }
    }

    fn decode(&self, text: &str) -> Result<u64> {
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_id(text, "not a decimal number"));
        }
        let id: u64 = text
            .parse()
            .map_err(|e: core::num::ParseIntError| Error::invalid_id(text, e.to_string()))?;
        if id > MAX_ID {
            return Err(Error::invalid_id(text, format!("exceeds the largest id {MAX_ID}")));
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_nineteen_digits() {
        let converter = ToStringIdConverter::new(true);
        assert_eq!(converter.encode(42).unwrap(), "0000000000000000042");
        assert_eq!(converter.decode("0000000000000000042").unwrap(), 42);
        assert_eq!(
            converter.encode(i64::MAX as u64).unwrap(),
            "9223372036854775807"
        );
    }

    #[test]
    fn rejects_non_digits() {
        let converter = ToStringIdConverter::default();
        assert_eq!(converter.encode(42).unwrap(), "42");
        assert!(converter.decode("+42").is_err());
        assert!(converter.decode("").is_err());
        assert!(converter.decode("99999999999999999999").is_err());
        assert_eq!(converter.decode("9223372036854775807").unwrap(), i64::MAX as u64);
        assert!(matches!(
            converter.decode("9223372036854775808"),
            Err(Error::InvalidId { .. })
        ));
        assert!(converter.decode("18446744073709551615").is_err());
        assert!(converter.encode(u64::MAX).is_err());
    }
}
