use crate::error::{Error, Result};

const NO_VALUE: u8 = 255;

/// The digit symbols of a positional numeral system plus the reverse lookup
/// table used for decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alphabet {
    symbols: &'static [u8],
    lookup: [u8; 256],
}

impl Alphabet {
    /// `0-9A-Za-z`, case-sensitive.
    pub const BASE62: Self =
        Self::build(b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz", false);

    /// `0-9A-Z`; lowercase input is accepted.
    pub const BASE36: Self = Self::build(b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ", true);

    /// Crockford base32. Decoding is case-insensitive and maps `I`/`L` to `1`
    /// and `O` to `0`.
    pub const CROCKFORD32: Self = {
        let mut alphabet = Self::build(b"0123456789ABCDEFGHJKMNPQRSTVWXYZ", true);
        alphabet.lookup[b'O' as usize] = 0;
        alphabet.lookup[b'o' as usize] = 0;
        alphabet.lookup[b'I' as usize] = 1;
        alphabet.lookup[b'i' as usize] = 1;
        alphabet.lookup[b'L' as usize] = 1;
        alphabet.lookup[b'l' as usize] = 1;
        alphabet
    };

    /// Builds an alphabet from arbitrary symbols.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] unless `symbols` holds at least two
    /// distinct ASCII characters.
    pub fn new(symbols: &'static str) -> Result<Self> {
        let bytes = symbols.as_bytes();
        if !symbols.is_ascii() || bytes.len() < 2 {
            return Err(Error::configuration(
                "alphabet needs at least 2 ASCII symbols",
            ));
        }
        let alphabet = Self::build(bytes, false);
        let distinct = alphabet.lookup.iter().filter(|&&v| v != NO_VALUE).count();
        if distinct != bytes.len() {
            return Err(Error::configuration(format!(
                "alphabet `{symbols}` contains duplicate symbols"
            )));
        }
        Ok(alphabet)
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn build(symbols: &'static [u8], case_insensitive: bool) -> Self {
        let mut lookup = [NO_VALUE; 256];
        let mut i = 0;
        while i < symbols.len() {
            let c = symbols[i];
            lookup[c as usize] = i as u8;
            if case_insensitive && c.is_ascii_uppercase() {
                lookup[c.to_ascii_lowercase() as usize] = i as u8;
            }
            i += 1;
        }
        Self { symbols, lookup }
    }

    pub const fn radix(&self) -> u64 {
        self.symbols.len() as u64
    }

    pub const fn zero(&self) -> u8 {
        self.symbols[0]
    }

    fn symbol(&self, digit: u64) -> u8 {
        // Callers only pass `value % radix`.
        self.symbols[usize::try_from(digit).unwrap_or_default()]
    }

    fn value(&self, byte: u8) -> Option<u64> {
        match self.lookup[usize::from(byte)] {
            NO_VALUE => None,
            v => Some(u64::from(v)),
        }
    }
}

/// Encodes ids as digits of an arbitrary radix.
///
/// With `pad_start`, every encoding is left-padded with the zero symbol to
/// the number of characters the largest id needs, so encodings sort like
/// the ids themselves.
///
/// # Example
/// ```
/// use cosid::{IdConverter, RadixIdConverter};
///
/// let converter = RadixIdConverter::base62(true);
/// assert_eq!(converter.encode(61)?, "0000000000z");
/// assert_eq!(converter.decode("z")?, 61);
/// assert_eq!(converter.encode(i64::MAX as u64)?, "AzL8n0Y58m7");
/// # Ok::<(), cosid::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RadixIdConverter {
    alphabet: Alphabet,
    pad_start: bool,
    char_size: usize,
    max_id: u64,
}

impl RadixIdConverter {
    /// Largest id accepted by the preset converters.
    pub const DEFAULT_MAX_ID: u64 = i64::MAX as u64;

    pub fn base62(pad_start: bool) -> Self {
        Self::with_max_id(Alphabet::BASE62, pad_start, Self::DEFAULT_MAX_ID)
    }

    pub fn base36(pad_start: bool) -> Self {
        Self::with_max_id(Alphabet::BASE36, pad_start, Self::DEFAULT_MAX_ID)
    }

    pub fn crockford32(pad_start: bool) -> Self {
        Self::with_max_id(Alphabet::CROCKFORD32, pad_start, Self::DEFAULT_MAX_ID)
    }

    /// A converter limited to ids up to `max_id`; padding width follows from
    /// it, e.g. the `max_id` of a JavaScript-safe layout.
    pub fn with_max_id(alphabet: Alphabet, pad_start: bool, max_id: u64) -> Self {
        let char_size = char_size(alphabet.radix(), max_id);
        Self {
            alphabet,
            pad_start,
            char_size,
            max_id,
        }
    }

    pub const fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub const fn pad_start(&self) -> bool {
        self.pad_start
    }

    /// Characters needed for the largest id.
    pub const fn char_size(&self) -> usize {
        self.char_size
    }

    pub const fn max_id(&self) -> u64 {
        self.max_id
    }
}

impl super::IdConverter for RadixIdConverter {
    fn encode(&self, id: u64) -> Result<String> {
        if id > self.max_id {
            return Err(Error::invalid_id(
                id.to_string(),
                format!("exceeds the largest convertible id {}", self.max_id),
            ));
        }
        let radix = self.alphabet.radix();
        let mut digits = Vec::with_capacity(self.char_size);
        let mut rest = id;
        loop {
            digits.push(self.alphabet.symbol(rest % radix));
            rest /= radix;
            if rest == 0 {
                break;
            }
        }
        if self.pad_start {
            digits.resize(self.char_size, self.alphabet.zero());
        }
        digits.reverse();
        String::from_utf8(digits).map_err(|e| Error::invalid_id(id.to_string(), e.to_string()))
    }

    fn decode(&self, text: &str) -> Result<u64> {
        let invalid = |reason: String| Error::invalid_id(text, reason);
        if text.is_empty() {
            return Err(invalid("empty input".to_owned()));
        }
        if text.len() > self.char_size {
            return Err(invalid(format!(
                "longer than {} characters",
                self.char_size
            )));
        }
        let radix = self.alphabet.radix();
        let mut id = 0_u64;
        for (index, byte) in text.bytes().enumerate() {
            let Some(value) = self.alphabet.value(byte) else {
                return Err(invalid(format!("invalid character at index {index}")));
            };
            id = id
                .checked_mul(radix)
                .and_then(|id| id.checked_add(value))
                .ok_or_else(|| invalid("value overflows 64 bits".to_owned()))?;
        }
        if id > self.max_id {
            return Err(invalid(format!(
                "exceeds the largest convertible id {}",
                self.max_id
            )));
        }
        Ok(id)
    }
}

const fn char_size(radix: u64, max_id: u64) -> usize {
    let mut size = 1;
    let mut rest = max_id / radix;
    while rest > 0 {
        rest /= radix;
        size += 1;
    }
    size
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::IdConverter;

    const MAX: u64 = i64::MAX as u64;

    #[test]
    fn preset_widths() {
        assert_eq!(RadixIdConverter::base62(true).char_size(), 11);
        assert_eq!(RadixIdConverter::base36(true).char_size(), 13);
        assert_eq!(RadixIdConverter::crockford32(true).char_size(), 13);
    }

    #[test]
    fn edge_values_round_trip() {
        for converter in [
            RadixIdConverter::base62(false),
            RadixIdConverter::base62(true),
            RadixIdConverter::base36(true),
            RadixIdConverter::crockford32(false),
        ] {
            for id in [0, 1, 61, 62, 1 << 32, MAX - 1, MAX] {
                let text = converter.encode(id).unwrap();
                if converter.pad_start() {
                    assert_eq!(text.len(), converter.char_size());
                }
                assert_eq!(converter.decode(&text).unwrap(), id, "{text}");
            }
        }
    }

    #[test]
    fn zero_and_max() {
        let converter = RadixIdConverter::base62(false);
        assert_eq!(converter.encode(0).unwrap(), "0");
        assert_eq!(converter.encode(MAX).unwrap(), "AzL8n0Y58m7");
        assert_eq!(
            RadixIdConverter::base62(true).encode(0).unwrap(),
            "00000000000"
        );
    }

    #[test]
    fn padded_encodings_sort_like_ids() {
        let converter = RadixIdConverter::base62(true);
        let mut ids = [3, 1_000_000, 62, MAX, 0, 61];
        let mut encoded: Vec<_> = ids.iter().map(|&id| converter.encode(id).unwrap()).collect();
        ids.sort_unstable();
        encoded.sort();
        let decoded: Vec<_> = encoded.iter().map(|s| converter.decode(s).unwrap()).collect();
        assert_eq!(decoded, ids);
    }

    #[test]
    fn crockford_aliases_and_case() {
        let converter = RadixIdConverter::crockford32(false);
        assert_eq!(converter.decode("1O").unwrap(), 32);
        assert_eq!(converter.decode("lo").unwrap(), 32);
        assert_eq!(converter.decode("iZ").unwrap(), converter.decode("1z").unwrap());
        assert!(converter.decode("U").is_err());
    }

    #[test]
    fn base36_accepts_lowercase() {
        let converter = RadixIdConverter::base36(false);
        assert_eq!(converter.decode("z").unwrap(), 35);
        assert_eq!(converter.decode("Z").unwrap(), 35);
    }

    #[test]
    fn rejects_invalid_input() {
        let converter = RadixIdConverter::base62(true);
        assert!(converter.decode("").is_err());
        assert!(converter.decode("abc-").is_err());
        assert!(converter.decode("000000000000").is_err());
        // one above i64::MAX
        assert!(converter.decode("AzL8n0Y58m8").is_err());
        assert!(converter.decode("zzzzzzzzzzz").is_err());
        assert!(converter.encode(MAX + 1).is_err());
    }

    #[test]
    fn custom_alphabet_and_max_id() {
        let binary = Alphabet::new("01").unwrap();
        let converter = RadixIdConverter::with_max_id(binary, true, 0b1111);
        assert_eq!(converter.encode(5).unwrap(), "0101");
        assert_eq!(converter.decode("101").unwrap(), 5);
        assert!(converter.encode(16).is_err());
        assert!(matches!(Alphabet::new("0"), Err(Error::Configuration { .. })));
        assert!(matches!(Alphabet::new("aba"), Err(Error::Configuration { .. })));
    }
}
