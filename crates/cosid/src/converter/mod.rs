mod friendly;
mod radix;
mod to_string;

pub use friendly::*;
pub use radix::*;
pub use to_string::*;

use crate::error::Result;

/// Bidirectional conversion between numeric ids and their string form.
///
/// `decode(encode(id)) == id` holds for every id the converter accepts.
pub trait IdConverter {
    /// # Errors
    ///
    /// [`Error::InvalidId`](crate::Error::InvalidId) if `id` is outside the
    /// converter's range.
    fn encode(&self, id: u64) -> Result<String>;

    /// # Errors
    ///
    /// [`Error::InvalidId`](crate::Error::InvalidId) for input the converter
    /// could not have produced.
    fn decode(&self, text: &str) -> Result<u64>;
}

impl<C: IdConverter + ?Sized> IdConverter for &C {
    fn encode(&self, id: u64) -> Result<String> {
        (**self).encode(id)
    }

    fn decode(&self, text: &str) -> Result<u64> {
        (**self).decode(text)
    }
}

impl<C: IdConverter + ?Sized> IdConverter for Box<C> {
    fn encode(&self, id: u64) -> Result<String> {
        (**self).encode(id)
    }

    fn decode(&self, text: &str) -> Result<u64> {
        (**self).decode(text)
    }
}
