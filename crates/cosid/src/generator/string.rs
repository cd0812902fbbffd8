use crate::{
    converter::IdConverter,
    error::Result,
    generator::{IdGenerator, StringIdGenerator},
};

/// Renders the ids of any [`IdGenerator`] through an [`IdConverter`].
///
/// # Example
/// ```
/// use cosid::{
///     IdConverter, LockSnowflakeGenerator, RadixIdConverter, SnowflakeLayout,
///     StringIdGenerator, StringSnowflakeGenerator, SystemClock,
/// };
///
/// let inner = LockSnowflakeGenerator::new(SnowflakeLayout::MILLISECOND, 1, SystemClock)?;
/// let generator = StringSnowflakeGenerator::new(inner, RadixIdConverter::base62(true));
/// let text = generator.generate_as_string()?;
/// assert_eq!(text.len(), 11);
/// assert!(generator.converter().decode(&text).is_ok());
/// # Ok::<(), cosid::Error>(())
/// ```
pub struct StringSnowflakeGenerator<G, C> {
    inner: G,
    converter: C,
}

impl<G, C> StringSnowflakeGenerator<G, C>
where
    G: IdGenerator,
    C: IdConverter,
{
    pub const fn new(inner: G, converter: C) -> Self {
        Self { inner, converter }
    }

    pub const fn inner(&self) -> &G {
        &self.inner
    }

    pub const fn converter(&self) -> &C {
        &self.converter
    }
}

impl<G, C> IdGenerator for StringSnowflakeGenerator<G, C>
where
    G: IdGenerator,
    C: IdConverter,
{
    fn generate(&self) -> Result<u64> {
        self.inner.generate()
    }
}

impl<G, C> StringIdGenerator for StringSnowflakeGenerator<G, C>
where
    G: IdGenerator,
    C: IdConverter,
{
    fn generate_as_string(&self) -> Result<String> {
        self.converter.encode(self.inner.generate()?)
    }
}
