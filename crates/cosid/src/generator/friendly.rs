use crate::{
    error::Result,
    friendly::SnowflakeIdStateParser,
    generator::{FriendlyIdGenerator, IdGenerator, SnowflakeGenerator, StringIdGenerator},
};

/// A Snowflake generator whose string form is the friendly id
/// `yyyyMMddHHmmssSSS-<machineId>-<sequence>`.
pub struct FriendlySnowflakeGenerator<G> {
    inner: G,
    parser: SnowflakeIdStateParser,
}

impl<G> FriendlySnowflakeGenerator<G>
where
    G: SnowflakeGenerator,
{
    /// Uses a UTC, zero-padded parser for the inner generator's layout.
    pub fn new(inner: G) -> Self {
        let parser = SnowflakeIdStateParser::new(*inner.layout());
        Self { inner, parser }
    }

    /// Uses a custom parser, e.g. with another time zone.
    pub const fn with_parser(inner: G, parser: SnowflakeIdStateParser) -> Self {
        Self { inner, parser }
    }

    pub const fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G> IdGenerator for FriendlySnowflakeGenerator<G>
where
    G: SnowflakeGenerator,
{
    fn generate(&self) -> Result<u64> {
        self.inner.generate()
    }
}

impl<G> StringIdGenerator for FriendlySnowflakeGenerator<G>
where
    G: SnowflakeGenerator,
{
    fn generate_as_string(&self) -> Result<String> {
        Ok(self.generate_as_state()?.friendly_id)
    }
}

impl<G> FriendlyIdGenerator for FriendlySnowflakeGenerator<G>
where
    G: SnowflakeGenerator,
{
    fn parser(&self) -> &SnowflakeIdStateParser {
        &self.parser
    }
}
