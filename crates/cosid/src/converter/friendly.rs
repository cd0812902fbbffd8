use crate::{
    converter::IdConverter,
    error::Result,
    friendly::SnowflakeIdStateParser,
};

/// Uses friendly ids as the string form of Snowflake ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnowflakeFriendlyIdConverter {
    parser: SnowflakeIdStateParser,
}

impl SnowflakeFriendlyIdConverter {
    pub const fn new(parser: SnowflakeIdStateParser) -> Self {
        Self { parser }
    }

    pub const fn parser(&self) -> &SnowflakeIdStateParser {
        &self.parser
    }
}

impl IdConverter for SnowflakeFriendlyIdConverter {
    fn encode(&self, id: u64) -> Result<String> {
        Ok(self.parser.parse(id)?.friendly_id)
    }

    fn decode(&self, text: &str) -> Result<u64> {
        Ok(self.parser.parse_friendly_id(text)?.id)
    }
}
