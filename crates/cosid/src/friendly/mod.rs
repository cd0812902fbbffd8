//! Friendly ids: the human-readable form `yyyyMMddHHmmssSSS-<machineId>-<sequence>`
//! of a Snowflake id, and the decoder back to the numeric id.

mod parser;
mod state;

pub use parser::*;
pub use state::*;
