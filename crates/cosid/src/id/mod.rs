mod allocation;
mod layout;

pub use allocation::*;
pub use layout::*;
