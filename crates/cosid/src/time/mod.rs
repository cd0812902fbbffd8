mod interface;
mod synchronizer;
mod system;

pub use interface::*;
pub use synchronizer::*;
pub use system::*;
