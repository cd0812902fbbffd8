//! Machine-id leasing: assigns every process of a namespace a distinct
//! machine id through a shared coordination backend.

mod backend;
mod distributor;
mod guarder;
mod instance;
mod manual;
mod memory;
mod state;
mod stateful_set;
mod storage;

pub use backend::*;
pub use distributor::*;
pub use guarder::*;
pub use instance::*;
pub use manual::*;
pub use memory::*;
pub use state::*;
pub use stateful_set::*;
pub use storage::*;
