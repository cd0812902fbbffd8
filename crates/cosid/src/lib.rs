//! Distributed Snowflake ids.
//!
//! - [`LockSnowflakeGenerator`] / [`AtomicSnowflakeGenerator`] pack a
//!   timestamp, a machine id and a sequence according to a [`SnowflakeLayout`]
//! - [`ClockSyncSnowflakeGenerator`] waits out small clock regressions
//! - [`SnowflakeIdStateParser`] decomposes ids into friendly ids and back
//! - [`LeaseMachineIdDistributor`] leases the machine id through a
//!   [`LeaseBackend`] shared by the fleet
//!
//! ```
//! use cosid::{
//!     FriendlyIdGenerator, IdGenerator, InMemoryLeaseBackend, InstanceId,
//!     LeaseMachineIdDistributor, MachineIdDistributor, SnowflakeConfig,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> cosid::Result<()> {
//! let config = SnowflakeConfig::default();
//! let distributor = LeaseMachineIdDistributor::new(InMemoryLeaseBackend::new());
//! let instance = InstanceId::new("10.0.0.1", 8080, false);
//!
//! let machine_bits = config.layout()?.allocation().machine_bits();
//! let state = distributor.distribute("order-service", machine_bits, &instance).await?;
//! let generator = config.build(state.machine_id)?;
//!
//! let id = generator.generate()?;
//! let friendly = generator.friendly_id(id)?;
//! assert_eq!(generator.of_friendly_id(&friendly.friendly_id)?.id, id);
//!
//! distributor.revert("order-service", &instance).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod converter;
mod error;
mod friendly;
mod generator;
mod id;
mod machine;
mod time;

pub use crate::config::*;
pub use crate::converter::*;
pub use crate::error::*;
pub use crate::friendly::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::machine::*;
pub use crate::time::*;
