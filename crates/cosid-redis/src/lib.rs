//! Redis coordination backend for [`cosid`] machine-id distribution.
//!
//! [`RedisLeaseBackend`] implements [`cosid::LeaseBackend`], so it plugs into
//! [`cosid::LeaseMachineIdDistributor`] like any other backend:
//!
//! ```no_run
//! use cosid::{InstanceId, LeaseMachineIdDistributor, MachineIdDistributor};
//! use cosid_redis::RedisLeaseBackend;
//!
//! # async fn run() -> cosid::Result<()> {
//! let backend = RedisLeaseBackend::connect("redis://127.0.0.1:6379").await?;
//! let distributor = LeaseMachineIdDistributor::new(backend);
//! let instance = InstanceId::new("10.0.0.7", 8080, false);
//!
//! let state = distributor.distribute("order", 10, &instance).await?;
//! println!("leased machine id {}", state.machine_id);
//! distributor.revert("order", &instance).await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod script;

pub use crate::backend::*;
