use async_trait::async_trait;

use crate::{
    error::Result,
    machine::{InstanceId, MachineState},
};

/// A claim for a machine id in one namespace.
#[derive(Clone, Copy, Debug)]
pub struct ClaimRequest<'a> {
    pub namespace: &'a str,
    pub instance: &'a InstanceId,
    /// Size of the machine id space, `2^machine_bits`.
    pub machine_id_count: u64,
    /// Non-stable leases last seen before this time (Unix milliseconds) are
    /// reclaimable. Zero disables expiry.
    pub safe_guard_at: u64,
    /// Current time (Unix milliseconds) recorded on the claimed slot.
    pub now: u64,
}

/// The coordination store behind [`LeaseMachineIdDistributor`].
///
/// Every operation is atomic with respect to the namespace: two concurrent
/// claims never receive the same slot, and the "already leased to this
/// instance" check happens in the same step as the claim.
///
/// [`LeaseMachineIdDistributor`]: crate::machine::LeaseMachineIdDistributor
#[async_trait]
pub trait LeaseBackend: Send + Sync {
    /// Returns the lease the instance already holds, or claims the lowest
    /// free (or expired) slot below `machine_id_count`.
    ///
    /// The returned `last_timestamp` is the slot's previous last timestamp:
    /// the caller must not generate ids before its clock passes it. `None`
    /// means every slot is taken.
    ///
    /// # Errors
    ///
    /// [`Error::BackendUnavailable`](crate::Error::BackendUnavailable) on
    /// store failures.
    async fn claim(&self, request: &ClaimRequest<'_>) -> Result<Option<MachineState>>;

    /// Frees the slot held by `instance`, remembering `last_timestamp` for its
    /// next holder. Returns whether a slot was freed.
    ///
    /// # Errors
    ///
    /// Store failures.
    async fn release(
        &self,
        namespace: &str,
        instance: &InstanceId,
        last_timestamp: u64,
    ) -> Result<bool>;

    /// Refreshes the last timestamp of the lease on `state.machine_id`.
    /// Returns `false` if `instance` does not hold that slot.
    ///
    /// # Errors
    ///
    /// Store failures.
    async fn guard(&self, namespace: &str, instance: &InstanceId, state: MachineState)
    -> Result<bool>;

    /// Looks up the lease currently held by `instance`.
    ///
    /// # Errors
    ///
    /// Store failures.
    async fn lease_of(&self, namespace: &str, instance: &InstanceId)
    -> Result<Option<MachineState>>;
}
