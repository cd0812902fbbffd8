use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    error::Result,
    machine::{ClaimRequest, InstanceId, LeaseBackend, MachineState},
};

#[derive(Debug)]
struct Slot {
    owner: Option<String>,
    stable: bool,
    last_timestamp: u64,
}

#[derive(Debug, Default)]
struct NamespaceLeases {
    slots: BTreeMap<u64, Slot>,
    owners: HashMap<String, u64>,
}

impl NamespaceLeases {
    fn is_claimable(&self, machine_id: u64, safe_guard_at: u64) -> bool {
        match self.slots.get(&machine_id) {
            None => true,
            Some(Slot { owner: None, .. }) => true,
            Some(slot) => !slot.stable && slot.last_timestamp < safe_guard_at,
        }
    }
}

/// A process-local [`LeaseBackend`]: one mutex over every namespace.
///
/// Only instances sharing the same backend value coordinate with each
/// other, which makes it the reference backend for tests and single-process
/// deployments.
#[derive(Debug, Default)]
pub struct InMemoryLeaseBackend {
    namespaces: Mutex<HashMap<String, NamespaceLeases>>,
}

impl InMemoryLeaseBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseBackend for InMemoryLeaseBackend {
    async fn claim(&self, request: &ClaimRequest<'_>) -> Result<Option<MachineState>> {
        let key = request.instance.instance_id();
        let mut namespaces = self.namespaces.lock();
        let leases = namespaces.entry(request.namespace.to_owned()).or_default();

        if let Some(&machine_id) = leases.owners.get(&key) {
            if let Some(slot) = leases.slots.get(&machine_id) {
                if machine_id < request.machine_id_count {
                    return Ok(Some(MachineState::new(machine_id, slot.last_timestamp)));
                }
            }
        }

        let Some(machine_id) = (0..request.machine_id_count)
            .find(|&machine_id| leases.is_claimable(machine_id, request.safe_guard_at))
        else {
            return Ok(None);
        };

        let previous = leases.slots.remove(&machine_id);
        let previous_timestamp = previous.as_ref().map_or(0, |slot| slot.last_timestamp);
        if let Some(expired) = previous.and_then(|slot| slot.owner) {
            tracing::debug!(machine_id, owner = %expired, "reclaiming expired lease");
            leases.owners.remove(&expired);
        }
        // a lease outside a smaller id space is given up
        if let Some(stale) = leases.owners.insert(key.clone(), machine_id) {
            if let Some(slot) = leases.slots.get_mut(&stale) {
                slot.owner = None;
            }
        }
        leases.slots.insert(
            machine_id,
            Slot {
                owner: Some(key),
                stable: request.instance.is_stable(),
                last_timestamp: previous_timestamp.max(request.now),
            },
        );
        Ok(Some(MachineState::new(machine_id, previous_timestamp)))
    }

    async fn release(
        &self,
        namespace: &str,
        instance: &InstanceId,
        last_timestamp: u64,
    ) -> Result<bool> {
        let mut namespaces = self.namespaces.lock();
        let Some(leases) = namespaces.get_mut(namespace) else {
            return Ok(false);
        };
        let Some(machine_id) = leases.owners.remove(&instance.instance_id()) else {
            return Ok(false);
        };
        if let Some(slot) = leases.slots.get_mut(&machine_id) {
            slot.owner = None;
            slot.last_timestamp = slot.last_timestamp.max(last_timestamp);
        }
        Ok(true)
    }

    async fn guard(
        &self,
        namespace: &str,
        instance: &InstanceId,
        state: MachineState,
    ) -> Result<bool> {
        let key = instance.instance_id();
        let mut namespaces = self.namespaces.lock();
        let slot = namespaces
            .get_mut(namespace)
            .and_then(|leases| leases.slots.get_mut(&state.machine_id))
            .filter(|slot| slot.owner.as_deref() == Some(key.as_str()));
        let Some(slot) = slot else {
            return Ok(false);
        };
        slot.last_timestamp = slot.last_timestamp.max(state.last_timestamp);
        Ok(true)
    }

    async fn lease_of(
        &self,
        namespace: &str,
        instance: &InstanceId,
    ) -> Result<Option<MachineState>> {
        let namespaces = self.namespaces.lock();
        Ok(namespaces.get(namespace).and_then(|leases| {
            let machine_id = *leases.owners.get(&instance.instance_id())?;
            let slot = leases.slots.get(&machine_id)?;
            Some(MachineState::new(machine_id, slot.last_timestamp))
        }))
    }
}
