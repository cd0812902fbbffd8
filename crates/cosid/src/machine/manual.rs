use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    machine::{InstanceId, MachineIdDistributor, MachineState, distributor::machine_id_count},
};

/// Always hands out the same, operator-assigned machine id.
///
/// There is no coordination: uniqueness is the operator's responsibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManualMachineIdDistributor {
    machine_id: u64,
}

impl ManualMachineIdDistributor {
    pub const fn new(machine_id: u64) -> Self {
        Self { machine_id }
    }

    pub const fn machine_id(&self) -> u64 {
        self.machine_id
    }
}

#[async_trait]
impl MachineIdDistributor for ManualMachineIdDistributor {
    async fn distribute(
        &self,
        namespace: &str,
        machine_bits: u32,
        instance: &InstanceId,
    ) -> Result<MachineState> {
        if self.machine_id >= machine_id_count(machine_bits)? {
            return Err(Error::configuration(format!(
                "manual machine id {} does not fit in {machine_bits} bits",
                self.machine_id
            )));
        }
        tracing::info!(namespace, instance = %instance, machine_id = self.machine_id, "using manual machine id");
        Ok(MachineState::new(self.machine_id, 0))
    }

    async fn revert(&self, _namespace: &str, _instance: &InstanceId) -> Result<()> {
        Ok(())
    }

    async fn guard(
        &self,
        _namespace: &str,
        _instance: &InstanceId,
        _state: MachineState,
    ) -> Result<()> {
        Ok(())
    }
}
