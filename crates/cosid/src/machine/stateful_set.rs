use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    machine::{InstanceId, MachineIdDistributor, MachineState, distributor::machine_id_count},
};

/// Environment variable holding the pod's host name.
pub const HOSTNAME_ENV: &str = "HOSTNAME";

/// Derives the machine id from the ordinal of a Kubernetes StatefulSet pod,
/// the `N` of a `name-N` host name.
///
/// Pods of a StatefulSet have unique, stable ordinals, so no backend is
/// involved. Without an explicit host name the instance's host is used.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatefulSetMachineIdDistributor {
    host_name: Option<String>,
}

impl StatefulSetMachineIdDistributor {
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: Some(host_name.into()),
        }
    }

    /// Reads the host name from [`HOSTNAME_ENV`].
    pub fn from_env() -> Self {
        Self {
            host_name: std::env::var(HOSTNAME_ENV).ok(),
        }
    }

    /// Parses the ordinal suffix of `host_name`.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if there is no numeric `-N` suffix.
    pub fn ordinal(host_name: &str) -> Result<u64> {
        host_name
            .rsplit_once('-')
            .and_then(|(_, ordinal)| ordinal.parse().ok())
            .ok_or_else(|| {
                Error::configuration(format!(
                    "host name `{host_name}` has no StatefulSet ordinal suffix"
                ))
            })
    }
}

#[async_trait]
impl MachineIdDistributor for StatefulSetMachineIdDistributor {
    async fn distribute(
        &self,
        namespace: &str,
        machine_bits: u32,
        instance: &InstanceId,
    ) -> Result<MachineState> {
        let host_name = self.host_name.as_deref().unwrap_or(instance.host());
        let machine_id = Self::ordinal(host_name)?;
        let max_machine_ids = machine_id_count(machine_bits)?;
        if machine_id >= max_machine_ids {
            return Err(Error::MachineIdOverflow {
                namespace: namespace.to_owned(),
                max_machine_ids,
            });
        }
        tracing::info!(namespace, host_name, machine_id, "using StatefulSet ordinal as machine id");
        Ok(MachineState::new(machine_id, 0))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ordinal_suffix() {
        assert_eq!(StatefulSetMachineIdDistributor::ordinal("cosid-web-12").unwrap(), 12);
        assert!(StatefulSetMachineIdDistributor::ordinal("cosid").is_err());
        assert!(StatefulSetMachineIdDistributor::ordinal("cosid-web-x").is_err());
    }

    #[tokio::test]
    async fn ordinal_becomes_machine_id() {
        let instance = InstanceId::new("10.0.0.7", 8080, true);
        let distributor = StatefulSetMachineIdDistributor::new("order-3");
        let state = distributor.distribute("ns", 2, &instance).await.unwrap();
        assert_eq!(state.machine_id, 3);

        let too_small = distributor.distribute("ns", 1, &instance).await;
        assert!(matches!(too_small, Err(Error::MachineIdOverflow { max_machine_ids: 2, .. })));
    }

    #[tokio::test]
    async fn falls_back_to_instance_host() {
        let distributor = StatefulSetMachineIdDistributor::default();
        let instance = InstanceId::new("order-1", 8080, true);
        assert_eq!(distributor.distribute("ns", 4, &instance).await.unwrap().machine_id, 1);
    }
}
