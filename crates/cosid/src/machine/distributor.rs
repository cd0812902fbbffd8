use core::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::{
    config::DistributorConfig,
    error::{Error, Result},
    id::TOTAL_BITS,
    machine::{
        ClaimRequest, InMemoryMachineStateStorage, InstanceId, LeaseBackend, MachineState,
        MachineStateStorage,
    },
    time::{ClockBackwardsSynchronizer, SystemClock, TimeSource},
};

/// Hands out machine ids to the instances of a namespace.
#[async_trait]
pub trait MachineIdDistributor: Send + Sync {
    /// Leases a machine id in `[0, 2^machine_bits)` to `instance`.
    ///
    /// Repeated calls for an instance that already holds a lease return that
    /// lease.
    ///
    /// # Errors
    ///
    /// - [`Error::MachineIdOverflow`] if every machine id is leased
    /// - [`Error::BackendUnavailable`] if the backend fails or times out
    /// - [`Error::Configuration`] for an unusable `machine_bits`
    async fn distribute(
        &self,
        namespace: &str,
        machine_bits: u32,
        instance: &InstanceId,
    ) -> Result<MachineState>;

    /// Releases the lease held by `instance`. A no-op if it holds none.
    ///
    /// # Errors
    ///
    /// Backend or storage failures.
    async fn revert(&self, namespace: &str, instance: &InstanceId) -> Result<()>;

    /// Tells the backend that `instance` is still using `state`.
    ///
    /// # Errors
    ///
    /// [`Error::MachineIdLost`] if the lease has been taken over, plus backend
    /// failures.
    async fn guard(&self, namespace: &str, instance: &InstanceId, state: MachineState)
    -> Result<()>;
}

/// Number of machine ids `machine_bits` can address. At least one timestamp
/// bit must remain.
pub(crate) fn machine_id_count(machine_bits: u32) -> Result<u64> {
    if machine_bits >= TOTAL_BITS {
        return Err(Error::configuration(format!(
            "{machine_bits} machine bits leave no room for a timestamp"
        )));
    }
    Ok(1 << machine_bits)
}

/// The leasing protocol on top of a [`LeaseBackend`].
///
/// - stable instances first try the lease recorded in local
///   [`MachineStateStorage`], provided the backend still shows it as theirs
/// - otherwise the backend claims the lowest free slot (or the instance's
///   existing one) in a single atomic step
/// - before returning a reused slot, waits until the local clock has passed
///   the previous owner's last timestamp
///
/// Every backend call is bounded by [`DistributorConfig::timeout`].
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use cosid::{InMemoryLeaseBackend, InstanceId, LeaseMachineIdDistributor, MachineIdDistributor};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> cosid::Result<()> {
/// let distributor = LeaseMachineIdDistributor::new(InMemoryLeaseBackend::new());
/// let instance = InstanceId::new("10.0.0.1", 8080, false);
/// let state = distributor.distribute("order-service", 10, &instance).await?;
/// assert_eq!(state.machine_id, 0);
/// distributor.revert("order-service", &instance).await?;
/// # Ok(())
/// # }
/// ```
pub struct LeaseMachineIdDistributor<B, T = SystemClock> {
    backend: B,
    storage: Arc<dyn MachineStateStorage>,
    synchronizer: ClockBackwardsSynchronizer,
    config: DistributorConfig,
    time: T,
}

impl<B> LeaseMachineIdDistributor<B>
where
    B: LeaseBackend,
{
    /// Uses in-memory state storage, the default synchronizer and config.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            storage: Arc::new(InMemoryMachineStateStorage::new()),
            synchronizer: ClockBackwardsSynchronizer::default(),
            config: DistributorConfig::default(),
            time: SystemClock,
        }
    }
}

impl<B, T> LeaseMachineIdDistributor<B, T>
where
    B: LeaseBackend,
    T: TimeSource + Send + Sync,
{
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn MachineStateStorage>) -> Self {
        self.storage = storage;
        self
    }

    #[must_use]
    pub const fn with_synchronizer(mut self, synchronizer: ClockBackwardsSynchronizer) -> Self {
        self.synchronizer = synchronizer;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: DistributorConfig) -> Self {
        self.config = config;
        self
    }

    /// Swaps the clock, e.g. for a mock in tests.
    pub fn with_time<U>(self, time: U) -> LeaseMachineIdDistributor<B, U> {
        LeaseMachineIdDistributor {
            backend: self.backend,
            storage: self.storage,
            synchronizer: self.synchronizer,
            config: self.config,
            time,
        }
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    pub const fn config(&self) -> &DistributorConfig {
        &self.config
    }

    async fn call<F, R>(&self, operation: &'static str, future: F) -> Result<R>
    where
        F: Future<Output = Result<R>>,
    {
        match tokio::time::timeout(self.config.timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(Error::backend(format!(
                "{operation} timed out after {:?}",
                self.config.timeout
            ))),
        }
    }

    fn safe_guard_at(&self, now: u64) -> u64 {
        if self.config.safe_guard_duration.is_zero() {
            return 0;
        }
        let duration = u64::try_from(self.config.safe_guard_duration.as_millis()).unwrap_or(u64::MAX);
        now.saturating_sub(duration)
    }

    /// The stored lease of a stable instance, if the backend still agrees.
    async fn recover(
        &self,
        namespace: &str,
        instance: &InstanceId,
        machine_id_count: u64,
    ) -> Result<Option<MachineState>> {
        let Some(stored) = self.storage.get(namespace, instance)? else {
            return Ok(None);
        };
        let lease = self
            .call("lease lookup", self.backend.lease_of(namespace, instance))
            .await?;
        match lease {
            Some(lease)
                if lease.machine_id == stored.machine_id && lease.machine_id < machine_id_count =>
            {
                tracing::debug!(machine_id = lease.machine_id, "recovered stored lease");
                Ok(Some(MachineState::new(
                    lease.machine_id,
                    lease.last_timestamp.max(stored.last_timestamp),
                )))
            }
            _ => {
                tracing::warn!(
                    stored_machine_id = stored.machine_id,
                    "stored lease is no longer held, renegotiating"
                );
                self.storage.remove(namespace, instance)?;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl<B, T> MachineIdDistributor for LeaseMachineIdDistributor<B, T>
where
    B: LeaseBackend,
    T: TimeSource + Send + Sync,
{
    #[instrument(level = "debug", skip(self, instance), fields(instance = %instance))]
    async fn distribute(
        &self,
        namespace: &str,
        machine_bits: u32,
        instance: &InstanceId,
    ) -> Result<MachineState> {
        let machine_id_count = machine_id_count(machine_bits)?;

        let recovered = if instance.is_stable() {
            self.recover(namespace, instance, machine_id_count).await?
        } else {
            None
        };

        let state = match recovered {
            Some(state) => state,
            None => {
                let now = self.time.current_millis();
                let request = ClaimRequest {
                    namespace,
                    instance,
                    machine_id_count,
                    safe_guard_at: self.safe_guard_at(now),
                    now,
                };
                self.call("claim", self.backend.claim(&request))
                    .await?
                    .ok_or_else(|| Error::MachineIdOverflow {
                        namespace: namespace.to_owned(),
                        max_machine_ids: machine_id_count,
                    })?
            }
        };

        self.synchronizer
            .sync_async(state.last_timestamp, &self.time)
            .await?;

        if instance.is_stable() {
            self.storage.set(namespace, instance, state)?;
        }
        tracing::info!(
            namespace,
            instance = %instance,
            machine_id = state.machine_id,
            "distributed machine id"
        );
        Ok(state)
    }

    #[instrument(level = "debug", skip(self, instance), fields(instance = %instance))]
    async fn revert(&self, namespace: &str, instance: &InstanceId) -> Result<()> {
        let now = self.time.current_millis();
        let released = self
            .call("release", self.backend.release(namespace, instance, now))
            .await?;
        if instance.is_stable() {
            self.storage.remove(namespace, instance)?;
        }
        tracing::debug!(released, "reverted machine id");
        Ok(())
    }

    #[instrument(level = "trace", skip(self, instance), fields(instance = %instance))]
    async fn guard(
        &self,
        namespace: &str,
        instance: &InstanceId,
        state: MachineState,
    ) -> Result<()> {
        let state = MachineState::new(
            state.machine_id,
            state.last_timestamp.max(self.time.current_millis()),
        );
        let owned = self
            .call("guard", self.backend.guard(namespace, instance, state))
            .await?;
        if !owned {
            return Err(Error::MachineIdLost {
                namespace: namespace.to_owned(),
                instance: instance.instance_id(),
            });
        }
        if instance.is_stable() {
            self.storage.set(namespace, instance, state)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::machine::InMemoryLeaseBackend;

    const MACHINE_BITS: u32 = 1;

    fn instance(port: u16, stable: bool) -> InstanceId {
        InstanceId::new("127.0.0.1", port, stable)
    }

    /// A clock tests can move forward by hand.
    #[derive(Clone, Default)]
    struct ManualTime(Arc<AtomicU64>);

    impl ManualTime {
        fn at(millis: u64) -> Self {
            Self(Arc::new(AtomicU64::new(millis)))
        }

        fn advance(&self, millis: u64) {
            self.0.fetch_add(millis, Ordering::Relaxed);
        }
    }

    impl TimeSource for ManualTime {
        fn current_millis(&self) -> u64 {
            self.0.load(Ordering::Relaxed)
        }
    }

    /// A backend whose calls never complete.
    struct StalledBackend;

    #[async_trait]
    impl LeaseBackend for StalledBackend {
        async fn claim(&self, _: &ClaimRequest<'_>) -> Result<Option<MachineState>> {
            core::future::pending().await
        }

        async fn release(&self, _: &str, _: &InstanceId, _: u64) -> Result<bool> {
            core::future::pending().await
        }

        async fn guard(&self, _: &str, _: &InstanceId, _: MachineState) -> Result<bool> {
            core::future::pending().await
        }

        async fn lease_of(&self, _: &str, _: &InstanceId) -> Result<Option<MachineState>> {
            core::future::pending().await
        }
    }

    async fn run_exhaustion_and_reuse(distributor: &dyn MachineIdDistributor, stable: bool) {
        let ns = "exhaustion";
        let first = instance(80, stable);
        assert_eq!(distributor.distribute(ns, MACHINE_BITS, &first).await.unwrap().machine_id, 0);
        assert_eq!(distributor.distribute(ns, MACHINE_BITS, &first).await.unwrap().machine_id, 0);

        let second = instance(82, stable);
        assert_eq!(distributor.distribute(ns, MACHINE_BITS, &second).await.unwrap().machine_id, 1);

        let third = instance(83, stable);
        assert!(matches!(
            distributor.distribute(ns, MACHINE_BITS, &third).await,
            Err(Error::MachineIdOverflow { max_machine_ids: 2, .. })
        ));

        distributor.revert(ns, &first).await.unwrap();
        let fourth = instance(84, stable);
        assert_eq!(distributor.distribute(ns, MACHINE_BITS, &fourth).await.unwrap().machine_id, 0);
    }

    #[tokio::test]
    async fn distribute_exhaustion_and_reuse() {
        let distributor = LeaseMachineIdDistributor::new(InMemoryLeaseBackend::new());
        run_exhaustion_and_reuse(&distributor, false).await;
    }

    #[tokio::test]
    async fn distribute_stable_exhaustion_and_reuse() {
        let distributor = LeaseMachineIdDistributor::new(InMemoryLeaseBackend::new());
        run_exhaustion_and_reuse(&distributor, true).await;
    }

    #[tokio::test]
    async fn revert_of_non_holder_frees_nothing() {
        let distributor = LeaseMachineIdDistributor::new(InMemoryLeaseBackend::new());
        let ns = "non-holder";
        distributor.distribute(ns, MACHINE_BITS, &instance(80, false)).await.unwrap();
        distributor.distribute(ns, MACHINE_BITS, &instance(81, false)).await.unwrap();

        distributor.revert(ns, &instance(99, false)).await.unwrap();
        distributor.revert("unknown-namespace", &instance(80, false)).await.unwrap();

        assert!(matches!(
            distributor.distribute(ns, MACHINE_BITS, &instance(82, false)).await,
            Err(Error::MachineIdOverflow { .. })
        ));
    }

    #[tokio::test]
    async fn namespaces_are_independent() {
        let distributor = LeaseMachineIdDistributor::new(InMemoryLeaseBackend::new());
        let a = distributor.distribute("a", 0, &instance(80, false)).await.unwrap();
        let b = distributor.distribute("b", 0, &instance(81, false)).await.unwrap();
        assert_eq!((a.machine_id, b.machine_id), (0, 0));
        assert!(distributor.distribute("a", 0, &instance(81, false)).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_instances_get_distinct_ids() {
        let distributor = Arc::new(LeaseMachineIdDistributor::new(InMemoryLeaseBackend::new()));
        let handles: Vec<_> = (0..64_u16)
            .map(|port| {
                let distributor = Arc::clone(&distributor);
                tokio::spawn(async move {
                    distributor
                        .distribute("concurrent", 6, &instance(port, false))
                        .await
                        .unwrap()
                        .machine_id
                })
            })
            .collect();

        let mut ids = Vec::with_capacity(handles.len());
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (0..64).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn expired_non_stable_lease_is_reclaimed() {
        let time = ManualTime::at(1_000_000);
        let distributor = LeaseMachineIdDistributor::new(InMemoryLeaseBackend::new())
            .with_config(DistributorConfig {
                safe_guard_duration: Duration::from_secs(60),
                guard_interval: Duration::from_secs(10),
                ..DistributorConfig::default()
            })
            .with_time(time.clone());
        let ns = "expiry";
        let silent = instance(80, false);
        let pinned = instance(81, true);
        distributor.distribute(ns, MACHINE_BITS, &silent).await.unwrap();
        distributor.distribute(ns, MACHINE_BITS, &pinned).await.unwrap();

        time.advance(30_000);
        assert!(distributor.distribute(ns, MACHINE_BITS, &instance(82, false)).await.is_err());

        time.advance(31_000);
        let newcomer = distributor.distribute(ns, MACHINE_BITS, &instance(82, false)).await.unwrap();
        assert_eq!(newcomer.machine_id, 0);
        assert_eq!(newcomer.last_timestamp, 1_000_000);

        // the stable lease never expires, and the silent one is gone
        assert!(distributor.distribute(ns, MACHINE_BITS, &instance(83, false)).await.is_err());
        assert!(matches!(
            distributor.guard(ns, &silent, MachineState::new(0, 0)).await,
            Err(Error::MachineIdLost { .. })
        ));
    }

    #[tokio::test]
    async fn guard_keeps_lease_alive() {
        let time = ManualTime::at(1_000_000);
        let distributor = LeaseMachineIdDistributor::new(InMemoryLeaseBackend::new())
            .with_config(DistributorConfig {
                safe_guard_duration: Duration::from_secs(60),
                guard_interval: Duration::from_secs(10),
                ..DistributorConfig::default()
            })
            .with_time(time.clone());
        let ns = "guard";
        let owner = instance(80, false);
        let state = distributor.distribute(ns, 0, &owner).await.unwrap();

        for _ in 0..10 {
            time.advance(30_000);
            distributor.guard(ns, &owner, state).await.unwrap();
        }
        assert!(distributor.distribute(ns, 0, &instance(81, false)).await.is_err());
        let lease = distributor.backend().lease_of(ns, &owner).await.unwrap();
        assert_eq!(lease, Some(MachineState::new(0, 1_300_000)));
    }

    #[tokio::test]
    async fn stable_instance_recovers_stored_lease() {
        let storage: Arc<dyn MachineStateStorage> = Arc::new(InMemoryMachineStateStorage::new());
        let distributor = LeaseMachineIdDistributor::new(InMemoryLeaseBackend::new())
            .with_storage(Arc::clone(&storage));
        let ns = "stable";
        let first = instance(80, true);
        let second = instance(81, true);

        distributor.distribute(ns, 2, &first).await.unwrap();
        let state = distributor.distribute(ns, 2, &second).await.unwrap();
        assert_eq!(state.machine_id, 1);
        assert_eq!(storage.get(ns, &second).unwrap().map(|s| s.machine_id), Some(1));

        // restart: the stored lease is reused as long as the backend agrees
        let recovered = distributor.distribute(ns, 2, &second).await.unwrap();
        assert_eq!(recovered.machine_id, 1);

        // a stale local record is discarded and the lease renegotiated
        storage.set(ns, &first, MachineState::new(3, 0)).unwrap();
        let renegotiated = distributor.distribute(ns, 2, &first).await.unwrap();
        assert_eq!(renegotiated.machine_id, 0);
        assert_eq!(storage.get(ns, &first).unwrap().map(|s| s.machine_id), Some(0));

        distributor.revert(ns, &second).await.unwrap();
        assert!(!storage.exists(ns, &second).unwrap());
    }

    #[tokio::test]
    async fn reused_slot_waits_for_previous_owner() {
        let backend = InMemoryLeaseBackend::new();
        let ns = "handover";

        // the previous owner released the slot 10ms "in the future"
        let now = SystemClock.current_millis();
        let previous = instance(80, false);
        let request = ClaimRequest {
            namespace: ns,
            instance: &previous,
            machine_id_count: 1,
            safe_guard_at: 0,
            now,
        };
        backend.claim(&request).await.unwrap();
        backend.release(ns, &previous, now + 10).await.unwrap();

        let distributor = LeaseMachineIdDistributor::new(backend);
        let state = distributor.distribute(ns, 0, &instance(81, false)).await.unwrap();
        assert_eq!(state.last_timestamp, now + 10);
        assert!(SystemClock.current_millis() >= now + 10);
    }

    #[tokio::test]
    async fn stalled_backend_times_out() {
        let distributor = LeaseMachineIdDistributor::new(StalledBackend).with_config(
            DistributorConfig {
                timeout: Duration::from_millis(20),
                ..DistributorConfig::default()
            },
        );
        let err = distributor
            .distribute("stalled", 4, &instance(80, false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable { .. }));
        assert!(matches!(
            distributor.revert("stalled", &instance(80, false)).await,
            Err(Error::BackendUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_unusable_machine_bits() {
        let distributor = LeaseMachineIdDistributor::new(InMemoryLeaseBackend::new());
        assert!(matches!(
            distributor.distribute("bits", 63, &instance(80, false)).await,
            Err(Error::Configuration { .. })
        ));
    }
}
