use core::time::Duration;
use std::sync::Arc;

use portable_atomic::{AtomicBool, Ordering};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    error::Error,
    machine::{InstanceId, MachineIdDistributor, MachineState},
};

/// Background heartbeat that keeps a lease from expiring.
///
/// Calls [`MachineIdDistributor::guard`] every `interval` until stopped. If the
/// lease turns out to be lost, the guarder records it (see
/// [`Self::is_lost`]) and exits: ids generated past that point may collide
/// with the new owner's.
///
/// Dropping the guarder cancels the task.
#[derive(Debug)]
pub struct MachineIdGuarder {
    shutdown_token: CancellationToken,
    lost: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MachineIdGuarder {
    /// Spawns the heartbeat on the current tokio runtime.
    pub fn spawn(
        distributor: Arc<dyn MachineIdDistributor>,
        namespace: impl Into<String>,
        instance: InstanceId,
        state: MachineState,
        interval: Duration,
    ) -> Self {
        let namespace = namespace.into();
        let shutdown_token = CancellationToken::new();
        let lost = Arc::new(AtomicBool::new(false));

        let token = shutdown_token.clone();
        let lost_flag = Arc::clone(&lost);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately; the lease was just taken
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match distributor.guard(&namespace, &instance, state).await {
                    Ok(()) => tracing::trace!(%namespace, %instance, "guarded machine id"),
                    Err(e @ Error::MachineIdLost { .. }) => {
                        tracing::error!(%namespace, %instance, error = %e, "machine id lost, stopping guard");
                        lost_flag.store(true, Ordering::Release);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(%namespace, %instance, error = %e, "failed to guard machine id");
                    }
                }
            }
        });

        Self {
            shutdown_token,
            lost,
            handle: Some(handle),
        }
    }

    /// Whether the backend reported the lease as taken over.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the heartbeat and waits for the task to exit.
    pub async fn stop(mut self) {
        self.shutdown_token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "guard task ended abnormally");
            }
        }
    }
}

impl Drop for MachineIdGuarder {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{InMemoryLeaseBackend, LeaseBackend, LeaseMachineIdDistributor};

    #[tokio::test]
    async fn refreshes_lease_until_stopped() {
        let distributor = Arc::new(LeaseMachineIdDistributor::new(InMemoryLeaseBackend::new()));
        let instance = InstanceId::new("127.0.0.1", 80, false);
        let state = distributor.distribute("guarder", 2, &instance).await.unwrap();
        let before = distributor
            .backend()
            .lease_of("guarder", &instance)
            .await
            .unwrap()
            .unwrap();

        let guarder = MachineIdGuarder::spawn(
            distributor.clone(),
            "guarder",
            instance.clone(),
            state,
            Duration::from_millis(10),
        );
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(guarder.is_running());
        assert!(!guarder.is_lost());
        guarder.stop().await;

        let after = distributor
            .backend()
            .lease_of("guarder", &instance)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.machine_id, before.machine_id);
        assert!(after.last_timestamp > before.last_timestamp);
    }

    #[tokio::test]
    async fn stops_when_lease_is_lost() {
        let distributor = Arc::new(LeaseMachineIdDistributor::new(InMemoryLeaseBackend::new()));
        let instance = InstanceId::new("127.0.0.1", 80, false);
        let state = distributor.distribute("lost", 2, &instance).await.unwrap();
        distributor.revert("lost", &instance).await.unwrap();

        let guarder = MachineIdGuarder::spawn(
            distributor,
            "lost",
            instance,
            state,
            Duration::from_millis(5),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(guarder.is_lost());
        assert!(!guarder.is_running());
    }
}
