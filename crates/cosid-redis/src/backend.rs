use async_trait::async_trait;
use cosid::{ClaimRequest, Error, InstanceId, LeaseBackend, MachineState, Result};
use redis::{Client, Script, aio::ConnectionManager};

use crate::script;

/// Prefix of every key written by [`RedisLeaseBackend`].
pub const DEFAULT_KEY_PREFIX: &str = "cosid";

/// A [`LeaseBackend`] on Redis.
///
/// Each namespace is stored in two hashes, `{prefix}:{namespace}:itc_idx`
/// (instance to machine id) and `{prefix}:{namespace}:mid_idx` (machine id to
/// lease). The namespace is wrapped in a hash tag so both keys share a
/// cluster slot, and every operation runs as one Lua script.
#[derive(Clone)]
pub struct RedisLeaseBackend {
    connection: ConnectionManager,
    key_prefix: String,
    claim: Script,
    release: Script,
    guard: Script,
    lease_of: Script,
}

impl core::fmt::Debug for RedisLeaseBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisLeaseBackend")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisLeaseBackend {
    /// Opens a managed connection to `url`, e.g. `redis://127.0.0.1:6379`.
    ///
    /// # Errors
    ///
    /// [`Error::BackendUnavailable`] if the url is invalid or the server
    /// cannot be reached.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(Error::backend)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(Error::backend)?;
        tracing::debug!(url, "connected to redis");
        Ok(Self::new(connection))
    }

    pub fn new(connection: ConnectionManager) -> Self {
        let load = |body: &str| Script::new(&format!("{}{body}", script::PRELUDE));
        Self {
            connection,
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
            claim: load(script::CLAIM),
            release: load(script::RELEASE),
            guard: load(script::GUARD),
            lease_of: load(script::LEASE_OF),
        }
    }

    #[must_use]
    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Deletes every lease of `namespace`.
    ///
    /// # Errors
    ///
    /// [`Error::BackendUnavailable`] on Redis failures.
    pub async fn remove_namespace(&self, namespace: &str) -> Result<()> {
        let (instances, machines) = namespace_keys(&self.key_prefix, namespace);
        let mut connection = self.connection.clone();
        let _: () = redis::cmd("DEL")
            .arg(&instances)
            .arg(&machines)
            .query_async(&mut connection)
            .await
            .map_err(Error::backend)?;
        Ok(())
    }
}

fn namespace_keys(prefix: &str, namespace: &str) -> (String, String) {
    (
        format!("{prefix}:{{{namespace}}}:itc_idx"),
        format!("{prefix}:{{{namespace}}}:mid_idx"),
    )
}

fn lease_from_reply(reply: &[i64]) -> Result<Option<MachineState>> {
    match *reply {
        [-1, _] => Ok(None),
        [machine_id, last_timestamp] => {
            let machine_id = u64::try_from(machine_id).map_err(Error::backend)?;
            let last_timestamp = u64::try_from(last_timestamp).map_err(Error::backend)?;
            Ok(Some(MachineState::new(machine_id, last_timestamp)))
        }
        _ => Err(Error::backend(format!("unexpected lease reply {reply:?}"))),
    }
}

#[async_trait]
impl LeaseBackend for RedisLeaseBackend {
    async fn claim(&self, request: &ClaimRequest<'_>) -> Result<Option<MachineState>> {
        let (instances, machines) = namespace_keys(&self.key_prefix, request.namespace);
        let mut connection = self.connection.clone();
        let reply: Vec<i64> = self
            .claim
            .key(&instances)
            .key(&machines)
            .arg(request.instance.instance_id())
            .arg(request.machine_id_count)
            .arg(u8::from(request.instance.is_stable()))
            .arg(request.safe_guard_at)
            .arg(request.now)
            .invoke_async(&mut connection)
            .await
            .map_err(Error::backend)?;
        let lease = lease_from_reply(&reply)?;
        tracing::debug!(namespace = request.namespace, instance = %request.instance, ?lease, "claim");
        Ok(lease)
    }

    async fn release(
        &self,
        namespace: &str,
        instance: &InstanceId,
        last_timestamp: u64,
    ) -> Result<bool> {
        let (instances, machines) = namespace_keys(&self.key_prefix, namespace);
        let mut connection = self.connection.clone();
        let released: i64 = self
            .release
            .key(&instances)
            .key(&machines)
            .arg(instance.instance_id())
            .arg(last_timestamp)
            .invoke_async(&mut connection)
            .await
            .map_err(Error::backend)?;
        tracing::debug!(namespace, %instance, released, "release");
        Ok(released == 1)
    }

    async fn guard(
        &self,
        namespace: &str,
        instance: &InstanceId,
        state: MachineState,
    ) -> Result<bool> {
        let (instances, machines) = namespace_keys(&self.key_prefix, namespace);
        let mut connection = self.connection.clone();
        let guarded: i64 = self
            .guard
            .key(&instances)
            .key(&machines)
            .arg(instance.instance_id())
            .arg(state.machine_id)
            .arg(state.last_timestamp)
            .invoke_async(&mut connection)
            .await
            .map_err(Error::backend)?;
        Ok(guarded == 1)
    }

    async fn lease_of(
        &self,
        namespace: &str,
        instance: &InstanceId,
    ) -> Result<Option<MachineState>> {
        let (instances, machines) = namespace_keys(&self.key_prefix, namespace);
        let mut connection = self.connection.clone();
        let reply: Vec<i64> = self
            .lease_of
            .key(&instances)
            .key(&machines)
            .arg(instance.instance_id())
            .invoke_async(&mut connection)
            .await
            .map_err(Error::backend)?;
        lease_from_reply(&reply)
    }
}
