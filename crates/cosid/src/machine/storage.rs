use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;

use crate::{
    error::Result,
    machine::{InstanceId, MachineState},
};

/// Default directory of [`LocalMachineStateStorage`].
pub const DEFAULT_STATE_DIR: &str = "./cosid-machine-state";

/// Local record of the lease a stable instance held, so that it can claim
/// the same machine id after a restart.
pub trait MachineStateStorage: Send + Sync {
    /// # Errors
    ///
    /// I/O or format errors of the underlying store.
    fn get(&self, namespace: &str, instance: &InstanceId) -> Result<Option<MachineState>>;

    /// # Errors
    ///
    /// I/O or format errors of the underlying store.
    fn set(&self, namespace: &str, instance: &InstanceId, state: MachineState) -> Result<()>;

    /// Removing a missing entry is not an error.
    ///
    /// # Errors
    ///
    /// I/O errors of the underlying store.
    fn remove(&self, namespace: &str, instance: &InstanceId) -> Result<()>;

    /// # Errors
    ///
    /// Same as [`Self::get`].
    fn exists(&self, namespace: &str, instance: &InstanceId) -> Result<bool> {
        Ok(self.get(namespace, instance)?.is_some())
    }
}

/// Keeps states in process memory. Nothing survives a restart, so this only
/// suits tests and instances that never restart in place.
#[derive(Debug, Default)]
pub struct InMemoryMachineStateStorage {
    states: Mutex<HashMap<(String, String), MachineState>>,
}

impl InMemoryMachineStateStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(namespace: &str, instance: &InstanceId) -> (String, String) {
        (namespace.to_owned(), instance.instance_id())
    }
}

impl MachineStateStorage for InMemoryMachineStateStorage {
    fn get(&self, namespace: &str, instance: &InstanceId) -> Result<Option<MachineState>> {
        Ok(self
            .states
            .lock()
            .get(&Self::key(namespace, instance))
            .copied())
    }

    fn set(&self, namespace: &str, instance: &InstanceId, state: MachineState) -> Result<()> {
        self.states
            .lock()
            .insert(Self::key(namespace, instance), state);
        Ok(())
    }

    fn remove(&self, namespace: &str, instance: &InstanceId) -> Result<()> {
        self.states.lock().remove(&Self::key(namespace, instance));
        Ok(())
    }
}

/// Stores one JSON file per (namespace, instance) under a directory.
///
/// Files are written to a temporary name and renamed into place, so a crash
/// mid-write leaves either the old or the new state.
#[derive(Clone, Debug)]
pub struct LocalMachineStateStorage {
    dir: PathBuf,
}

impl Default for LocalMachineStateStorage {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_DIR)
    }
}

impl LocalMachineStateStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, namespace: &str, instance: &InstanceId) -> PathBuf {
        let name = format!(
            "{}__{}__{}.json",
            escape(namespace),
            escape(instance.host()),
            instance.port()
        );
        self.dir.join(name)
    }
}

impl MachineStateStorage for LocalMachineStateStorage {
    fn get(&self, namespace: &str, instance: &InstanceId) -> Result<Option<MachineState>> {
        match fs::read_to_string(self.path(namespace, instance)) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, namespace: &str, instance: &InstanceId, state: MachineState) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(namespace, instance);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&state)?)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(path = %path.display(), ?state, "stored machine state");
        Ok(())
    }

    fn remove(&self, namespace: &str, instance: &InstanceId) -> Result<()> {
        match fs::remove_file(self.path(namespace, instance)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Percent-escapes every byte outside `[A-Za-z0-9.-]`, `_` included, so the
/// `__` separator never occurs inside a part.
fn escape(part: &str) -> String {
    use core::fmt::Write;

    let mut escaped = String::with_capacity(part.len());
    for b in part.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.') {
            escaped.push(char::from(b));
        } else {
            let _ = write!(escaped, "%{b:02X}");
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("cosid-state-{:016x}", rand::random::<u64>()))
    }

    fn run_storage_round_trip(storage: &dyn MachineStateStorage) {
        let instance = InstanceId::new("127.0.0.1", 80, true);
        let other = InstanceId::new("127.0.0.1", 81, true);

        assert_eq!(storage.get("ns", &instance).unwrap(), None);
        assert!(!storage.exists("ns", &instance).unwrap());

        let state = MachineState::new(3, 1_700_000_000_000);
        storage.set("ns", &instance, state).unwrap();
        assert_eq!(storage.get("ns", &instance).unwrap(), Some(state));
        assert!(storage.exists("ns", &instance).unwrap());
        assert!(!storage.exists("ns", &other).unwrap());
        assert!(!storage.exists("other-ns", &instance).unwrap());

        let updated = MachineState::new(3, 1_700_000_000_500);
        storage.set("ns", &instance, updated).unwrap();
        assert_eq!(storage.get("ns", &instance).unwrap(), Some(updated));

        storage.remove("ns", &instance).unwrap();
        assert_eq!(storage.get("ns", &instance).unwrap(), None);
        storage.remove("ns", &instance).unwrap();
    }

    #[test]
    fn in_memory_round_trip() {
        run_storage_round_trip(&InMemoryMachineStateStorage::new());
    }

    #[test]
    fn local_round_trip() {
        let dir = temp_dir();
        run_storage_round_trip(&LocalMachineStateStorage::new(&dir));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn local_files_survive_new_handles() {
        let dir = temp_dir();
        let instance = InstanceId::new("pod-0.cosid", 8080, true);
        let state = MachineState::new(0, 42);

        LocalMachineStateStorage::new(&dir)
            .set("order/service", &instance, state)
            .unwrap();
        let reopened = LocalMachineStateStorage::new(&dir);
        assert_eq!(reopened.get("order/service", &instance).unwrap(), Some(state));
        assert!(
            reopened
                .dir()
                .join("order%2Fservice__pod-0.cosid__8080.json")
                .exists()
        );
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn similar_keys_use_distinct_files() {
        let dir = temp_dir();
        let storage = LocalMachineStateStorage::new(&dir);
        let instance = InstanceId::new("h", 1, true);
        assert_ne!(storage.path("a/b", &instance), storage.path("a_b", &instance));
        assert_ne!(
            storage.path("a__b", &InstanceId::new("c", 1, true)),
            storage.path("a", &InstanceId::new("b__c", 1, true))
        );

        storage.set("a/b", &instance, MachineState::new(1, 10)).unwrap();
        storage.set("a_b", &instance, MachineState::new(2, 20)).unwrap();
        assert_eq!(storage.get("a/b", &instance).unwrap(), Some(MachineState::new(1, 10)));
        assert_eq!(storage.get("a_b", &instance).unwrap(), Some(MachineState::new(2, 20)));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn corrupt_file_is_a_format_error() {
        let dir = temp_dir();
        let storage = LocalMachineStateStorage::new(&dir);
        let instance = InstanceId::new("h", 1, true);
        fs::create_dir_all(&dir).unwrap();
        fs::write(storage.path("ns", &instance), b"not json").unwrap();
        assert!(matches!(
            storage.get("ns", &instance),
            Err(crate::Error::StorageFormat(_))
        ));
        fs::remove_dir_all(dir).unwrap();
    }
}
