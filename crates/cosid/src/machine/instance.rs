use core::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a process competing for a machine id.
///
/// Leases are keyed by `host:port`. A stable instance keeps the same identity
/// across restarts (e.g. a pod of a StatefulSet) and persists its lease
/// locally so it can reclaim the same machine id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId {
    host: String,
    port: u16,
    stable: bool,
}

impl InstanceId {
    pub fn new(host: impl Into<String>, port: u16, stable: bool) -> Self {
        Self {
            host: host.into(),
            port,
            stable,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub const fn is_stable(&self) -> bool {
        self.stable
    }

    /// The lease key, `host:port`.
    pub fn instance_id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_key_ignores_stability() {
        let stable = InstanceId::new("10.0.0.1", 8080, true);
        let transient = InstanceId::new("10.0.0.1", 8080, false);
        assert_eq!(stable.instance_id(), "10.0.0.1:8080");
        assert_eq!(stable.instance_id(), transient.instance_id());
        assert_ne!(stable, transient);
        assert_eq!(stable.to_string(), "10.0.0.1:8080");
    }
}
