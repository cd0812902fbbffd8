use serde::{Deserialize, Serialize};

/// A leased machine id and the last time (Unix milliseconds) its owner was
/// known to be generating ids with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineState {
    pub machine_id: u64,
    pub last_timestamp: u64,
}

impl MachineState {
    pub const fn new(machine_id: u64, last_timestamp: u64) -> Self {
        Self {
            machine_id,
            last_timestamp,
        }
    }
}
