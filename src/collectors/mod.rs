pub mod processes;

use serde::{Deserialize, Serialize};
use sysinfo::ProcessStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Running,
    Sleeping,
    Zombie,
    Stopped,
    Unknown,
}

impl From<ProcessStatus> for ProcessState {
    fn from(status: ProcessStatus) -> Self {
        match status {
            ProcessStatus::Run => Self::Running,
            ProcessStatus::Sleep
            | ProcessStatus::Idle
            | ProcessStatus::Parked
            | ProcessStatus::LockBlocked
            | ProcessStatus::UninterruptibleDiskSleep
            | ProcessStatus::Waking => Self::Sleeping,
            ProcessStatus::Zombie | ProcessStatus::Dead => Self::Zombie,
            ProcessStatus::Stop | ProcessStatus::Tracing => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}

// `user` is only present on non-Windows targets, matching the server's wire
// format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub process_name: String,
    pub status: ProcessState,
    pub pid: u32,
    #[serde(rename = "memoryMB")]
    pub memory_mb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}
