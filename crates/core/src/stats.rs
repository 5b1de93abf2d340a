use serde::{Deserialize, Serialize};

/// Server-side task counts from the statistics endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatistics {
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub running: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
}

impl TaskStatistics {
    pub fn total(&self) -> u64 {
        self.pending + self.running + self.completed + self.failed
    }
}

/// Per-employee statistics block returned by the employee and admin
/// endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeStats {
    #[serde(default)]
    pub total_assigned: u64,
    #[serde(default)]
    pub total_completed: u64,
    #[serde(default)]
    pub total_failed: u64,
    #[serde(default)]
    pub is_working: bool,
    #[serde(default)]
    pub average_time_minutes: f64,
}
