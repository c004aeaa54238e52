//! Serializable point-in-time view of a facade's bookkeeping, for health
//! endpoints and operational logging.

use serde::{Deserialize, Serialize};

/// Counter snapshot of one managed executor facade.
///
/// `outstanding` counts invocations currently tracked for teardown;
/// the remaining counters are monotonic totals since construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSnapshot {
    pub name: String,
    pub outstanding: usize,
    pub submitted: u64,
    pub completed: u64,
    pub aborted: u64,
    pub cancelled: u64,
    pub skipped: u64,
    pub rejected: u64,
    pub shutdown: bool,
}

impl ExecutorSnapshot {
    /// Terminal outcomes accounted for so far.
    pub fn finished(&self) -> u64 {
        self.completed + self.aborted + self.cancelled + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = ExecutorSnapshot {
            name: "reports".to_string(),
            outstanding: 2,
            submitted: 10,
            completed: 6,
            aborted: 1,
            cancelled: 1,
            skipped: 0,
            rejected: 3,
            shutdown: false,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["name"], "reports");
        assert_eq!(json["submitted"], 10);

        let back: ExecutorSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(back.finished(), 8);
    }
}
