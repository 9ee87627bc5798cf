use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle states of an offline worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Registered, install not yet attempted
    Parsed,
    /// Install handler running
    Installing,
    /// Every manifest asset stored, waiting to activate
    Installed,
    /// Activate handler running
    Activating,
    /// Old caches purged, worker serves fetches
    Activated,
    /// Install failed; the worker never activates
    Redundant,
}

impl WorkerState {
    /// Whether the activate handler may run from this state.
    pub fn can_activate(&self) -> bool {
        matches!(self, WorkerState::Installed | WorkerState::Activated)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_activate() {
        assert!(WorkerState::Installed.can_activate());
        assert!(WorkerState::Activated.can_activate());
        assert!(!WorkerState::Parsed.can_activate());
        assert!(!WorkerState::Redundant.can_activate());
    }

    #[test]
    fn test_display() {
        assert_eq!(WorkerState::Redundant.to_string(), "redundant");
        assert_eq!(WorkerState::Activated.to_string(), "activated");
    }
}
