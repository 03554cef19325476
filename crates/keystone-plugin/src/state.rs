//! Plugin lifecycle state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a registered plugin.
///
/// ```text
/// UNLOADED → LOADING → LOADED → INITIALIZING → ACTIVE → SHUTTING_DOWN → SHUT_DOWN
/// ```
///
/// `ERROR` is reachable from every state and is terminal for the instance,
/// though a forced reload may move the plugin back to `LOADING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginState {
    /// Registered, nothing loaded yet.
    Unloaded,
    /// The entry artifact is being loaded.
    Loading,
    /// An instance has been constructed.
    Loaded,
    /// `initialize` has been invoked with a context.
    Initializing,
    /// Fully running; hooks and events are live.
    Active,
    /// `deactivate` has been invoked.
    ShuttingDown,
    /// `shutdown` completed.
    ShutDown,
    /// A lifecycle call failed.
    Error,
}

impl PluginState {
    /// Position along the happy path. `Error` has no rank.
    fn rank(self) -> Option<u8> {
        match self {
            Self::Unloaded => Some(0),
            Self::Loading => Some(1),
            Self::Loaded => Some(2),
            Self::Initializing => Some(3),
            Self::Active => Some(4),
            Self::ShuttingDown => Some(5),
            Self::ShutDown => Some(6),
            Self::Error => None,
        }
    }

    /// Returns whether this state is `other` or later along the happy path.
    ///
    /// `Error` counts as past every state.
    pub fn is_at_or_past(self, other: PluginState) -> bool {
        match (self.rank(), other.rank()) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => a >= b,
        }
    }

    /// Returns whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: PluginState) -> bool {
        use PluginState::*;

        if next == Error {
            return true;
        }

        matches!(
            (self, next),
            (Unloaded, Loading)
                | (Loading, Loaded)
                | (Loaded, Initializing)
                | (Initializing, Active)
                | (Active, ShuttingDown)
                | (ShuttingDown, ShutDown)
                // Forced reloads.
                | (Loaded, Loading)
                | (ShutDown, Loading)
                | (Error, Loading)
                // Shutting down a plugin that never reached ACTIVE.
                | (Loaded, ShuttingDown)
                | (Initializing, ShuttingDown)
        )
    }

    /// Returns the upper snake case name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unloaded => "UNLOADED",
            Self::Loading => "LOADING",
            Self::Loaded => "LOADED",
            Self::Initializing => "INITIALIZING",
            Self::Active => "ACTIVE",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::ShutDown => "SHUT_DOWN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            PluginState::Unloaded,
            PluginState::Loading,
            PluginState::Loaded,
            PluginState::Initializing,
            PluginState::Active,
            PluginState::ShuttingDown,
            PluginState::ShutDown,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_error_reachable_from_everywhere() {
        for state in [
            PluginState::Unloaded,
            PluginState::Loading,
            PluginState::Active,
            PluginState::ShutDown,
        ] {
            assert!(state.can_transition_to(PluginState::Error));
        }
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!PluginState::Unloaded.can_transition_to(PluginState::Active));
        assert!(!PluginState::Active.can_transition_to(PluginState::Loading));
        assert!(!PluginState::Error.can_transition_to(PluginState::Active));
    }

    #[test]
    fn test_ordering() {
        assert!(PluginState::Active.is_at_or_past(PluginState::Initializing));
        assert!(PluginState::Initializing.is_at_or_past(PluginState::Initializing));
        assert!(!PluginState::Loaded.is_at_or_past(PluginState::Initializing));
        assert!(PluginState::Error.is_at_or_past(PluginState::Loaded));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&PluginState::ShuttingDown).unwrap();
        assert_eq!(json, "\"SHUTTING_DOWN\"");
    }
}
