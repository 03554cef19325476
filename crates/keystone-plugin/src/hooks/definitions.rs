//! Hook names the host fires around session operations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Data-transforming hooks fired by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StandardHook {
    /// Fired with the session request before a session is created.
    BeforeCreateSession,
    /// Fired with the stored session after creation.
    AfterCreateSession,
    /// Fired with the session before it is marked complete.
    BeforeCompleteSession,
    /// Fired with the session after completion.
    AfterCompleteSession,
}

impl StandardHook {
    /// Every standard hook, in firing order.
    pub const ALL: [StandardHook; 4] = [
        Self::BeforeCreateSession,
        Self::AfterCreateSession,
        Self::BeforeCompleteSession,
        Self::AfterCompleteSession,
    ];

    /// Returns the wire name of the hook.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeCreateSession => "before-create-session",
            Self::AfterCreateSession => "after-create-session",
            Self::BeforeCompleteSession => "before-complete-session",
            Self::AfterCompleteSession => "after-complete-session",
        }
    }

    /// Returns whether the hook fires before the operation it wraps.
    pub fn is_before_hook(&self) -> bool {
        matches!(self, Self::BeforeCreateSession | Self::BeforeCompleteSession)
    }
}

impl fmt::Display for StandardHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for StandardHook {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_matches_as_str() {
        for hook in StandardHook::ALL {
            let json = serde_json::to_string(&hook).unwrap();
            assert_eq!(json, format!("\"{}\"", hook.as_str()));
        }
    }
}
