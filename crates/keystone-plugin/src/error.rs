//! Plugin runtime error taxonomy.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use keystone_core::AppError;
use keystone_core::error::ErrorKind;

use crate::state::PluginState;

/// Lifecycle call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Constructing the instance.
    Load,
    /// `Plugin::initialize`.
    Initialize,
    /// `Plugin::activate`.
    Activate,
    /// `Plugin::deactivate`.
    Deactivate,
    /// `Plugin::shutdown`.
    Shutdown,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Initialize => "initialize",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// Errors raised by the plugin runtime.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// A manifest file is malformed or incomplete.
    #[error("invalid manifest '{}': {reason}", .path.display())]
    Manifest {
        /// Manifest file path.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// A plugin with the same name is already registered.
    #[error("plugin '{0}' is already registered")]
    DuplicateName(String),

    /// No plugin with this name is registered.
    #[error("plugin '{0}' is not registered")]
    NotFound(String),

    /// The requested operation is not allowed in the plugin's current state.
    #[error("plugin '{name}' is {state}: {reason}")]
    InvalidState {
        /// Plugin name.
        name: String,
        /// State at the time of the call.
        state: PluginState,
        /// Why the call was rejected.
        reason: String,
    },

    /// The entry artifact could not be loaded or lacks a constructor.
    #[error("failed to load plugin '{name}': {reason}")]
    Load {
        /// Plugin name.
        name: String,
        /// Failure detail.
        reason: String,
    },

    /// One or more required dependencies are missing or failed.
    #[error("plugin '{name}' has unsatisfied dependencies: {}", .unsatisfied.join(", "))]
    Dependency {
        /// Plugin name.
        name: String,
        /// Missing or failed dependency names.
        unsatisfied: Vec<String>,
    },

    /// The plugin is part of (or depends on) a dependency cycle.
    #[error("circular dependency among plugins: {}", .0.join(", "))]
    CircularDependency(Vec<String>),

    /// A plugin lifecycle method returned an error.
    #[error("plugin '{name}' failed during {phase}: {source}")]
    Lifecycle {
        /// Plugin name.
        name: String,
        /// Phase that failed.
        phase: LifecyclePhase,
        /// Error returned by the plugin.
        #[source]
        source: AppError,
    },

    /// A plugin lifecycle method exceeded the configured timeout.
    #[error("plugin '{name}' timed out during {phase} after {timeout:?}")]
    Timeout {
        /// Plugin name.
        name: String,
        /// Phase that timed out.
        phase: LifecyclePhase,
        /// Configured bound.
        timeout: Duration,
    },

    /// A plugin used a hook or event name it did not declare.
    #[error("plugin '{name}' is not permitted to use {capability}")]
    PermissionDenied {
        /// Plugin name.
        name: String,
        /// The undeclared capability, e.g. `hook 'before-create-session'`.
        capability: String,
    },
}

impl PluginError {
    /// Creates a load error.
    pub fn load(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid-state error.
    pub fn invalid_state(
        name: impl Into<String>,
        state: PluginState,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            name: name.into(),
            state,
            reason: reason.into(),
        }
    }

    /// Creates a lifecycle error.
    pub fn lifecycle(name: impl Into<String>, phase: LifecyclePhase, source: AppError) -> Self {
        Self::Lifecycle {
            name: name.into(),
            phase,
            source,
        }
    }

    /// Maps the variant onto the application-wide error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Manifest { .. } => ErrorKind::Validation,
            Self::DuplicateName(_) | Self::InvalidState { .. } => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::PermissionDenied { .. } => ErrorKind::Authorization,
            Self::Load { .. }
            | Self::Dependency { .. }
            | Self::CircularDependency(_)
            | Self::Lifecycle { .. } => ErrorKind::Plugin,
        }
    }
}

impl From<PluginError> for AppError {
    fn from(err: PluginError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        AppError::with_source(kind, message, err)
    }
}

/// A specialized `Result` type for plugin runtime operations.
pub type PluginResult<T> = Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_message_lists_names() {
        let err = PluginError::Dependency {
            name: "a".into(),
            unsatisfied: vec!["b".into(), "c".into()],
        };
        assert_eq!(
            err.to_string(),
            "plugin 'a' has unsatisfied dependencies: b, c"
        );
    }

    #[test]
    fn test_into_app_error_keeps_kind() {
        let app: AppError = PluginError::NotFound("x".into()).into();
        assert_eq!(app.kind, ErrorKind::NotFound);

        let app: AppError = PluginError::DuplicateName("x".into()).into();
        assert_eq!(app.kind, ErrorKind::Conflict);

        let app: AppError =
            PluginError::lifecycle("x", LifecyclePhase::Activate, AppError::internal("no")).into();
        assert_eq!(app.kind, ErrorKind::Plugin);
        assert!(app.message.contains("activate"));
    }
}
