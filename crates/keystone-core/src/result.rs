//! Convenience result type alias for Keystone.

use crate::error::AppError;

/// A specialized `Result` type for Keystone operations.
///
/// Plugin lifecycle methods and provider operations all return this so
/// that plugin authors deal with a single error type.
pub type AppResult<T> = Result<T, AppError>;
