//! # keystone-core
//!
//! Core crate for Keystone. Contains the unified error system, the
//! configuration schema, and the narrow provider interfaces that storage
//! and LLM plugins implement.
//!
//! This crate has **no** internal dependencies on other Keystone crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
