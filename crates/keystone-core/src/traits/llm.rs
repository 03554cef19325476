//! LLM provider trait for encounter generation.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::encounter::{Encounter, EncounterRequest};

/// Trait for content generation backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate an encounter for the request.
    async fn generate_encounter(&self, request: &EncounterRequest) -> AppResult<Encounter>;

    /// Check whether the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Release resources.
    async fn shutdown(&self) -> AppResult<()>;
}
