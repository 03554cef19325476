//! Encounter generation request/response types for LLM providers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parameters for generating an encounter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncounterRequest {
    /// Session the encounter belongs to.
    pub session_id: Option<Uuid>,
    /// Scenario or theme prompt.
    pub prompt: String,
    /// Requested difficulty label.
    pub difficulty: Option<String>,
    /// Additional provider-specific parameters.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// A generated encounter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encounter {
    /// Unique encounter ID.
    pub id: Uuid,
    /// Short title.
    pub title: String,
    /// Generated body text.
    pub content: String,
    /// Provider that produced the encounter.
    pub provider: String,
    /// Provider-specific metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}
