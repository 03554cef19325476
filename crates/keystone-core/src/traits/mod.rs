//! Provider interfaces implemented by plugins and consumed by the host.

pub mod llm;
pub mod storage;

pub use llm::LlmProvider;
pub use storage::StorageProvider;
