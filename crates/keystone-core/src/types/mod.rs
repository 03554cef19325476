//! Record types exchanged between the host and provider plugins.

pub mod encounter;
pub mod session;

pub use encounter::{Encounter, EncounterRequest};
pub use session::{Session, SessionQuery, SessionStatus};
