//! glance-store — persistence for the face recognition service.
//!
//! Two concerns: the durable identity store (registered identities and the
//! archived-face audit trail, SQLite) and the ephemeral in-memory cache
//! holding cropped faces between detection and archival.

pub mod cache;
pub mod store;

pub use cache::FaceCache;
pub use store::{ArchiveOutcome, IdentityStore, StoreError};
