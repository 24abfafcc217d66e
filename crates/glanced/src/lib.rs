//! glanced — streaming face recognition daemon.
//!
//! Exposes the library components for integration tests; the binary wires
//! them together in `main.rs`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod session;
pub mod state;

pub use config::Config;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
