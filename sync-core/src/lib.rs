//! sync-core: Shared infrastructure for the bridge workspace.
pub mod config;
pub mod error;
pub mod observability;
pub mod retry;

pub use serde;
pub use serde_json;
pub use tracing;
