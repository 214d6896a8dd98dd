//! Re-exported types from external crates for convenience.
//!
//! These types are commonly used in this SDK and are re-exported here
//! so users don't need to add these dependencies to their `Cargo.toml`.

/// Date and time types for timestamps in API responses and shard state.
pub use chrono::{DateTime, Utc};
/// Secret string type that redacts API keys and socket tokens in debug output.
pub use secrecy::{ExposeSecret, SecretString};
/// Dynamic JSON value used for normalized payloads.
pub use serde_json::Value;
/// UUID type used for server and user identifiers.
pub use uuid::Uuid;
