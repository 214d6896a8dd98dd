//! Real-time server consoles.
//!
//! **Feature flag:** `ws` (enabled by default)
//!
//! Each server's console is a WebSocket opened with credentials fetched from the
//! panel. A [`Shard`] owns one such socket and republishes what arrives on it as
//! [`ShardEvent`]s; a [`ShardManager`] keeps one shard per server.
//!
//! # Example
//!
//! ```no_run
//! use pterodactyl_client_sdk::api::{Client, Config as ApiConfig};
//! use pterodactyl_client_sdk::ws::{Config, ShardEvent, ShardManager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(ApiConfig::from_env("https://panel.example.com")?)?;
//! let manager = ShardManager::new(client, Config::default());
//!
//! let shard = manager.create_shard("1a7ce997")?;
//! let mut events = shard.subscribe();
//! shard.connect().await?;
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         ShardEvent::AuthSuccess => shard.request_logs()?,
//!         ShardEvent::ServerOutput(line) => println!("{line}"),
//!         ShardEvent::ServerDisconnect => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod manager;
pub mod shard;
pub mod traits;

pub use config::{Config, ReconnectConfig};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use event::{NetworkStats, PartialBackup, ShardEvent, Stats, dispatch};
pub use manager::ShardManager;
pub use shard::{Shard, ShardStatus};
pub use traits::*;
