//! REST side of the panel: the HTTP client and the cached resource managers.
//!
//! [`Client`] issues authenticated JSON requests against a panel host and, with the
//! `ws` feature, doubles as the [`crate::ws::Transport`] shards fetch their socket
//! credentials from. The managers fold every response into their [`crate::manager::Cache`].
//!
//! ## Endpoints used
//!
//! | Endpoint | Used by |
//! |----------|---------|
//! | `GET /api/client` | [`ServerManager::fetch_page`], [`ServerManager::fetch_all`] |
//! | `GET /api/client/servers/{id}` | [`ServerManager::fetch`] |
//! | `POST /api/client/servers/{id}/command` | [`ServerManager::send_command`] |
//! | `POST /api/client/servers/{id}/power` | [`ServerManager::set_power_state`] |
//! | `GET /api/client/servers/{id}/websocket` | `Transport::connection_auth` |
//! | `GET /api/application/users` | [`UserManager::fetch_page`], [`UserManager::fetch_all`] |
//! | `GET /api/application/users/{id}` | [`UserManager::fetch`] |
//! | `DELETE /api/application/users/{id}` | [`UserManager::delete`] |
//!
//! # Example
//!
//! ```no_run
//! use pterodactyl_client_sdk::api::{Client, Config, ServerManager};
//! use pterodactyl_client_sdk::api::types::request::ListRequest;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::builder()
//!     .host("https://panel.example.com")
//!     .api_key("ptlc_xxx".into())
//!     .build();
//! let client = Client::new(config)?;
//!
//! let mut servers = ServerManager::new(client);
//! for server in servers.fetch_all(&ListRequest::default()).await?.values() {
//!     println!("{}: {}", server.identifier, server.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod servers;
pub mod types;
pub mod users;

pub use client::{Client, Config};
pub use servers::ServerManager;
pub use users::UserManager;
