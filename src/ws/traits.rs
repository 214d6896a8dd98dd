//! Seams between the shards and the panel they authenticate against.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::Result;

/// Signed console socket URL and the token to authenticate on it.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ConnectionAuth {
    pub socket_url: String,
    pub token: SecretString,
}

impl ConnectionAuth {
    #[must_use]
    pub fn new<S: Into<String>>(socket_url: S, token: SecretString) -> Self {
        Self {
            socket_url: socket_url.into(),
            token,
        }
    }
}

/// Source of console socket credentials.
///
/// Implemented by [`crate::api::Client`]. Credentials are fetched again on every
/// connect and every token refresh, so implementations must not cache them.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Fetches a fresh socket URL and token for `server_id`.
    async fn connection_auth(&self, server_id: &str) -> Result<ConnectionAuth>;

    /// `Origin` header sent when opening the socket; the panel's daemon rejects
    /// sockets from origins it does not know.
    fn origin(&self) -> Option<String> {
        None
    }
}
