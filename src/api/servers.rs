//! Servers reachable with a client API key.

use super::client::Client;
use super::types::request::{CommandRequest, ListRequest, PowerRequest, PowerSignal};
use super::types::response::Server;
use crate::dict::Dict;
use crate::envelope::Envelope;
use crate::error::Error;
use crate::manager::Cache;
use crate::{Result, ToQueryParams as _};

/// Fetches servers through the client API and keeps them cached by identifier.
#[derive(Debug)]
pub struct ServerManager {
    client: Client,
    cache: Cache<Server>,
}

impl ServerManager {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: Cache::new(),
        }
    }

    /// Every server fetched so far, plus the pagination of the last list fetch.
    #[must_use]
    pub fn cache(&self) -> &Cache<Server> {
        &self.cache
    }

    pub async fn fetch(&mut self, identifier: &str) -> Result<Server> {
        let value = self
            .client
            .get(&format!("api/client/servers/{identifier}"))
            .await?;

        self.cache
            .patch(Envelope::parse(value)?)?
            .first()
            .cloned()
            .ok_or_else(|| Error::validation(format!("server {identifier} was not returned")))
    }

    pub async fn fetch_page(
        &mut self,
        request: &ListRequest,
        page: u32,
    ) -> Result<Dict<String, Server>> {
        let value = self
            .client
            .get(&format!("api/client{}", request.query_params(Some(page))))
            .await?;

        self.cache.patch(Envelope::parse(value)?)
    }

    /// Walks every page of the server list.
    pub async fn fetch_all(&mut self, request: &ListRequest) -> Result<Dict<String, Server>> {
        let client = &self.client;

        self.cache
            .fetch_all(|page| {
                let path = format!("api/client{}", request.query_params(Some(page)));
                async move { Envelope::parse(client.get(&path).await?) }
            })
            .await
    }

    /// Runs `command` on the server console.
    pub async fn send_command(&self, identifier: &str, command: &str) -> Result<()> {
        self.client
            .post(
                &format!("api/client/servers/{identifier}/command"),
                &CommandRequest { command },
            )
            .await?;
        Ok(())
    }

    pub async fn set_power_state(&self, identifier: &str, signal: PowerSignal) -> Result<()> {
        self.client
            .post(
                &format!("api/client/servers/{identifier}/power"),
                &PowerRequest { signal },
            )
            .await?;
        Ok(())
    }
}
