//! Panel users, managed with an application API key.

use super::client::Client;
use super::types::request::ListRequest;
use super::types::response::User;
use crate::dict::Dict;
use crate::envelope::Envelope;
use crate::error::Error;
use crate::manager::Cache;
use crate::{Result, ToQueryParams as _};

#[derive(Debug)]
pub struct UserManager {
    client: Client,
    cache: Cache<User>,
}

impl UserManager {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: Cache::new(),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Cache<User> {
        &self.cache
    }

    pub async fn fetch(&mut self, id: u64) -> Result<User> {
        let value = self
            .client
            .get(&format!("api/application/users/{id}"))
            .await?;

        self.cache
            .patch(Envelope::parse(value)?)?
            .first()
            .cloned()
            .ok_or_else(|| Error::validation(format!("user {id} was not returned")))
    }

    pub async fn fetch_page(&mut self, request: &ListRequest, page: u32) -> Result<Dict<u64, User>> {
        let value = self
            .client
            .get(&format!(
                "api/application/users{}",
                request.query_params(Some(page))
            ))
            .await?;

        self.cache.patch(Envelope::parse(value)?)
    }

    pub async fn fetch_all(&mut self, request: &ListRequest) -> Result<Dict<u64, User>> {
        let client = &self.client;

        self.cache
            .fetch_all(|page| {
                let path = format!("api/application/users{}", request.query_params(Some(page)));
                async move { Envelope::parse(client.get(&path).await?) }
            })
            .await
    }

    /// Deletes the user on the panel, then drops it from the cache.
    pub async fn delete(&mut self, id: u64) -> Result<()> {
        self.client
            .delete(&format!("api/application/users/{id}"))
            .await?;
        self.cache.remove(&id);
        Ok(())
    }
}
