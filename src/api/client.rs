//! HTTP client for a Pterodactyl panel.
//!
//! # Example
//!
//! ```no_run
//! use pterodactyl_client_sdk::api::{Client, Config};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(Config::from_env("https://panel.example.com")?)?;
//!
//! let account = client.get("api/client/account").await?;
//! println!("{account}");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

#[cfg(feature = "ws")]
use async_trait::async_trait;
use bon::Builder;
use reqwest::{
    Client as ReqwestClient, Method,
    header::{self, HeaderMap, HeaderValue},
};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use serde_json::Value;
use url::Url;

#[cfg(feature = "ws")]
use super::types::response::WebsocketResponse;
use crate::Result;
use crate::error::Error;
#[cfg(feature = "ws")]
use crate::serde_helpers::deserialize_with_warnings;
#[cfg(feature = "ws")]
use crate::ws::{ConnectionAuth, Transport};

/// Connection settings of a [`Client`].
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Base URL of the panel, e.g. `https://panel.example.com`
    #[builder(into)]
    host: String,
    /// Client (`ptlc_`) or application (`ptla_`) API key
    api_key: SecretString,
    /// `Origin` header for console sockets. Defaults to the origin of `host`.
    #[builder(into)]
    origin: Option<String>,
}

impl Config {
    /// Builds a config for `host` with the API key read from [`crate::API_KEY_VAR`].
    pub fn from_env<S: Into<String>>(host: S) -> Result<Self> {
        let api_key = std::env::var(crate::API_KEY_VAR).map_err(|e| {
            Error::validation(format!("unable to read {}: {e}", crate::API_KEY_VAR))
        })?;

        Ok(Self::builder()
            .host(host)
            .api_key(api_key.into())
            .build())
    }
}

/// Authenticated JSON client for the panel REST API.
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    /// Panel base URL, always ending in `/` so relative paths join below it
    host: Url,
    origin: String,
    client: ReqwestClient,
}

impl Client {
    pub fn new(config: Config) -> Result<Client> {
        let mut host = Url::parse(&config.host)?;
        if !host.path().ends_with('/') {
            let path = format!("{}/", host.path());
            host.set_path(&path);
        }

        let mut authorization =
            HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, authorization);
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("pterodactyl_client_sdk"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        let client = ReqwestClient::builder().default_headers(headers).build()?;

        let origin = config
            .origin
            .unwrap_or_else(|| host.origin().ascii_serialization());

        Ok(Self {
            inner: Arc::new(ClientInner {
                host,
                origin,
                client,
            }),
        })
    }

    /// Returns the base URL of the panel.
    #[must_use]
    pub fn host(&self) -> &Url {
        &self.inner.host
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.send::<()>(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        self.send(Method::PUT, path, Some(body)).await
    }

    /// Deletes the resource at `path`. The panel answers with an empty body.
    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.send::<()>(Method::DELETE, path, None).await
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value> {
        let url = self.inner.host.join(path.trim_start_matches('/'))?;

        let mut builder = self.inner.client.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        crate::request(&self.inner.client, builder.build()?).await
    }
}

#[cfg(feature = "ws")]
#[async_trait]
impl Transport for Client {
    async fn connection_auth(&self, server_id: &str) -> Result<ConnectionAuth> {
        let value = self
            .get(&format!("api/client/servers/{server_id}/websocket"))
            .await?;
        let response: WebsocketResponse = deserialize_with_warnings(value)?;

        Ok(ConnectionAuth::new(
            response.data.socket,
            response.data.token.into(),
        ))
    }

    fn origin(&self) -> Option<String> {
        Some(self.inner.origin.clone())
    }
}
