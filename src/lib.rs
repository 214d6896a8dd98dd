#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod api;
pub mod dict;
pub mod envelope;
pub mod error;
pub mod manager;
pub mod normalize;
pub(crate) mod serde_helpers;
pub mod types;
#[cfg(feature = "ws")]
pub mod ws;

use std::fmt::Write as _;

use reqwest::{Request, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Environment variable conventionally holding the panel API key.
pub const API_KEY_VAR: &str = "PTERODACTYL_API_KEY";

/// Trait for converting request types to URL query parameters.
///
/// This trait is automatically implemented for all types that implement [`Serialize`].
/// It uses [`serde_html_form`] to serialize the struct fields into a query string.
pub trait ToQueryParams: Serialize {
    /// Converts the request to a URL query string.
    ///
    /// Returns an empty string if no parameters are set, otherwise returns
    /// a string starting with `?` followed by URL-encoded key-value pairs.
    /// Also appends the page number, if provided.
    fn query_params(&self, page: Option<u32>) -> String {
        let mut params = serde_html_form::to_string(self)
            .inspect_err(|e| {
                #[cfg(feature = "tracing")]
                tracing::error!("Unable to convert to URL-encoded string {e:?}");
                #[cfg(not(feature = "tracing"))]
                let _: &serde_html_form::ser::Error = e;
            })
            .unwrap_or_default();

        if let Some(page) = page {
            if !params.is_empty() {
                params.push('&');
            }
            let _ = write!(params, "page={page}");
        }

        if params.is_empty() {
            String::new()
        } else {
            format!("?{params}")
        }
    }
}

impl<T: Serialize> ToQueryParams for T {}

/// Executes `request` and returns the JSON body.
///
/// Responses without a body (`204 No Content`) yield [`Value::Null`].
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(
        level = "debug",
        skip(client, request),
        fields(
            method = %request.method(),
            path = request.url().path(),
            status_code
        )
    )
)]
async fn request(client: &reqwest::Client, request: Request) -> Result<Value> {
    let method = request.method().clone();
    let path = request.url().path().to_owned();

    let response = client.execute(request).await?;
    let status_code = response.status();

    #[cfg(feature = "tracing")]
    tracing::Span::current().record("status_code", status_code.as_u16());

    if !status_code.is_success() {
        let message = response.text().await.unwrap_or_default();

        #[cfg(feature = "tracing")]
        tracing::warn!(
            status = %status_code,
            method = %method,
            path = %path,
            message = %message,
            "API request failed"
        );

        return Err(Error::status(status_code, method, path, message));
    }

    if status_code == StatusCode::NO_CONTENT {
        return Ok(Value::Null);
    }

    let body = response.bytes().await?;
    if body.is_empty() {
        return Ok(Value::Null);
    }

    Ok(serde_json::from_slice(&body)?)
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct ListRequest {
        #[serde(skip_serializing_if = "Option::is_none")]
        per_page: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        include: Option<String>,
    }

    #[test]
    fn query_params_with_page() {
        let request = ListRequest {
            per_page: Some(50),
            include: Some("allocations,egg".to_owned()),
        };

        assert_eq!(
            request.query_params(Some(2)),
            "?per_page=50&include=allocations%2Cegg&page=2"
        );
    }

    #[test]
    fn query_params_empty() {
        let request = ListRequest {
            per_page: None,
            include: None,
        };

        assert_eq!(request.query_params(None), "");
        assert_eq!(request.query_params(Some(1)), "?page=1");
    }
}
