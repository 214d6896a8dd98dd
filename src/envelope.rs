//! Tagged view over the JSON shapes the panel sends.
//!
//! REST responses come wrapped either as a single resource
//! (`{"object": "server", "attributes": {...}}`) or as a list
//! (`{"object": "list", "data": [...], "meta": {"pagination": {...}}}`), and the
//! console socket speaks `{"event": "...", "args": [...]}` frames. [`Envelope::parse`]
//! sorts a raw value into one of those cases once, at the transport boundary, so the
//! cache and socket code never sniff for fields themselves.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;
use crate::error::Error;
use crate::normalize::{self, Options};
use crate::serde_helpers::deserialize_with_warnings;

/// A single console socket frame, in either direction.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

impl Frame {
    /// Builds a frame; an empty `args` list is omitted from the wire form.
    #[must_use]
    pub fn new(event: &str, args: Vec<String>) -> Self {
        Self {
            event: event.to_owned(),
            args: (!args.is_empty()).then_some(args),
        }
    }

    /// The frame's arguments, empty when the frame carried none.
    #[must_use]
    pub fn args(&self) -> &[String] {
        self.args.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn into_args(self) -> Vec<String> {
        self.args.unwrap_or_default()
    }
}

/// Pagination metadata of a list response.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Page this response holds, starting at 1
    pub current: u32,
    /// Total number of items across all pages
    pub total: u64,
    /// Number of items on this page
    pub count: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl Pagination {
    fn from_wire(value: Value) -> Result<Self> {
        let options = Options::new()
            .rename("current_page", "current")
            .ignore("links");
        deserialize_with_warnings(normalize::to_internal(value, &options))
    }
}

/// The shapes a panel payload can take.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// `{"data": [{"attributes": ...}, ...], "meta": {"pagination": ...}}`
    Collection {
        /// The `attributes` of every item, still in wire form
        data: Vec<Value>,
        pagination: Option<Pagination>,
    },
    /// `{"object": ..., "attributes": ...}`
    Single { object: String, attributes: Value },
    /// `{"event": ..., "args": [...]}`
    Event(Frame),
}

impl Envelope {
    /// Classifies a raw JSON payload.
    pub fn parse(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(Error::validation("expected a JSON object payload"));
        };

        if let Some(data) = map.remove("data") {
            let Value::Array(items) = data else {
                return Err(Error::validation("`data` of a list payload must be an array"));
            };

            let data = items
                .into_iter()
                .map(|item| match item {
                    Value::Object(mut item) => item
                        .remove("attributes")
                        .unwrap_or(Value::Object(item)),
                    other => other,
                })
                .collect();
            let pagination = map
                .remove("meta")
                .and_then(|mut meta| meta.get_mut("pagination").map(Value::take))
                .map(Pagination::from_wire)
                .transpose()?;

            return Ok(Self::Collection { data, pagination });
        }

        if let Some(attributes) = map.remove("attributes") {
            let object = map
                .get("object")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            return Ok(Self::Single { object, attributes });
        }

        if map.contains_key("event") {
            let frame = serde_json::from_value(Value::Object(map))?;
            return Ok(Self::Event(frame));
        }

        Err(Error::validation(
            "payload is neither a resource, a list nor an event",
        ))
    }

    /// Pagination of a list payload.
    #[must_use]
    pub fn pagination(&self) -> Option<&Pagination> {
        match self {
            Self::Collection { pagination, .. } => pagination.as_ref(),
            _ => None,
        }
    }
}
