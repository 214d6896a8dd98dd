//! Cache-merge contract shared by every resource manager.
//!
//! A manager keeps its fetched resources in a [`Cache`]. Each transport response is
//! folded in with [`Cache::patch`]:
//!
//! - a list payload is normalized item by item and merged key by key, so a fetch only
//!   ever adds or overwrites entries
//! - a single resource payload is normalized and stored under its key
//!
//! Entries leave the cache only through [`Cache::remove`], which managers call after a
//! successful delete. Pagination metadata is kept beside the cache, never inside it.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Result;
use crate::dict::Dict;
use crate::envelope::{Envelope, Pagination};
use crate::error::Error;
use crate::normalize::{self, Options};
use crate::serde_helpers::deserialize_with_warnings;

/// A panel resource that can be cached by a manager.
pub trait Resource: DeserializeOwned + Clone {
    /// Key the resource is cached under.
    type Id: Hash + Eq + Clone + Debug;

    fn id(&self) -> Self::Id;

    /// Normalizer options applied to the wire `attributes` before deserializing.
    fn options() -> Options {
        Options::default()
    }

    /// Normalizes wire `attributes` and deserializes them.
    fn from_wire(attributes: Value) -> Result<Self> {
        deserialize_with_warnings(normalize::to_internal(attributes, &Self::options()))
    }
}

/// Keyed cache of resources plus the pagination of the last list fetch.
#[derive(Debug)]
pub struct Cache<R: Resource> {
    items: Dict<R::Id, R>,
    pagination: Option<Pagination>,
}

impl<R: Resource> Cache<R> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Dict::new(),
            pagination: None,
        }
    }

    /// A cache that refuses to grow beyond `limit` entries.
    pub fn with_limit(limit: usize) -> Result<Self> {
        let mut cache = Self::new();
        cache.items.set_limit(limit)?;
        Ok(cache)
    }

    #[must_use]
    pub fn items(&self) -> &Dict<R::Id, R> {
        &self.items
    }

    #[must_use]
    pub fn get(&self, id: &R::Id) -> Option<&R> {
        self.items.get(id)
    }

    /// Pagination reported by the most recent list payload.
    #[must_use]
    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    /// Drops `id` from the cache.
    pub fn remove(&mut self, id: &R::Id) -> bool {
        self.items.delete(id)
    }

    /// Folds a transport payload into the cache and returns just the resources it held.
    pub fn patch(&mut self, envelope: Envelope) -> Result<Dict<R::Id, R>> {
        match envelope {
            Envelope::Collection { data, pagination } => {
                let mut page = Dict::new();
                for attributes in data {
                    let resource = R::from_wire(attributes)?;
                    page.set(resource.id(), resource)?;
                }

                self.items.merge(page.clone())?;
                if pagination.is_some() {
                    self.pagination = pagination;
                }
                Ok(page)
            }
            Envelope::Single { attributes, .. } => {
                let resource = R::from_wire(attributes)?;
                let id = resource.id();
                self.items.set(id.clone(), resource.clone())?;

                let mut page = Dict::new();
                page.set(id, resource)?;
                Ok(page)
            }
            Envelope::Event(frame) => Err(Error::validation(format!(
                "socket event `{}` cannot be cached as a resource",
                frame.event
            ))),
        }
    }

    /// Fetches page after page until the reported page count is exhausted, merging
    /// every page into the cache. Returns everything fetched by this call.
    ///
    /// A payload without pagination metadata is treated as the only page.
    pub async fn fetch_all<F, Fut>(&mut self, mut fetch: F) -> Result<Dict<R::Id, R>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Envelope>>,
    {
        let mut all = Dict::new();
        let mut page = 1_u32;

        loop {
            let envelope = fetch(page).await?;
            let total_pages = envelope.pagination().map(|p| p.total_pages);

            let fetched = self.patch(envelope)?;
            all.merge(fetched)?;

            page = page.saturating_add(1);
            match total_pages {
                Some(total) if page <= total => {}
                _ => break,
            }
        }

        Ok(all)
    }
}

impl<R: Resource> Default for Cache<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::error::Kind;
    use crate::normalize::Cast;

    #[derive(Debug, Clone, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Node {
        id: u32,
        name: String,
        maintenance_mode: bool,
        created_at: String,
    }

    impl Resource for Node {
        type Id = u32;

        fn id(&self) -> u32 {
            self.id
        }

        fn options() -> Options {
            Options::new()
                .rename("maintenance_mode", "maintenanceMode")
                .cast("created_at", Cast::Date)
        }
    }

    fn node(id: u32, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "maintenance_mode": false,
            "created_at": "2024-01-01T00:00:00+00:00"
        })
    }

    fn page(items: Vec<Value>, current: u32, total_pages: u32) -> Envelope {
        Envelope::Collection {
            data: items,
            pagination: Some(Pagination {
                current,
                total: 0,
                count: 0,
                per_page: 2,
                total_pages,
            }),
        }
    }

    #[test]
    fn patch_collection_merges_without_removing() {
        let mut cache: Cache<Node> = Cache::new();
        cache
            .patch(page(vec![node(1, "a"), node(2, "b")], 1, 1))
            .unwrap();

        let fetched = cache
            .patch(page(vec![node(2, "b2"), node(3, "c")], 1, 1))
            .unwrap();

        assert_eq!(fetched.len(), 2);
        assert_eq!(cache.items().len(), 3);
        assert_eq!(cache.get(&1).unwrap().name, "a");
        assert_eq!(cache.get(&2).unwrap().name, "b2");
        assert_eq!(
            cache.get(&3).unwrap().created_at,
            "2024-01-01T00:00:00.000Z"
        );
        assert_eq!(cache.pagination().unwrap().current, 1);
    }

    #[test]
    fn patch_single_sets_one_entry() {
        let mut cache: Cache<Node> = Cache::new();
        let fetched = cache
            .patch(Envelope::Single {
                object: "node".to_owned(),
                attributes: node(7, "g"),
            })
            .unwrap();

        assert_eq!(fetched.len(), 1);
        assert!(cache.items().has(&7));
        assert!(cache.pagination().is_none());
        assert!(cache.remove(&7));
        assert!(cache.items().is_empty());
    }

    #[test]
    fn patch_rejects_events() {
        let mut cache: Cache<Node> = Cache::new();
        let frame = serde_json::from_value(json!({ "event": "status" })).unwrap();

        let err = cache.patch(Envelope::Event(frame)).unwrap_err();
        assert_eq!(err.kind(), Kind::Validation);
    }

    #[test]
    fn limited_cache_fails_when_full() {
        let mut cache: Cache<Node> = Cache::with_limit(1).unwrap();

        let err = cache
            .patch(page(vec![node(1, "a"), node(2, "b")], 1, 1))
            .unwrap_err();
        assert_eq!(err.kind(), Kind::Capacity);
        assert_eq!(cache.items().len(), 1);
    }

    #[tokio::test]
    async fn fetch_all_walks_every_page() {
        let mut cache: Cache<Node> = Cache::new();
        let calls = Cell::new(0);

        let all = cache
            .fetch_all(|page_number| {
                calls.set(calls.get() + 1);
                let items = match page_number {
                    1 => vec![node(1, "a"), node(2, "b")],
                    2 => vec![node(3, "c"), node(4, "d")],
                    _ => vec![node(5, "e")],
                };
                async move { Ok(page(items, page_number, 3)) }
            })
            .await
            .unwrap();

        assert_eq!(calls.get(), 3);
        assert_eq!(all.map(|n, _| n.id), vec![1, 2, 3, 4, 5]);
        assert_eq!(cache.items().len(), 5);
        assert_eq!(cache.pagination().unwrap().current, 3);
    }

    #[tokio::test]
    async fn fetch_all_later_pages_overwrite_earlier() {
        let mut cache: Cache<Node> = Cache::new();

        // a listing that shifted between requests repeats node 2 on page 2
        let all = cache
            .fetch_all(|page_number| {
                let items = match page_number {
                    1 => vec![node(1, "a"), node(2, "b")],
                    _ => vec![node(2, "b2"), node(3, "c")],
                };
                async move { Ok(page(items, page_number, 2)) }
            })
            .await
            .unwrap();

        assert_eq!(all.map(|n, _| n.id), vec![1, 2, 3]);
        assert_eq!(all.get(&2).unwrap().name, "b2");
        assert_eq!(cache.get(&2).unwrap().name, "b2");
    }

    #[tokio::test]
    async fn fetch_all_stops_without_pagination() {
        let mut cache: Cache<Node> = Cache::new();

        let all = cache
            .fetch_all(|_| async {
                Ok(Envelope::Collection {
                    data: vec![node(1, "a")],
                    pagination: None,
                })
            })
            .await
            .unwrap();

        assert_eq!(all.len(), 1);
    }
}
