//! Document store adapter
//!
//! Thin typed seam over the external document service. Collections hold
//! JSON documents keyed by store-assigned ids.
//!
//! - `get` / `list` read once
//! - `subscribe_document` / `subscribe_query` open a live feed that delivers
//!   full snapshots to a [`SnapshotListener`] until the returned
//!   [`Unsubscribe`] is called
//! - `add` / `set` / `update` / `delete` write
//!
//! The adapter performs no retries and no merging beyond what the store
//! does: `update` is a shallow merge, so an array passed to it replaces the
//! stored array wholesale.

#[cfg(any(test, feature = "sim"))]
mod gated;
mod memory;

#[cfg(any(test, feature = "sim"))]
pub use gated::ReadBarrierStore;
pub use memory::{MemoryStore, StoreOp};

use crate::error::{BoardError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Raw document body
pub type Document = serde_json::Map<String, Value>;

/// One document as seen at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    /// `None` when the document does not exist
    pub data: Option<Document>,
}

impl DocumentSnapshot {
    pub fn found(id: impl Into<String>, data: Document) -> Self {
        Self {
            id: id.into(),
            data: Some(data),
        }
    }

    pub fn missing(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }
}

/// A delivery from a live feed
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// Full state of a single watched document
    Document(DocumentSnapshot),
    /// Full result set of a watched query, in query order
    Query(Vec<DocumentSnapshot>),
}

/// Sort direction for [`Query::order_by`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Collection query: equality filters, one ordering, optional limit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document passes the filters and carries the ordered field
    pub fn matches(&self, data: &Document) -> bool {
        let filtered = self
            .filters
            .iter()
            .all(|(field, value)| data.get(field) == Some(value));

        // Documents without the ordered field are excluded from ordered results
        let ordered = match &self.order_by {
            Some((field, _)) => data.contains_key(field),
            None => true,
        };

        filtered && ordered
    }

    /// Filter, sort and truncate a set of documents
    pub fn apply<'a, I>(&self, documents: I) -> Vec<DocumentSnapshot>
    where
        I: IntoIterator<Item = (&'a String, &'a Document)>,
    {
        let mut results: Vec<DocumentSnapshot> = documents
            .into_iter()
            .filter(|(_, data)| self.matches(data))
            .map(|(id, data)| DocumentSnapshot::found(id.clone(), data.clone()))
            .collect();

        if let Some((field, direction)) = &self.order_by {
            results.sort_by(|a, b| {
                let left = a.data.as_ref().and_then(|d| d.get(field));
                let right = b.data.as_ref().and_then(|d| d.get(field));
                let ordering = compare_values(left, right);
                let ordering = match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                };
                ordering.then_with(|| a.id.cmp(&b.id))
            });
        }

        if let Some(limit) = self.limit {
            results.truncate(limit);
        }

        results
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

/// Receives deliveries from a live feed
///
/// Callbacks run on the store's delivery path and must not call back into
/// the store.
pub trait SnapshotListener: Send + Sync {
    fn on_next(&self, snapshot: Snapshot);

    fn on_error(&self, error: BoardError);
}

/// Handle that detaches a listener from its feed
pub struct Unsubscribe {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Unsubscribe {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to detach
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Detach the listener. Deliveries already in flight may still arrive.
    pub fn call(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// External document service
///
/// All operations may fail with `Unavailable`, `PermissionDenied` or
/// `NotFound`; failures propagate unchanged.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document; `NotFound` when it does not exist
    async fn get(&self, collection: &str, id: &str) -> Result<Document>;

    /// One-shot query
    async fn list(&self, collection: &str, query: &Query) -> Result<Vec<DocumentSnapshot>>;

    /// Watch one document
    async fn subscribe_document(
        &self,
        collection: &str,
        id: &str,
        listener: Arc<dyn SnapshotListener>,
    ) -> Result<Unsubscribe>;

    /// Watch the result set of a query
    async fn subscribe_query(
        &self,
        collection: &str,
        query: &Query,
        listener: Arc<dyn SnapshotListener>,
    ) -> Result<Unsubscribe>;

    /// Insert with a store-assigned id
    async fn add(&self, collection: &str, data: Document) -> Result<String>;

    /// Create or replace at a known id
    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<()>;

    /// Shallow merge of `partial` into an existing document
    async fn update(&self, collection: &str, id: &str, partial: Document) -> Result<()>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}

/// Build a [`Document`] from a JSON object literal
///
/// Non-object values produce an empty document.
pub fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}
