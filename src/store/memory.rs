//! In-process document store
//!
//! Complete [`DocumentStore`] backed by a mutex-guarded map. Every write
//! fans out a fresh snapshot to the listeners watching the written document
//! or a query over its collection. Deliveries happen under the store lock,
//! so each listener sees snapshots in write order.

use super::{
    Document, DocumentSnapshot, DocumentStore, Query, Snapshot, SnapshotListener, Unsubscribe,
};
use crate::error::{BoardError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, trace};

/// Store operations that can carry an injected fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    List,
    Subscribe,
    Add,
    Set,
    Update,
    Delete,
}

enum Target {
    Document(String),
    Query(Query),
}

struct Listener {
    collection: String,
    target: Target,
    sink: Arc<dyn SnapshotListener>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, Document>>,
    listeners: BTreeMap<u64, Listener>,
    next_listener_id: u64,
    faults: Vec<(StoreOp, BoardError)>,
}

impl Inner {
    fn take_fault(&mut self, op: StoreOp) -> Result<()> {
        match self.faults.iter().position(|(o, _)| *o == op) {
            Some(index) => Err(self.faults.remove(index).1),
            None => Ok(()),
        }
    }

    fn register(&mut self, collection: &str, target: Target, sink: Arc<dyn SnapshotListener>) -> u64 {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.insert(
            id,
            Listener {
                collection: collection.to_string(),
                target,
                sink,
            },
        );
        id
    }

    fn query_snapshot(&self, collection: &str, query: &Query) -> Vec<DocumentSnapshot> {
        match self.collections.get(collection) {
            Some(docs) => query.apply(docs),
            None => Vec::new(),
        }
    }

    fn document_snapshot(&self, collection: &str, id: &str) -> DocumentSnapshot {
        match self.collections.get(collection).and_then(|docs| docs.get(id)) {
            Some(data) => DocumentSnapshot::found(id, data.clone()),
            None => DocumentSnapshot::missing(id),
        }
    }

    /// Deliver snapshots for a write that moved `id` from `before` to the
    /// current stored state
    fn fan_out(&self, collection: &str, id: &str, before: Option<&Document>) {
        let after = self.collections.get(collection).and_then(|docs| docs.get(id));

        for listener in self.listeners.values() {
            if listener.collection != collection {
                continue;
            }
            match &listener.target {
                Target::Document(watched) if watched == id => {
                    listener
                        .sink
                        .on_next(Snapshot::Document(self.document_snapshot(collection, id)));
                }
                Target::Query(query) => {
                    let touched = before.map(|d| query.matches(d)).unwrap_or(false)
                        || after.map(|d| query.matches(d)).unwrap_or(false);
                    if touched {
                        listener
                            .sink
                            .on_next(Snapshot::Query(self.query_snapshot(collection, query)));
                    }
                }
                Target::Document(_) => {}
            }
        }
    }
}

/// In-memory [`DocumentStore`]
///
/// Cloning shares the underlying state, so several clients can act on the
/// same store the way independent browsers share one hosted database.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| BoardError::Internal(format!("Lock poisoned: {}", e)))
    }

    /// Make the next `op` fail with `error` (one-shot)
    pub fn inject_fault(&self, op: StoreOp, error: BoardError) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.faults.push((op, error));
        }
    }

    /// Fail every live feed on `collection`; the feeds are detached
    pub fn fail_listeners(&self, collection: &str, error: BoardError) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let ids: Vec<u64> = inner
            .listeners
            .iter()
            .filter(|(_, l)| l.collection == collection)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            if let Some(listener) = inner.listeners.remove(&id) {
                listener.sink.on_error(error.clone());
            }
        }
        debug!(collection = %collection, error = %error, "Failed live feeds");
    }

    /// Current stored state of a document, bypassing faults
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.collections.get(collection)?.get(id).cloned())
    }

    /// Number of attached live feeds
    pub fn listener_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.listeners.len()).unwrap_or(0)
    }

    fn detach_handle(&self, listener_id: u64) -> Unsubscribe {
        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Ok(mut inner) = inner.lock() {
                    inner.listeners.remove(&listener_id);
                    trace!(listener_id, "Listener detached");
                }
            }
        })
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Document> {
        let mut inner = self.lock()?;
        inner.take_fault(StoreOp::Get)?;
        inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
            .ok_or_else(|| BoardError::not_found(collection, id))
    }

    async fn list(&self, collection: &str, query: &Query) -> Result<Vec<DocumentSnapshot>> {
        let mut inner = self.lock()?;
        inner.take_fault(StoreOp::List)?;
        Ok(inner.query_snapshot(collection, query))
    }

    async fn subscribe_document(
        &self,
        collection: &str,
        id: &str,
        listener: Arc<dyn SnapshotListener>,
    ) -> Result<Unsubscribe> {
        let mut inner = self.lock()?;
        inner.take_fault(StoreOp::Subscribe)?;

        let listener_id = inner.register(collection, Target::Document(id.to_string()), listener.clone());
        listener.on_next(Snapshot::Document(inner.document_snapshot(collection, id)));

        debug!(collection = %collection, id = %id, listener_id, "Document feed attached");
        Ok(self.detach_handle(listener_id))
    }

    async fn subscribe_query(
        &self,
        collection: &str,
        query: &Query,
        listener: Arc<dyn SnapshotListener>,
    ) -> Result<Unsubscribe> {
        let mut inner = self.lock()?;
        inner.take_fault(StoreOp::Subscribe)?;

        let listener_id = inner.register(collection, Target::Query(query.clone()), listener.clone());
        listener.on_next(Snapshot::Query(inner.query_snapshot(collection, query)));

        debug!(collection = %collection, listener_id, "Query feed attached");
        Ok(self.detach_handle(listener_id))
    }

    async fn add(&self, collection: &str, data: Document) -> Result<String> {
        let mut inner = self.lock()?;
        inner.take_fault(StoreOp::Add)?;

        let id = uuid::Uuid::new_v4().simple().to_string();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        inner.fan_out(collection, &id, None);

        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<()> {
        let mut inner = self.lock()?;
        inner.take_fault(StoreOp::Set)?;

        let before = inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        inner.fan_out(collection, id, before.as_ref());

        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, partial: Document) -> Result<()> {
        let mut inner = self.lock()?;
        inner.take_fault(StoreOp::Update)?;

        let stored = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| BoardError::not_found(collection, id))?;
        let before = stored.clone();
        for (field, value) in partial {
            stored.insert(field, value);
        }
        inner.fan_out(collection, id, Some(&before));

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut inner = self.lock()?;
        inner.take_fault(StoreOp::Delete)?;

        let before = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .ok_or_else(|| BoardError::not_found(collection, id))?;
        inner.fan_out(collection, id, Some(&before));

        Ok(())
    }
}
