//! Read-barrier store wrapper
//!
//! Holds every `get` result until `parties` readers have read, then releases
//! them together. Concurrent read-modify-write callers therefore all compute
//! their writes from the same base state, which is how two clients racing
//! over the network interleave.

use super::{Document, DocumentSnapshot, DocumentStore, Query, SnapshotListener, Unsubscribe};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Barrier;
use tracing::trace;

pub struct ReadBarrierStore {
    inner: Arc<dyn DocumentStore>,
    barrier: Barrier,
}

impl ReadBarrierStore {
    pub fn new(inner: Arc<dyn DocumentStore>, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties.max(1)),
        }
    }
}

#[async_trait]
impl DocumentStore for ReadBarrierStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Document> {
        let read = self.inner.get(collection, id).await;
        trace!(collection = %collection, id = %id, "Read parked at barrier");
        self.barrier.wait().await;
        read
    }

    async fn list(&self, collection: &str, query: &Query) -> Result<Vec<DocumentSnapshot>> {
        self.inner.list(collection, query).await
    }

    async fn subscribe_document(
        &self,
        collection: &str,
        id: &str,
        listener: Arc<dyn SnapshotListener>,
    ) -> Result<Unsubscribe> {
        self.inner.subscribe_document(collection, id, listener).await
    }

    async fn subscribe_query(
        &self,
        collection: &str,
        query: &Query,
        listener: Arc<dyn SnapshotListener>,
    ) -> Result<Unsubscribe> {
        self.inner.subscribe_query(collection, query, listener).await
    }

    async fn add(&self, collection: &str, data: Document) -> Result<String> {
        self.inner.add(collection, data).await
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<()> {
        self.inner.set(collection, id, data).await
    }

    async fn update(&self, collection: &str, id: &str, partial: Document) -> Result<()> {
        self.inner.update(collection, id, partial).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.inner.delete(collection, id).await
    }
}
