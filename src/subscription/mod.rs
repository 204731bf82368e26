//! Subscription controller
//!
//! One live feed per viewed subject (a single record or a query-defined
//! list), with a small state machine per subject:
//!
//! ```text
//! Idle ──► Subscribing ──► Live ──► Closed
//!                │           │
//!                └─► Error ◄─┘      (terminal, no auto-resubscribe)
//! ```
//!
//! - every snapshot re-enters `Live` and fully replaces the consumer's view
//! - snapshots reach the consumer in the order the store emitted them
//! - after `Closed` nothing is delivered, including snapshots already in
//!   flight when the view went away
//! - a snapshot that fails normalization is reported as
//!   [`SubjectUpdate::Invalid`] without closing the feed

mod live;

pub use live::{LiveSubscription, SubjectUpdate};

use crate::config::CollectionNames;
use crate::error::Result;
use crate::model::{Category, FromSnapshot, Link};
use crate::store::{Direction, DocumentStore, Query, SnapshotListener};
use live::{Relay, SetupGuard, Shared};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Lifecycle of one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Idle,
    Subscribing,
    Live,
    Closed,
    Error,
}

/// What a subscription watches
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    Record { collection: String, id: String },
    Query { collection: String, query: Query },
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Record { collection, id } => write!(f, "{}/{}", collection, id),
            Subject::Query { collection, .. } => write!(f, "{}?query", collection),
        }
    }
}

/// Link list views
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkListing {
    /// Most recent first
    New,
    /// Most voted first
    Top,
    /// One category, most recent first
    Category(String),
}

impl LinkListing {
    pub fn to_query(&self) -> Query {
        match self {
            LinkListing::New => Query::new().order_by("createdAt", Direction::Descending),
            LinkListing::Top => Query::new().order_by("voteCount", Direction::Descending),
            LinkListing::Category(name) => Query::new()
                .where_eq("category", name.as_str())
                .order_by("createdAt", Direction::Descending),
        }
    }
}

/// Opens live subscriptions against the document store
#[derive(Clone)]
pub struct SubscriptionController {
    store: Arc<dyn DocumentStore>,
    collections: CollectionNames,
}

impl SubscriptionController {
    pub fn new(store: Arc<dyn DocumentStore>, collections: CollectionNames) -> Self {
        Self { store, collections }
    }

    /// Open a subscription for any subject
    ///
    /// Fails (and leaves the subject in `Error`) only if the adapter refuses
    /// to set up the feed.
    pub async fn open<T: FromSnapshot>(&self, subject: Subject) -> Result<LiveSubscription<T>> {
        let shared = Shared::new(subject);
        let (tx, rx) = mpsc::unbounded_channel();
        let relay: Arc<dyn SnapshotListener> = Arc::new(Relay::new(shared.clone(), tx));

        shared.transition(SubscriptionState::Subscribing);
        let guard = SetupGuard::arm(shared.clone());

        let attached = match &shared.subject {
            Subject::Record { collection, id } => {
                self.store.subscribe_document(collection, id, relay).await
            }
            Subject::Query { collection, query } => {
                self.store.subscribe_query(collection, query, relay).await
            }
        };

        match attached {
            Ok(unsubscribe) => {
                guard.disarm();
                debug!(subject = %shared.subject, state = ?shared.state(), "Subscription opened");
                Ok(LiveSubscription::new(shared, rx, unsubscribe))
            }
            Err(error) => {
                shared.transition(SubscriptionState::Error);
                guard.disarm();
                warn!(subject = %shared.subject, error = %error, "Subscription setup failed");
                Err(error)
            }
        }
    }

    /// Watch one link (detail view)
    pub async fn watch_link(&self, link_id: &str) -> Result<LiveSubscription<Link>> {
        self.open(Subject::Record {
            collection: self.collections.links.clone(),
            id: link_id.to_string(),
        })
        .await
    }

    /// Watch a link list
    pub async fn watch_links(&self, listing: &LinkListing) -> Result<LiveSubscription<Vec<Link>>> {
        self.open(Subject::Query {
            collection: self.collections.links.clone(),
            query: listing.to_query(),
        })
        .await
    }

    /// Watch the category list, alphabetical
    pub async fn watch_categories(&self) -> Result<LiveSubscription<Vec<Category>>> {
        self.open(Subject::Query {
            collection: self.collections.categories.clone(),
            query: Query::new().order_by("name", Direction::Ascending),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoardError;
    use crate::store::{document, MemoryStore, StoreOp};
    use serde_json::json;
    use tokio::time::{timeout, Duration};

    fn link_doc(description: &str) -> crate::store::Document {
        document(json!({
            "description": description,
            "url": "http://x.com",
            "category": "tools",
            "postedBy": {"id": "u1", "displayName": "Ada"},
            "createdAt": 1_000,
        }))
    }

    fn controller(store: &MemoryStore) -> SubscriptionController {
        SubscriptionController::new(Arc::new(store.clone()), CollectionNames::default())
    }

    #[tokio::test]
    async fn test_record_subscription_delivers_in_order() {
        let store = MemoryStore::new();
        let id = store.add("links", link_doc("first")).await.unwrap();
        let mut sub = controller(&store).watch_link(&id).await.unwrap();
        assert_eq!(sub.state(), SubscriptionState::Live);

        store
            .update("links", &id, document(json!({"description": "second"})))
            .await
            .unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            match timeout(Duration::from_millis(100), sub.next()).await.unwrap() {
                Some(SubjectUpdate::Snapshot(link)) => seen.push(link.description),
                other => panic!("unexpected update {:?}", other),
            }
        }
        assert_eq!(seen, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_malformed_snapshot_keeps_feed_live() {
        let store = MemoryStore::new();
        let id = store.add("links", link_doc("ok")).await.unwrap();
        let mut sub = controller(&store).watch_link(&id).await.unwrap();
        assert!(matches!(sub.next().await, Some(SubjectUpdate::Snapshot(_))));

        store
            .update("links", &id, document(json!({"description": 42})))
            .await
            .unwrap();
        assert!(matches!(
            sub.next().await,
            Some(SubjectUpdate::Invalid(BoardError::MalformedRecord { .. }))
        ));
        assert_eq!(sub.state(), SubscriptionState::Live);

        store
            .update("links", &id, document(json!({"description": "fixed"})))
            .await
            .unwrap();
        match sub.next().await {
            Some(SubjectUpdate::Snapshot(link)) => assert_eq!(link.description, "fixed"),
            other => panic!("unexpected update {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deleted_record_reports_gone() {
        let store = MemoryStore::new();
        let id = store.add("links", link_doc("doomed")).await.unwrap();
        let mut sub = controller(&store).watch_link(&id).await.unwrap();
        sub.next().await;

        store.delete("links", &id).await.unwrap();
        assert_eq!(
            sub.next().await,
            Some(SubjectUpdate::Invalid(BoardError::RecordGone(id.clone())))
        );
    }

    #[tokio::test]
    async fn test_feed_error_is_terminal() {
        let store = MemoryStore::new();
        let mut sub = controller(&store)
            .watch_links(&LinkListing::New)
            .await
            .unwrap();
        assert_eq!(sub.next().await, Some(SubjectUpdate::Snapshot(vec![])));

        store.fail_listeners("links", BoardError::PermissionDenied("rules".into()));
        assert_eq!(
            sub.next().await,
            Some(SubjectUpdate::Failed(BoardError::PermissionDenied("rules".into())))
        );
        assert_eq!(sub.state(), SubscriptionState::Error);
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_setup_failure_surfaces() {
        let store = MemoryStore::new();
        store.inject_fault(StoreOp::Subscribe, BoardError::Unavailable("offline".into()));

        let result = controller(&store).watch_link("l1").await;
        assert_eq!(result.err(), Some(BoardError::Unavailable("offline".into())));
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_close_detaches_and_discards_pending() {
        let store = MemoryStore::new();
        let id = store.add("links", link_doc("one")).await.unwrap();
        let mut sub = controller(&store).watch_link(&id).await.unwrap();
        assert_eq!(store.listener_count(), 1);

        // queued but never consumed
        store
            .update("links", &id, document(json!({"description": "two"})))
            .await
            .unwrap();

        sub.close();
        sub.close();
        assert_eq!(sub.state(), SubscriptionState::Closed);
        assert_eq!(store.listener_count(), 0);
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_drop_detaches() {
        let store = MemoryStore::new();
        {
            let _sub = controller(&store)
                .watch_categories()
                .await
                .unwrap();
            assert_eq!(store.listener_count(), 1);
        }
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_listing_queries() {
        let store = MemoryStore::new();
        for (description, category, votes, created) in [
            ("a", "tools", 1, 10),
            ("b", "news", 5, 20),
            ("c", "tools", 3, 30),
        ] {
            let mut doc = link_doc(description);
            doc.insert("category".into(), json!(category));
            doc.insert("voteCount".into(), json!(votes));
            doc.insert("createdAt".into(), json!(created));
            store.add("links", doc).await.unwrap();
        }
        let controller = controller(&store);

        let descriptions = |update: Option<SubjectUpdate<Vec<Link>>>| match update {
            Some(SubjectUpdate::Snapshot(links)) => links
                .into_iter()
                .map(|l| l.description)
                .collect::<Vec<_>>(),
            other => panic!("unexpected update {:?}", other),
        };

        let mut newest = controller.watch_links(&LinkListing::New).await.unwrap();
        assert_eq!(descriptions(newest.next().await), vec!["c", "b", "a"]);

        let mut top = controller.watch_links(&LinkListing::Top).await.unwrap();
        assert_eq!(descriptions(top.next().await), vec!["b", "c", "a"]);

        let mut tools = controller
            .watch_links(&LinkListing::Category("tools".into()))
            .await
            .unwrap();
        assert_eq!(descriptions(tools.next().await), vec!["c", "a"]);
    }
}
