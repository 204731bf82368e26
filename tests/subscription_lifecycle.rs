//! Integration tests for subscription teardown
//!
//! The store here never honors unsubscribe: listeners stay attached and
//! keep receiving snapshots after the view closed, the way an in-flight
//! network response can still land. Nothing may reach the consumer anyway.

use async_trait::async_trait;
use linkboard_client::store::document;
use linkboard_client::{
    Actor, BoardError, CollectionNames, Document, DocumentSnapshot, DocumentStore, Link,
    LinkListing, MemoryStore, MutationEngine, NewLink, Query, Result, Snapshot, SnapshotListener,
    SubjectUpdate, SubscriptionController, SubscriptionState, Unsubscribe,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::time::{timeout, Duration};

#[derive(Default)]
struct LeakyStore {
    listeners: Mutex<Vec<Arc<dyn SnapshotListener>>>,
}

impl LeakyStore {
    fn emit(&self, description: &str) {
        let snapshot = Snapshot::Document(DocumentSnapshot::found("l1", link_doc(description)));
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_next(snapshot.clone());
        }
    }

    fn fail(&self, error: BoardError) {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_error(error.clone());
        }
    }
}

fn link_doc(description: &str) -> Document {
    document(json!({
        "description": description,
        "url": "http://x.com",
        "category": "tools",
        "postedBy": {"id": "u1", "displayName": "Ada"},
        "createdAt": 1_000,
    }))
}

#[async_trait]
impl DocumentStore for LeakyStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Document> {
        Err(BoardError::not_found(collection, id))
    }

    async fn list(&self, _collection: &str, _query: &Query) -> Result<Vec<DocumentSnapshot>> {
        Ok(Vec::new())
    }

    async fn subscribe_document(
        &self,
        _collection: &str,
        _id: &str,
        listener: Arc<dyn SnapshotListener>,
    ) -> Result<Unsubscribe> {
        self.listeners.lock().unwrap().push(listener);
        Ok(Unsubscribe::noop())
    }

    async fn subscribe_query(
        &self,
        _collection: &str,
        _query: &Query,
        listener: Arc<dyn SnapshotListener>,
    ) -> Result<Unsubscribe> {
        self.listeners.lock().unwrap().push(listener);
        Ok(Unsubscribe::noop())
    }

    async fn add(&self, _collection: &str, _data: Document) -> Result<String> {
        Err(BoardError::Unavailable("read-only".into()))
    }

    async fn set(&self, _collection: &str, _id: &str, _data: Document) -> Result<()> {
        Err(BoardError::Unavailable("read-only".into()))
    }

    async fn update(&self, _collection: &str, _id: &str, _partial: Document) -> Result<()> {
        Err(BoardError::Unavailable("read-only".into()))
    }

    async fn delete(&self, _collection: &str, _id: &str) -> Result<()> {
        Err(BoardError::Unavailable("read-only".into()))
    }
}

fn controller(store: &Arc<LeakyStore>) -> SubscriptionController {
    SubscriptionController::new(store.clone(), CollectionNames::default())
}

/// One snapshot, close, then a late snapshot: zero deliveries after close
#[tokio::test]
async fn test_late_snapshot_after_close() {
    let store = Arc::new(LeakyStore::default());
    let mut sub = controller(&store).watch_link("l1").await.unwrap();
    assert_eq!(sub.state(), SubscriptionState::Subscribing);

    store.emit("first");
    match timeout(Duration::from_millis(100), sub.next()).await.unwrap() {
        Some(SubjectUpdate::Snapshot(link)) => assert_eq!(link.description, "first"),
        other => panic!("unexpected update {:?}", other),
    }
    assert_eq!(sub.state(), SubscriptionState::Live);

    sub.close();
    store.emit("late");

    assert_eq!(sub.state(), SubscriptionState::Closed);
    assert!(sub.try_next().is_none());
    assert!(timeout(Duration::from_millis(100), sub.next())
        .await
        .unwrap()
        .is_none());
}

/// Snapshots queued but unconsumed at close are discarded
#[tokio::test]
async fn test_pending_snapshots_discarded_on_close() {
    let store = Arc::new(LeakyStore::default());
    let mut sub = controller(&store).watch_link("l1").await.unwrap();

    store.emit("one");
    store.emit("two");
    sub.close();
    store.emit("three");

    assert!(sub.try_next().is_none());
}

/// Emissions racing the close from another thread never surface afterwards
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_races_emitter() {
    for round in 0..50 {
        let store = Arc::new(LeakyStore::default());
        let mut sub: linkboard_client::LiveSubscription<Link> =
            controller(&store).watch_link("l1").await.unwrap();

        let emitter = {
            let store = store.clone();
            std::thread::spawn(move || {
                for n in 0..200 {
                    store.emit(&format!("round {} snapshot {}", round, n));
                }
            })
        };

        // consume a little, then close mid-stream
        let _ = sub.try_next();
        sub.close();
        let after_close = sub.try_next();

        emitter.join().unwrap();
        assert!(after_close.is_none());
        assert!(sub.try_next().is_none());
        assert_eq!(sub.state(), SubscriptionState::Closed);
    }
}

/// A feed error after close is dropped too
#[tokio::test]
async fn test_error_after_close_is_dropped() {
    let store = Arc::new(LeakyStore::default());
    let mut sub = controller(&store).watch_link("l1").await.unwrap();
    sub.close();

    store.fail(BoardError::PermissionDenied("rules".into()));
    assert_eq!(sub.state(), SubscriptionState::Closed);
    assert!(sub.try_next().is_none());
}

/// Error is terminal: later snapshots do not revive the feed
#[tokio::test]
async fn test_error_is_terminal() {
    let store = Arc::new(LeakyStore::default());
    let mut sub = controller(&store).watch_link("l1").await.unwrap();

    store.fail(BoardError::Unavailable("connection reset".into()));
    store.emit("after error");

    assert_eq!(
        sub.next().await,
        Some(SubjectUpdate::Failed(BoardError::Unavailable(
            "connection reset".into()
        )))
    );
    assert_eq!(sub.state(), SubscriptionState::Error);
    assert_eq!(sub.next().await, None);

    sub.close();
    assert_eq!(sub.state(), SubscriptionState::Closed);
}

/// Dropping the handle closes the subject
#[tokio::test]
async fn test_drop_closes() {
    let store = Arc::new(LeakyStore::default());
    let sub = controller(&store).watch_link("l1").await.unwrap();
    let subject = sub.subject().clone();
    drop(sub);

    // the leaked listener still fires; with the consumer gone it must not panic
    store.emit("orphan");
    assert_eq!(subject.to_string(), "links/l1");
}

fn vote_lengths(updates: impl IntoIterator<Item = SubjectUpdate<Link>>) -> Vec<usize> {
    updates
        .into_iter()
        .filter_map(|update| match update {
            SubjectUpdate::Snapshot(link) => Some(link.votes.len()),
            _ => None,
        })
        .collect()
}

/// A stale read-modify-write shortens the stored votes; the reader keeps its view
#[tokio::test]
async fn test_votes_never_shrink_for_a_reader() {
    let store = MemoryStore::new();
    let engine = MutationEngine::new(Arc::new(store.clone()), CollectionNames::default());
    let id = engine
        .create_link(
            &Actor::new("u1", "Ada"),
            &NewLink::new("Hello", "http://x.com", "tools"),
        )
        .await
        .unwrap();

    let controller = SubscriptionController::new(Arc::new(store.clone()), CollectionNames::default());
    let mut sub = controller.watch_link(&id).await.unwrap();
    let mut delivered = vec![sub.try_next().unwrap()];

    for voter in [Actor::new("u2", "Bo"), Actor::new("u3", "Cy")] {
        engine.append_vote(&id, &voter).await.unwrap();
        delivered.push(sub.try_next().unwrap());
    }

    // Ada read `votes = []` before Bo and Cy voted, then wrote back her own vote
    store
        .update(
            "links",
            &id,
            document(json!({
                "votes": [{"voteBy": {"id": "u1", "name": "Ada"}}],
                "voteCount": 1,
            })),
        )
        .await
        .unwrap();
    assert_eq!(
        sub.try_next(),
        Some(SubjectUpdate::Invalid(BoardError::StaleSnapshot {
            key: format!("{}/votes", id),
            seen: 2,
            delivered: 1,
        }))
    );
    assert_eq!(sub.state(), SubscriptionState::Live);

    // the next vote reads the shortened array and brings it back to two
    engine.append_vote(&id, &Actor::new("u4", "Di")).await.unwrap();
    delivered.push(sub.try_next().unwrap());

    assert_eq!(vote_lengths(delivered), vec![0, 1, 2, 2]);
}

/// List feeds track every member; a shrunken comment list is refused
#[tokio::test]
async fn test_listing_comments_never_shrink() {
    let store = MemoryStore::new();
    let engine = MutationEngine::new(Arc::new(store.clone()), CollectionNames::default());
    let id = engine
        .create_link(
            &Actor::new("u1", "Ada"),
            &NewLink::new("Hello", "http://x.com", "tools"),
        )
        .await
        .unwrap();

    let controller = SubscriptionController::new(Arc::new(store.clone()), CollectionNames::default());
    let mut sub = controller.watch_links(&LinkListing::New).await.unwrap();
    assert!(matches!(sub.try_next(), Some(SubjectUpdate::Snapshot(links)) if links.len() == 1));

    engine
        .append_comment(&id, &Actor::new("u2", "Bo"), "nice!")
        .await
        .unwrap();
    match sub.try_next() {
        Some(SubjectUpdate::Snapshot(links)) => assert_eq!(links[0].comments.len(), 1),
        other => panic!("unexpected update {:?}", other),
    }

    store
        .update("links", &id, document(json!({ "comments": [] })))
        .await
        .unwrap();
    assert!(matches!(
        sub.try_next(),
        Some(SubjectUpdate::Invalid(BoardError::StaleSnapshot { seen: 1, delivered: 0, .. }))
    ));
}
