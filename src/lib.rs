//! Linkboard client core
//!
//! Client-side core of a link-sharing board: users post links, vote and
//! comment on them, and watch lists and detail views update live as other
//! clients write.
//!
//! # Architecture
//!
//! ```text
//!   view ──► BoardActions ──► ActionGuard ──► MutationEngine ──► DocumentStore
//!                 │                 │                               │
//!                 ▼                 ▼                               ▼
//!          NotificationBus      Navigator          SubscriptionController ──► view
//! ```
//!
//! - **store**: the collaborator document database (`links`, `categories`,
//!   `users`) behind one trait, with an in-process [`MemoryStore`]
//! - **subscription**: one live feed per viewed subject, closed on every
//!   exit path of the owning view
//! - **mutation**: read-modify-write appends of votes and comments. The
//!   lost-update race between concurrent writers is kept as-is.
//! - **guard**: sign-in redirect instead of running a mutating action for
//!   an anonymous user
//!
//! # Example
//!
//! ```rust,ignore
//! use linkboard_client::{BoardActions, MemoryStore, MutationEngine, NotificationBus};
//!
//! let store = Arc::new(MemoryStore::new());
//! let engine = MutationEngine::new(store.clone(), CollectionNames::default());
//! let actions = BoardActions::new(engine, NotificationBus::new(), navigator);
//!
//! // Redirects to sign-in when ctx carries no actor
//! let outcome = actions.vote(&session.context().await, "link-id").await;
//! ```

// Document store boundary
pub mod store;

// Typed records and snapshot normalization
pub mod model;

// Live subscriptions
pub mod subscription;

// Writes
pub mod mutation;

// Flash banners
pub mod bus;

// Sign-in gate and navigation
pub mod guard;

// Auth collaborator
pub mod auth;

// Actor and categories
pub mod session;

// View-level flows
pub mod actions;

// Hosted search index
pub mod search;

pub mod config;

// Error types
pub mod error;

pub use store::{
    Document, DocumentSnapshot, DocumentStore, MemoryStore, Query, Snapshot, SnapshotListener,
    StoreOp, Unsubscribe,
};

#[cfg(feature = "sim")]
pub use store::ReadBarrierStore;

pub use model::{Actor, Category, Comment, FromSnapshot, Link, NewLink, Record, UserProfile, Vote};

pub use subscription::{
    LinkListing, LiveSubscription, Subject, SubjectUpdate, SubscriptionController,
    SubscriptionState,
};

pub use mutation::MutationEngine;

pub use bus::{FlashKind, FlashMessage, NotificationBus};

pub use guard::{ActionGuard, Guarded, Navigator, RecordingNavigator, Route};

pub use auth::{AuthIdentity, AuthProvider, MemoryAuth};

pub use session::{BoardContext, Session};

pub use actions::BoardActions;

pub use search::{HostedSearchClient, SearchHit, SearchIndex, SearchRequest, SearchResults};

pub use config::{BoardConfig, CollectionNames, SearchConfig};

pub use error::{AuthError, BoardError, Result};
