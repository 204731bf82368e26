//! Session context
//!
//! The signed-in actor and the category list are the only process-wide
//! state. They are resolved once at [`Session::start`], replaced by the
//! sign-in/sign-out flows, and handed to actions as an immutable
//! [`BoardContext`] rather than read from ambient globals.

use crate::auth::{AuthIdentity, AuthProvider};
use crate::config::CollectionNames;
use crate::error::{BoardError, Result};
use crate::model::{Actor, Category, Record, UserProfile};
use crate::mutation::MutationEngine;
use crate::store::{Direction, DocumentSnapshot, DocumentStore, Query};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// What an action needs to know about who is acting and what exists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardContext {
    pub actor: Option<Actor>,
    pub categories: Vec<Category>,
}

impl BoardContext {
    pub fn signed_in(actor: Actor, categories: Vec<Category>) -> Self {
        Self {
            actor: Some(actor),
            categories,
        }
    }

    pub fn anonymous(categories: Vec<Category>) -> Self {
        Self {
            actor: None,
            categories,
        }
    }
}

pub struct Session {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn DocumentStore>,
    engine: MutationEngine,
    collections: CollectionNames,
    actor: RwLock<Option<Actor>>,
    categories: RwLock<Vec<Category>>,
}

impl Session {
    /// Resolve the current actor and load the category list
    pub async fn start(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        collections: CollectionNames,
    ) -> Result<Self> {
        let session = Self {
            engine: MutationEngine::new(store.clone(), collections.clone()),
            auth,
            store,
            collections,
            actor: RwLock::new(None),
            categories: RwLock::new(Vec::new()),
        };

        let actor = match session.auth.current_identity().await {
            Some(identity) => Some(session.resolve_actor(&identity).await?),
            None => None,
        };
        let categories = session.load_categories().await?;

        info!(
            signed_in = actor.is_some(),
            categories = categories.len(),
            "Session started"
        );
        *session.actor.write().await = actor;
        *session.categories.write().await = categories;
        Ok(session)
    }

    /// Register, create the profile document if absent, and sign in
    pub async fn sign_up(&self, display_name: &str, email: &str, password: &str) -> Result<Actor> {
        let identity = self.auth.register(email, password).await?;
        let profile = UserProfile::new(display_name, email, Utc::now());
        self.engine.ensure_profile(&identity.uid, &profile).await?;
        self.adopt(&identity).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Actor> {
        let identity = self.auth.login(email, password).await?;
        self.adopt(&identity).await
    }

    /// Federated sign-in; first use creates the profile document
    pub async fn sign_in_with_provider(&self) -> Result<Actor> {
        let identity = self.auth.sign_in_with_provider().await?;
        let fallback = identity.to_actor();
        let profile = UserProfile::new(
            fallback.display_name,
            identity.email.clone().unwrap_or_default(),
            Utc::now(),
        );
        self.engine.ensure_profile(&identity.uid, &profile).await?;
        self.adopt(&identity).await
    }

    pub async fn reset_password(&self, email: &str) -> Result<()> {
        self.auth.reset_password(email).await
    }

    /// Sign out; the actor is absent afterwards
    pub async fn sign_out(&self) -> Result<()> {
        self.auth.logout().await?;
        let previous = self.actor.write().await.take();
        info!(actor = ?previous.map(|a| a.id), "Signed out");
        Ok(())
    }

    /// Replace the cached category list (fed by a category subscription)
    pub async fn set_categories(&self, categories: Vec<Category>) {
        debug!(count = categories.len(), "Categories replaced");
        *self.categories.write().await = categories;
    }

    pub async fn actor(&self) -> Option<Actor> {
        self.actor.read().await.clone()
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.categories.read().await.clone()
    }

    pub async fn context(&self) -> BoardContext {
        BoardContext {
            actor: self.actor().await,
            categories: self.categories().await,
        }
    }

    async fn adopt(&self, identity: &AuthIdentity) -> Result<Actor> {
        let actor = self.resolve_actor(identity).await?;
        *self.actor.write().await = Some(actor.clone());
        info!(actor = %actor.id, "Signed in");
        Ok(actor)
    }

    /// The profile document's display name wins over the auth identity's
    async fn resolve_actor(&self, identity: &AuthIdentity) -> Result<Actor> {
        match self.store.get(&self.collections.users, &identity.uid).await {
            Ok(doc) => {
                let profile =
                    UserProfile::from_document(&DocumentSnapshot::found(identity.uid.as_str(), doc))?;
                if profile.display_name.trim().is_empty() {
                    Ok(identity.to_actor())
                } else {
                    Ok(Actor::new(identity.uid.clone(), profile.display_name))
                }
            }
            Err(BoardError::NotFound { .. }) => Ok(identity.to_actor()),
            Err(e) => Err(e),
        }
    }

    async fn load_categories(&self) -> Result<Vec<Category>> {
        let query = Query::new().order_by("name", Direction::Ascending);
        self.store
            .list(&self.collections.categories, &query)
            .await?
            .iter()
            .map(Category::from_document)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryAuth;
    use crate::error::AuthError;
    use crate::store::{document, MemoryStore};
    use serde_json::json;

    async fn start(store: &MemoryStore, auth: Arc<MemoryAuth>) -> Session {
        Session::start(auth, Arc::new(store.clone()), CollectionNames::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_anonymous_loads_categories() {
        let store = MemoryStore::new();
        for name in ["tools", "news"] {
            store
                .add("categories", document(json!({ "name": name })))
                .await
                .unwrap();
        }

        let session = start(&store, Arc::new(MemoryAuth::default())).await;
        let ctx = session.context().await;
        assert_eq!(ctx.actor, None);
        let names: Vec<_> = ctx.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["news", "tools"]);
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile_and_actor() {
        let store = MemoryStore::new();
        let session = start(&store, Arc::new(MemoryAuth::default())).await;

        let actor = session
            .sign_up("Ada", "ada@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(actor.display_name, "Ada");
        assert_eq!(session.actor().await, Some(actor.clone()));

        let profile = store.document("users", &actor.id).unwrap();
        assert_eq!(profile["displayName"], json!("Ada"));
        assert_eq!(profile["email"], json!("ada@example.com"));

        session.sign_out().await.unwrap();
        assert_eq!(session.actor().await, None);

        // profile name is re-resolved on sign-in
        let again = session.sign_in("ada@example.com", "secret1").await.unwrap();
        assert_eq!(again, actor);
    }

    #[tokio::test]
    async fn test_provider_sign_in_keeps_existing_profile() {
        let store = MemoryStore::new();
        store
            .set(
                "users",
                "g1",
                document(json!({
                    "displayName": "Bo the First",
                    "email": "bo@example.com",
                    "createdAt": 1,
                    "updatedAt": 1,
                })),
            )
            .await
            .unwrap();
        let auth = Arc::new(MemoryAuth::default().with_provider_account(AuthIdentity {
            uid: "g1".into(),
            email: Some("bo@example.com".into()),
            display_name: Some("Bo".into()),
        }));
        let session = start(&store, auth).await;

        let actor = session.sign_in_with_provider().await.unwrap();
        assert_eq!(actor.display_name, "Bo the First");
        assert_eq!(
            store.document("users", "g1").unwrap()["displayName"],
            json!("Bo the First")
        );
    }

    #[tokio::test]
    async fn test_auth_failure_leaves_actor_absent() {
        let store = MemoryStore::new();
        let session = start(&store, Arc::new(MemoryAuth::default())).await;

        let err = session
            .sign_in("ghost@example.com", "secret1")
            .await
            .unwrap_err();
        assert_eq!(err, BoardError::Auth(AuthError::UserNotFound));
        assert_eq!(session.actor().await, None);
    }

    #[tokio::test]
    async fn test_category_feed_replaces_context_list() {
        use crate::subscription::{SubjectUpdate, SubscriptionController};

        let store = MemoryStore::new();
        store
            .add("categories", document(json!({ "name": "tools" })))
            .await
            .unwrap();
        let session = start(&store, Arc::new(MemoryAuth::default())).await;

        let controller = SubscriptionController::new(Arc::new(store.clone()), CollectionNames::default());
        let mut feed = controller.watch_categories().await.unwrap();
        let _initial = feed.try_next();

        store
            .add("categories", document(json!({ "name": "news" })))
            .await
            .unwrap();
        match feed.try_next() {
            Some(SubjectUpdate::Snapshot(categories)) => session.set_categories(categories).await,
            other => panic!("unexpected update {:?}", other),
        }

        let names: Vec<_> = session
            .context()
            .await
            .categories
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["news", "tools"]);
    }

    #[tokio::test]
    async fn test_start_resumes_signed_in_identity() {
        let store = MemoryStore::new();
        let auth = Arc::new(MemoryAuth::default());
        let identity = auth.register("cy@example.com", "secret1").await.unwrap();

        let session = start(&store, auth).await;
        assert_eq!(
            session.actor().await,
            Some(Actor::new(identity.uid, "cy"))
        );
    }
}
