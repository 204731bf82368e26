//! Mutation engine
//!
//! Writes to link records. Votes and comments are embedded arrays, appended
//! with a read-modify-write round trip:
//!
//! ```text
//! get(links/{id}) ──► votes' = votes ++ [vote] ──► update({votes', voteCount'})
//! ```
//!
//! There is no compare-and-swap, version token or store-side array union.
//! Two clients appending concurrently can both read the same base array and
//! both write N+1 entries; the later write discards the earlier entry (lost
//! update). Callers get that behavior unchanged.
//!
//! Nothing is written locally before the round trip completes, so a failed
//! write leaves no state to roll back. Nothing is retried.

use crate::config::CollectionNames;
use crate::error::{BoardError, Result};
use crate::model::{Actor, Comment, NewLink, UserProfile, Vote};
use crate::store::{document, Document, DocumentStore};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Performs all writes the board issues
#[derive(Clone)]
pub struct MutationEngine {
    store: Arc<dyn DocumentStore>,
    collections: CollectionNames,
}

impl MutationEngine {
    pub fn new(store: Arc<dyn DocumentStore>, collections: CollectionNames) -> Self {
        Self { store, collections }
    }

    /// Append a vote; returns the length of the `votes` array written
    ///
    /// `voteCount` is recomputed from the written array, never incremented.
    /// The same voter may appear more than once.
    pub async fn append_vote(&self, link_id: &str, voter: &Actor) -> Result<usize> {
        let current = self.read_link(link_id).await?;

        let votes = appended(&current, link_id, "votes", serde_json::to_value(Vote::new(voter.clone()))?)?;
        let vote_count = votes.len();
        debug!(link_id = %link_id, voter = %voter.id, vote_count, "Writing votes");

        self.write_link(
            link_id,
            document(json!({
                "votes": votes,
                "voteCount": vote_count,
                "updatedAt": Utc::now().timestamp_millis(),
            })),
        )
        .await?;

        Ok(vote_count)
    }

    /// Append a comment; returns the length of the `comments` array written
    pub async fn append_comment(&self, link_id: &str, author: &Actor, text: &str) -> Result<usize> {
        let current = self.read_link(link_id).await?;

        let comment = Comment::new(author.clone(), text, Utc::now());
        let comments = appended(&current, link_id, "comments", serde_json::to_value(comment)?)?;
        let comment_count = comments.len();
        debug!(link_id = %link_id, author = %author.id, comment_count, "Writing comments");

        self.write_link(
            link_id,
            document(json!({
                "comments": comments,
                "updatedAt": Utc::now().timestamp_millis(),
            })),
        )
        .await?;

        Ok(comment_count)
    }

    /// Create a link posted by `author`; returns the store-assigned id
    pub async fn create_link(&self, author: &Actor, new_link: &NewLink) -> Result<String> {
        let doc = new_link.to_document(author, Utc::now());
        let id = self.store.add(&self.collections.links, doc).await?;
        info!(link_id = %id, author = %author.id, "Link created");
        Ok(id)
    }

    /// Create a category. Duplicate names are not checked.
    pub async fn create_category(&self, name: &str) -> Result<String> {
        let id = self
            .store
            .add(&self.collections.categories, document(json!({ "name": name })))
            .await?;
        info!(category_id = %id, name = %name, "Category created");
        Ok(id)
    }

    pub async fn delete_link(&self, link_id: &str) -> Result<()> {
        self.store
            .delete(&self.collections.links, link_id)
            .await
            .map_err(|e| gone_if_missing(e, link_id))?;
        info!(link_id = %link_id, "Link deleted");
        Ok(())
    }

    /// Create `users/{id}` unless it already exists; returns whether it wrote
    pub async fn ensure_profile(&self, user_id: &str, profile: &UserProfile) -> Result<bool> {
        match self.store.get(&self.collections.users, user_id).await {
            Ok(_) => Ok(false),
            Err(BoardError::NotFound { .. }) => {
                let doc = crate::model::encode(profile)?;
                self.store.set(&self.collections.users, user_id, doc).await?;
                info!(user_id = %user_id, "User profile created");
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    async fn read_link(&self, link_id: &str) -> Result<Document> {
        self.store
            .get(&self.collections.links, link_id)
            .await
            .map_err(|e| gone_if_missing(e, link_id))
    }

    async fn write_link(&self, link_id: &str, partial: Document) -> Result<()> {
        self.store
            .update(&self.collections.links, link_id, partial)
            .await
            .map_err(|e| gone_if_missing(e, link_id))
    }
}

fn gone_if_missing(error: BoardError, link_id: &str) -> BoardError {
    match error {
        BoardError::NotFound { .. } => BoardError::RecordGone(link_id.to_string()),
        other => other,
    }
}

/// The stored array under `field` with `entry` appended. Existing entries
/// are carried over verbatim.
fn appended(current: &Document, link_id: &str, field: &str, entry: Value) -> Result<Vec<Value>> {
    let mut entries = match current.get(field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(existing)) => existing.clone(),
        Some(_) => {
            return Err(BoardError::malformed(
                link_id,
                format!("`{}` is not an array", field),
            ))
        }
    };
    entries.push(entry);
    Ok(entries)
}
