//! Link records with embedded votes and comments

use super::{decode, Actor, Category, Record};
use crate::error::{BoardError, Result};
use crate::store::{document, Document, DocumentSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One upvote. No timestamp and no uniqueness: an actor can appear twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "voteBy", with = "super::actor::as_named")]
    pub vote_by: Actor,
}

impl Vote {
    pub fn new(voter: Actor) -> Self {
        Self { vote_by: voter }
    }
}

/// One comment. Append-only, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(with = "super::actor::as_named")]
    pub posted_by: Actor,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created: DateTime<Utc>,

    #[serde(default)]
    pub text: String,
}

impl Comment {
    pub fn new(author: Actor, text: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            posted_by: author,
            created,
            text: text.into(),
        }
    }
}

/// Wire shape of a `links` document
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkDocument {
    description: String,
    url: String,
    #[serde(default)]
    category: String,
    posted_by: Actor,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    votes: Vec<Vote>,
    #[serde(default)]
    comments: Vec<Comment>,
    #[serde(default)]
    vote_count: Option<usize>,
}

/// A submitted link as the board shows it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub description: String,
    pub url: String,
    pub category: String,
    pub posted_by: Actor,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    /// Denormalized counter as stored; writers keep it at `votes.len()`
    pub vote_count: usize,
    pub votes: Vec<Vote>,
    pub comments: Vec<Comment>,
}

impl Record for Link {
    fn from_document(snapshot: &DocumentSnapshot) -> Result<Self> {
        let raw: LinkDocument = decode(snapshot)?;
        let vote_count = raw.vote_count.unwrap_or(raw.votes.len());

        Ok(Link {
            id: snapshot.id.clone(),
            description: raw.description,
            url: raw.url,
            category: raw.category,
            posted_by: raw.posted_by,
            created_at: raw.created_at,
            updated_at: raw.updated_at.unwrap_or(raw.created_at),
            vote_count,
            votes: raw.votes,
            comments: raw.comments,
        })
    }

    fn append_only_lengths(&self) -> Vec<(String, usize)> {
        vec![
            (format!("{}/votes", self.id), self.votes.len()),
            (format!("{}/comments", self.id), self.comments.len()),
        ]
    }
}

impl Link {
    /// Host part of the url, without a leading `www.`
    pub fn domain(&self) -> Option<String> {
        let parsed = url::Url::parse(&self.url).ok()?;
        let host = parsed.host_str()?;
        Some(host.strip_prefix("www.").unwrap_or(host).to_string())
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    /// Only the poster is offered deletion
    pub fn is_posted_by(&self, actor: &Actor) -> bool {
        self.posted_by.id == actor.id
    }

    pub fn has_voted(&self, actor: &Actor) -> bool {
        self.votes.iter().any(|v| v.vote_by.id == actor.id)
    }
}

/// Input of the create-link form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLink {
    pub description: String,
    pub url: String,
    pub category: String,
}

impl NewLink {
    pub fn new(
        description: impl Into<String>,
        url: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            url: url.into(),
            category: category.into(),
        }
    }

    /// Form-level checks against the known category list
    pub fn validate(&self, categories: &[Category]) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(BoardError::Validation("A description is required".into()));
        }

        match url::Url::parse(self.url.trim()) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => {
                return Err(BoardError::Validation(
                    "The URL must be a valid http(s) address".into(),
                ))
            }
        }

        if self.category.trim().is_empty() {
            return Err(BoardError::Validation("A category is required".into()));
        }
        if !Category::exists_in(categories, &self.category) {
            return Err(BoardError::Validation("You should add this category".into()));
        }

        Ok(())
    }

    /// Full document for a fresh record: empty votes and comments, zero count
    pub fn to_document(&self, posted_by: &Actor, now: DateTime<Utc>) -> Document {
        let millis = now.timestamp_millis();
        document(json!({
            "description": self.description,
            "url": self.url,
            "category": self.category,
            "postedBy": posted_by,
            "voteCount": 0,
            "votes": [],
            "comments": [],
            "createdAt": millis,
            "updatedAt": millis,
        }))
    }
}
