//! Actor identities and user profile documents

use super::{decode, Record};
use crate::error::Result;
use crate::store::DocumentSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An identity as captured in a record (poster, voter, commenter)
///
/// Captured at write time and never re-resolved. A link's poster is written
/// with `displayName`; votes and comments carry `name` (see `as_named`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,

    #[serde(rename = "displayName", alias = "name", default)]
    pub display_name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Vote and comment authors travel as `{id, name}`; either field name is read
pub(crate) mod as_named {
    use super::Actor;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct Named<'a> {
        id: &'a str,
        name: &'a str,
    }

    pub fn serialize<S: Serializer>(actor: &Actor, serializer: S) -> Result<S::Ok, S::Error> {
        Named {
            id: &actor.id,
            name: &actor.display_name,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Actor, D::Error> {
        Actor::deserialize(deserializer)
    }
}

/// `users/{id}` profile document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub email: String,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(display_name: impl Into<String>, email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            display_name: display_name.into(),
            email: email.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for UserProfile {
    fn from_document(snapshot: &DocumentSnapshot) -> Result<Self> {
        decode(snapshot)
    }
}
