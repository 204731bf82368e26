//! Record model
//!
//! Typed shapes of the documents the board reads and writes, and the
//! normalization from raw store snapshots into them. Normalization is pure
//! and total: a well-formed document always yields a record, anything else
//! yields `MalformedRecord` (or `RecordGone` for a deleted document).

mod actor;
mod category;
mod link;

pub use actor::{Actor, UserProfile};
pub use category::Category;
pub use link::{Comment, Link, NewLink, Vote};

use crate::error::{BoardError, Result};
use crate::store::{Document, DocumentSnapshot, Snapshot};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A typed entity that lives as one document in a collection
pub trait Record: Sized + Send + 'static {
    fn from_document(snapshot: &DocumentSnapshot) -> Result<Self>;

    /// Lengths of the append-only sequences embedded in this record, keyed
    /// `{id}/{field}`. A reader must never see one of them get shorter.
    fn append_only_lengths(&self) -> Vec<(String, usize)> {
        Vec::new()
    }
}

/// Normalization of a whole live-feed delivery
pub trait FromSnapshot: Sized + Send + 'static {
    fn from_snapshot(snapshot: Snapshot) -> Result<Self>;

    /// See [`Record::append_only_lengths`]
    fn append_only_lengths(&self) -> Vec<(String, usize)> {
        Vec::new()
    }
}

impl FromSnapshot for Link {
    fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        match snapshot {
            Snapshot::Document(doc) => Link::from_document(&doc),
            Snapshot::Query(_) => Err(BoardError::Internal(
                "query snapshot delivered to a single-record subject".into(),
            )),
        }
    }

    fn append_only_lengths(&self) -> Vec<(String, usize)> {
        Record::append_only_lengths(self)
    }
}

impl FromSnapshot for Category {
    fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        match snapshot {
            Snapshot::Document(doc) => Category::from_document(&doc),
            Snapshot::Query(_) => Err(BoardError::Internal(
                "query snapshot delivered to a single-record subject".into(),
            )),
        }
    }
}

/// A list snapshot is malformed as a whole if any member is
impl<T: Record> FromSnapshot for Vec<T> {
    fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        match snapshot {
            Snapshot::Query(docs) => docs.iter().map(T::from_document).collect(),
            Snapshot::Document(_) => Err(BoardError::Internal(
                "document snapshot delivered to a list subject".into(),
            )),
        }
    }

    fn append_only_lengths(&self) -> Vec<(String, usize)> {
        self.iter().flat_map(Record::append_only_lengths).collect()
    }
}

/// Deserialize a snapshot body, mapping absence and shape errors
pub(crate) fn decode<T: DeserializeOwned>(snapshot: &DocumentSnapshot) -> Result<T> {
    let data = snapshot
        .data
        .as_ref()
        .ok_or_else(|| BoardError::RecordGone(snapshot.id.clone()))?;

    serde_json::from_value(serde_json::Value::Object(data.clone()))
        .map_err(|e| BoardError::malformed(&snapshot.id, e.to_string()))
}

/// Serialize a value that must encode as a JSON object
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(BoardError::Serialization(format!(
            "expected an object, got {}",
            other
        ))),
    }
}
