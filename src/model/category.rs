//! Link categories

use super::{decode, Record};
use crate::error::Result;
use crate::store::DocumentSnapshot;
use serde::{Deserialize, Serialize};

/// A category. Names are unique by convention only; concurrent adds of the
/// same name both land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(skip)]
    pub id: String,
    pub name: String,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn exists_in(categories: &[Category], name: &str) -> bool {
        categories.iter().any(|c| c.name == name)
    }
}

impl Record for Category {
    fn from_document(snapshot: &DocumentSnapshot) -> Result<Self> {
        let mut category: Category = decode(snapshot)?;
        category.id = snapshot.id.clone();
        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoardError;
    use crate::store::document;
    use serde_json::json;

    #[test]
    fn test_category_from_document() {
        let c = Category::from_document(&DocumentSnapshot::found(
            "c1",
            document(json!({"name": "tools"})),
        ))
        .unwrap();
        assert_eq!(c, Category::new("c1", "tools"));
        assert!(Category::exists_in(&[c], "tools"));
    }

    #[test]
    fn test_category_without_name_is_malformed() {
        let err = Category::from_document(&DocumentSnapshot::found("c1", document(json!({}))))
            .unwrap_err();
        assert!(matches!(err, BoardError::MalformedRecord { .. }));
    }
}
