//! Auth collaborator boundary
//!
//! The core never owns credentials. It asks an [`AuthProvider`] for an
//! identity and passes its failures (`AuthError`) through to the user
//! unchanged.

mod memory;

pub use memory::MemoryAuth;

use crate::error::Result;
use crate::model::Actor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity returned by the auth collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl AuthIdentity {
    /// Actor for this identity, naming it after `display_name`, the email
    /// local part, or the uid, whichever is present first
    pub fn to_actor(&self) -> Actor {
        let name = self
            .display_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| self.uid.clone());
        Actor::new(self.uid.clone(), name)
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn register(&self, email: &str, password: &str) -> Result<AuthIdentity>;

    async fn login(&self, email: &str, password: &str) -> Result<AuthIdentity>;

    async fn logout(&self) -> Result<()>;

    async fn reset_password(&self, email: &str) -> Result<()>;

    /// Federated sign-in (a single configured provider)
    async fn sign_in_with_provider(&self) -> Result<AuthIdentity>;

    /// Identity of the signed-in user, if any
    async fn current_identity(&self) -> Option<AuthIdentity>;
}
