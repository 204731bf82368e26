//! In-process auth provider
//!
//! Email/password accounts with argon2id credentials, one optional federated
//! account, and an outbox of password-reset requests in place of email.

use super::{AuthIdentity, AuthProvider};
use crate::config::BoardConfig;
use crate::error::{AuthError, BoardError, Result};
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Stored credential; the PHC string carries its own salt and parameters
#[derive(Clone)]
struct Account {
    uid: String,
    credential: String,
}

impl Account {
    fn create(uid: String, password: &str) -> Result<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let credential = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| BoardError::Internal(format!("Failed to hash password: {e}")))?
            .to_string();
        Ok(Self { uid, credential })
    }

    fn accepts(&self, password: &str) -> Result<bool> {
        let stored = PasswordHash::new(&self.credential)
            .map_err(|e| BoardError::Internal(format!("Unreadable credential for {}: {e}", self.uid)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &stored)
            .is_ok())
    }
}

#[derive(Default)]
struct AuthState {
    accounts: HashMap<String, Account>,
    current: Option<AuthIdentity>,
    provider_account: Option<AuthIdentity>,
    reset_outbox: Vec<String>,
}

pub struct MemoryAuth {
    min_password_len: usize,
    state: Mutex<AuthState>,
}

impl MemoryAuth {
    pub fn new(min_password_len: usize) -> Self {
        Self {
            min_password_len,
            state: Mutex::new(AuthState::default()),
        }
    }

    /// Weak-password threshold taken from `min_password_len`
    pub fn from_config(config: &BoardConfig) -> Self {
        Self::new(config.min_password_len)
    }

    /// Account returned by [`AuthProvider::sign_in_with_provider`]
    pub fn with_provider_account(self, identity: AuthIdentity) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.provider_account = Some(identity);
        }
        self
    }

    /// Emails that asked for a password reset, oldest first
    pub fn reset_requests(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.reset_outbox.clone())
            .unwrap_or_default()
    }

    fn state(&self) -> Result<MutexGuard<'_, AuthState>> {
        self.state
            .lock()
            .map_err(|e| BoardError::Internal(format!("Lock poisoned: {}", e)))
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new(6)
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail.into())
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn register(&self, email: &str, password: &str) -> Result<AuthIdentity> {
        let email = normalize_email(email)?;
        if password.chars().count() < self.min_password_len {
            return Err(AuthError::WeakPassword {
                min_len: self.min_password_len,
            }
            .into());
        }
        if self.state()?.accounts.contains_key(&email) {
            return Err(AuthError::EmailInUse.into());
        }

        // hash outside the lock
        let account = Account::create(uuid::Uuid::new_v4().simple().to_string(), password)?;
        let uid = account.uid.clone();

        let mut state = self.state()?;
        if state.accounts.contains_key(&email) {
            return Err(AuthError::EmailInUse.into());
        }
        state.accounts.insert(email.clone(), account);

        let identity = AuthIdentity {
            uid,
            email: Some(email),
            display_name: None,
        };
        state.current = Some(identity.clone());
        info!(uid = %identity.uid, "Account registered");
        Ok(identity)
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthIdentity> {
        let email = normalize_email(email)?;
        let account = self
            .state()?
            .accounts
            .get(&email)
            .cloned()
            .ok_or(AuthError::UserNotFound)?;

        if !account.accepts(password)? {
            debug!(uid = %account.uid, "Password mismatch");
            return Err(AuthError::InvalidCredentials.into());
        }

        let identity = AuthIdentity {
            uid: account.uid,
            email: Some(email),
            display_name: None,
        };
        self.state()?.current = Some(identity.clone());
        Ok(identity)
    }

    async fn logout(&self) -> Result<()> {
        self.state()?.current = None;
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> Result<()> {
        let email = normalize_email(email)?;
        let mut state = self.state()?;
        if !state.accounts.contains_key(&email) {
            return Err(AuthError::UserNotFound.into());
        }
        state.reset_outbox.push(email);
        Ok(())
    }

    async fn sign_in_with_provider(&self) -> Result<AuthIdentity> {
        let mut state = self.state()?;
        let identity = state
            .provider_account
            .clone()
            .ok_or_else(|| AuthError::ProviderUnavailable("no provider configured".into()))?;
        state.current = Some(identity.clone());
        Ok(identity)
    }

    async fn current_identity(&self) -> Option<AuthIdentity> {
        self.state.lock().ok().and_then(|s| s.current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_stores_argon2id_credential() {
        let account = Account::create("u1".into(), "hunter22").unwrap();
        assert!(account.credential.starts_with("$argon2id$"));
        assert!(!account.credential.contains("hunter22"));
        assert!(account.accepts("hunter22").unwrap());
        assert!(!account.accepts("hunter23").unwrap());

        let corrupt = Account {
            uid: "u2".into(),
            credential: "plaintext".into(),
        };
        assert!(matches!(corrupt.accepts("plaintext"), Err(BoardError::Internal(_))));
    }

    #[tokio::test]
    async fn test_threshold_from_config() {
        let config = BoardConfig {
            min_password_len: 10,
            ..BoardConfig::default()
        };
        let auth = MemoryAuth::from_config(&config);
        assert_eq!(
            auth.register("ada@example.com", "secret1").await.unwrap_err(),
            BoardError::Auth(AuthError::WeakPassword { min_len: 10 })
        );
        assert!(auth.register("ada@example.com", "secret1234").await.is_ok());
    }

    #[tokio::test]
    async fn test_register_login_logout() {
        let auth = MemoryAuth::default();
        let registered = auth.register("Ada@Example.com", "secret1").await.unwrap();
        assert_eq!(registered.email.as_deref(), Some("ada@example.com"));
        assert_eq!(auth.current_identity().await, Some(registered.clone()));

        auth.logout().await.unwrap();
        assert_eq!(auth.current_identity().await, None);

        let again = auth.login("ada@example.com", "secret1").await.unwrap();
        assert_eq!(again.uid, registered.uid);
    }

    #[tokio::test]
    async fn test_auth_errors() {
        let auth = MemoryAuth::new(6);
        assert_eq!(
            auth.register("ada@example.com", "short").await.unwrap_err(),
            BoardError::Auth(AuthError::WeakPassword { min_len: 6 })
        );
        assert_eq!(
            auth.register("not-an-email", "secret1").await.unwrap_err(),
            BoardError::Auth(AuthError::InvalidEmail)
        );

        auth.register("ada@example.com", "secret1").await.unwrap();
        assert_eq!(
            auth.register("ada@example.com", "secret2").await.unwrap_err(),
            BoardError::Auth(AuthError::EmailInUse)
        );
        assert_eq!(
            auth.login("ada@example.com", "wrong!!").await.unwrap_err(),
            BoardError::Auth(AuthError::InvalidCredentials)
        );
        assert_eq!(
            auth.login("bo@example.com", "secret1").await.unwrap_err(),
            BoardError::Auth(AuthError::UserNotFound)
        );
    }

    #[tokio::test]
    async fn test_reset_and_provider() {
        let auth = MemoryAuth::default().with_provider_account(AuthIdentity {
            uid: "g1".into(),
            email: Some("bo@example.com".into()),
            display_name: Some("Bo".into()),
        });
        auth.register("ada@example.com", "secret1").await.unwrap();
        auth.reset_password("ada@example.com").await.unwrap();
        assert_eq!(auth.reset_requests(), vec!["ada@example.com".to_string()]);

        let identity = auth.sign_in_with_provider().await.unwrap();
        assert_eq!(identity.uid, "g1");
        assert_eq!(auth.current_identity().await.map(|i| i.uid), Some("g1".into()));

        let unconfigured = MemoryAuth::default();
        assert!(matches!(
            unconfigured.sign_in_with_provider().await,
            Err(BoardError::Auth(AuthError::ProviderUnavailable(_)))
        ));
    }
}
