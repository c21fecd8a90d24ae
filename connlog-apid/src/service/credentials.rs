use anyhow::Context;
use thiserror::Error;
use shared::protocol::{BOOTSTRAP_PASSWORD, BOOTSTRAP_USERNAME};
use crate::store::db::StoredCredential;
use crate::store_manager::StoreHandle;
use super::ServiceError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user not found")]
    NotFound,

    #[error("wrong password")]
    WrongPassword,

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        AuthError::Service(ServiceError::Storage(e))
    }
}

/// Username/password check against bcrypt hashes.
#[derive(Clone)]
pub struct CredentialStore {
    store: StoreHandle,
    cost: u32,
}

impl CredentialStore {
    pub fn new(store: StoreHandle, cost: u32) -> Self {
        Self { store, cost }
    }

    /// Create the default admin credential if no credential exists yet.
    /// Returns true when a credential was created.
    pub async fn bootstrap_if_empty(&self) -> Result<bool, AuthError> {
        if self.store.count_credentials().await? > 0 {
            return Ok(false);
        }

        let cost = self.cost;
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(BOOTSTRAP_PASSWORD, cost))
            .await
            .context("Password hashing task failed")?
            .context("Failed to hash bootstrap password")?;

        // A concurrent bootstrap may have won the race; the insert is a no-op then
        let created = self
            .store
            .insert_credential(StoredCredential {
                username: BOOTSTRAP_USERNAME.to_string(),
                password_hash,
            })
            .await?;

        if created {
            tracing::info!("Created bootstrap credential for {}", BOOTSTRAP_USERNAME);
        }
        Ok(created)
    }

    pub async fn verify(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let credential = self
            .store
            .find_credential(username.to_string())
            .await?
            .ok_or(AuthError::NotFound)?;

        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || {
            // A malformed stored hash counts as a mismatch
            bcrypt::verify(password, &credential.password_hash).unwrap_or(false)
        })
        .await
        .context("Password verification task failed")?;

        if matches {
            Ok(())
        } else {
            Err(AuthError::WrongPassword)
        }
    }

    /// Bootstrap, then verify: what a login attempt does.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.bootstrap_if_empty().await?;
        self.verify(username, password).await
    }
}
