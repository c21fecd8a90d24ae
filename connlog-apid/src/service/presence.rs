use shared::types::{PresenceRecord, PresenceUpdate, UpsertOutcome};
use crate::store_manager::StoreHandle;
use super::{require_fields, ServiceError};

/// Tracks which users are currently connected to each server.
#[derive(Clone)]
pub struct PresenceStore {
    store: StoreHandle,
}

impl PresenceStore {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Replace the user list of `update.server_ip` wholesale, creating the
    /// record if the server has none yet.
    pub async fn upsert(&self, update: PresenceUpdate) -> Result<UpsertOutcome, ServiceError> {
        require_fields(&[
            ("serverIp", update.server_ip.as_str()),
            ("hostname", update.hostname.as_str()),
        ])?;

        if let Some(pos) = update.users.iter().position(|u| u.user.trim().is_empty()) {
            return Err(ServiceError::Validation(format!(
                "missing required fields: users[{pos}].user"
            )));
        }

        let outcome = self
            .store
            .upsert_presence(update.server_ip, update.hostname, update.users)
            .await?;

        Ok(outcome)
    }

    pub async fn list_all(&self) -> Result<Vec<PresenceRecord>, ServiceError> {
        Ok(self.store.list_presence().await?)
    }
}
