pub mod credentials;
pub mod logs;
pub mod presence;

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub use credentials::{AuthError, CredentialStore};
pub use logs::LogStore;
pub use presence::PresenceStore;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Client-correctable input problem, detected before any side effect
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("request deadline exceeded")]
    Timeout,
}

/// Run `fut` under the per-request deadline.
pub async fn with_deadline<T, E, F>(deadline: Duration, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<ServiceError>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout.into()),
    }
}

/// Names of the fields in `fields` whose value is blank
fn missing_fields<'a>(fields: &[(&'a str, &str)]) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}

fn require_fields(fields: &[(&str, &str)]) -> Result<(), ServiceError> {
    let missing = missing_fields(fields);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )))
    }
}
