use std::sync::Arc;
use shared::types::{LogEntry, NewLogEntry};
use crate::geo::{self, GeoLookup};
use crate::store::db::LogRecord;
use crate::store_manager::StoreHandle;
use super::{require_fields, ServiceError};

/// Records connection attempts, enriched with the guest's location.
#[derive(Clone)]
pub struct LogStore {
    store: StoreHandle,
    geo: Arc<dyn GeoLookup>,
}

impl LogStore {
    pub fn new(store: StoreHandle, geo: Arc<dyn GeoLookup>) -> Self {
        Self { store, geo }
    }

    /// Validate, enrich and persist a log entry.
    /// Validation runs first so that bad input costs no geolocation call.
    pub async fn insert(&self, entry: NewLogEntry) -> Result<LogEntry, ServiceError> {
        require_fields(&[
            ("serverIp", entry.server_ip.as_str()),
            ("hostname", entry.hostname.as_str()),
            ("guestIp", entry.guest_ip.as_str()),
            ("username", entry.username.as_str()),
            ("timestamp", entry.timestamp.as_str()),
            ("status", entry.status.as_str()),
        ])?;

        let location = geo::enrich(self.geo.as_ref(), &entry.guest_ip).await;

        let record = LogRecord {
            server_ip: entry.server_ip,
            hostname: entry.hostname,
            guest_ip: entry.guest_ip,
            username: entry.username,
            timestamp: entry.timestamp,
            district: location.district,
            region: location.region,
            country: location.country,
            status: entry.status,
        };

        let stored = self.store.insert_log(record).await?;
        tracing::debug!(id = %stored.id, status = %stored.status, "Stored log entry");
        Ok(stored)
    }

    pub async fn count_by_status(&self, status: &str) -> Result<u64, ServiceError> {
        Ok(self.store.count_logs_by_status(status.to_string()).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<LogEntry>, ServiceError> {
        Ok(self.store.list_logs().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use async_trait::async_trait;
    use shared::protocol::{STATUS_CONNECTED, STATUS_FAILED};
    use crate::geo::{GeoError, GeoIp};
    use crate::store::db::StoreDb;

    #[derive(Default)]
    struct CountingGeo {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl GeoLookup for CountingGeo {
        async fn lookup(&self, ip: &str) -> Result<GeoIp, GeoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GeoError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
            }
            Ok(GeoIp {
                ip: ip.to_string(),
                district: "Mountain View".to_string(),
                state_prov: "California".to_string(),
                country_name: "United States".to_string(),
            })
        }
    }

    fn setup(geo: Arc<CountingGeo>) -> LogStore {
        let store = StoreHandle::spawn(StoreDb::open(":memory:").unwrap());
        LogStore::new(store, geo)
    }

    fn new_entry(status: &str) -> NewLogEntry {
        NewLogEntry {
            server_ip: "10.0.0.1".to_string(),
            hostname: "h1".to_string(),
            guest_ip: "8.8.8.8".to_string(),
            username: "bob".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            status: status.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_enriches_and_assigns_id() {
        let geo = Arc::new(CountingGeo::default());
        let logs = setup(geo.clone());

        let stored = logs.insert(new_entry(STATUS_CONNECTED)).await.unwrap();
        assert!(!stored.id.is_empty());
        assert_eq!(stored.status, "connected");
        assert_eq!(stored.district, "Mountain View");
        assert_eq!(stored.region, "California");
        assert_eq!(stored.country, "United States");
        assert_eq!(geo.calls.load(Ordering::SeqCst), 1);

        let all = logs.list_all().await.unwrap();
        assert_eq!(all, vec![stored]);
    }

    #[tokio::test]
    async fn test_missing_field_rejected_before_side_effects() {
        let geo = Arc::new(CountingGeo::default());
        let logs = setup(geo.clone());

        let blanks: [fn(&mut NewLogEntry); 6] = [
            |e| e.server_ip.clear(),
            |e| e.hostname.clear(),
            |e| e.guest_ip.clear(),
            |e| e.username.clear(),
            |e| e.timestamp = "   ".to_string(),
            |e| e.status.clear(),
        ];

        for blank in blanks {
            let mut entry = new_entry(STATUS_CONNECTED);
            blank(&mut entry);
            let err = logs.insert(entry).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "got {err}");
        }

        assert_eq!(geo.calls.load(Ordering::SeqCst), 0, "No lookup for invalid input");
        assert!(logs.list_all().await.unwrap().is_empty(), "No write for invalid input");
    }

    #[tokio::test]
    async fn test_enrichment_failure_does_not_block_insert() {
        let geo = Arc::new(CountingGeo { fail: true, ..Default::default() });
        let logs = setup(geo.clone());

        let stored = logs.insert(new_entry(STATUS_FAILED)).await.unwrap();
        assert!(!stored.id.is_empty());
        assert_eq!(stored.district, "");
        assert_eq!(stored.region, "");
        assert_eq!(stored.country, "");
    }

    #[tokio::test]
    async fn test_status_counts_sum_to_total_with_two_statuses() {
        let logs = setup(Arc::new(CountingGeo::default()));

        for status in [STATUS_CONNECTED, STATUS_FAILED, STATUS_CONNECTED, STATUS_CONNECTED] {
            logs.insert(new_entry(status)).await.unwrap();
        }

        let connected = logs.count_by_status(STATUS_CONNECTED).await.unwrap();
        let failed = logs.count_by_status(STATUS_FAILED).await.unwrap();
        assert_eq!((connected, failed), (3, 1));
        assert_eq!(connected + failed, logs.list_all().await.unwrap().len() as u64);

        logs.insert(new_entry("disconnected")).await.unwrap();
        assert!(connected + failed < logs.list_all().await.unwrap().len() as u64);
    }
}
