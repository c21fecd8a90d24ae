use std::path::Path;
use anyhow::{Context, Result};
use rusqlite::{Connection, params, OptionalExtension};
use shared::types::{CurrentUser, LogEntry, PresenceRecord, UpsertOutcome};
use uuid::Uuid;

/// Log entry fields supplied by the caller plus enrichment results.
/// The id is never part of it: the store assigns one on insert.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub server_ip: String,
    pub hostname: String,
    pub guest_ip: String,
    pub username: String,
    pub timestamp: String,
    pub district: String,
    pub region: String,
    pub country: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub username: String,
    pub password_hash: String,
}

pub struct StoreDb {
    conn: Connection,
}

impl StoreDb {
    /// Open or create the SQLite database with WAL mode enabled
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL mode")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS logs (
                id         TEXT PRIMARY KEY,
                server_ip  TEXT NOT NULL,
                hostname   TEXT NOT NULL,
                guest_ip   TEXT NOT NULL,
                username   TEXT NOT NULL,
                timestamp  TEXT NOT NULL,
                district   TEXT NOT NULL DEFAULT '',
                region     TEXT NOT NULL DEFAULT '',
                country    TEXT NOT NULL DEFAULT '',
                status     TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_logs_status ON logs(status);

            -- server_ip is not unique: an upsert updates every matching row
            CREATE TABLE IF NOT EXISTS presence (
                id         TEXT PRIMARY KEY,
                server_ip  TEXT NOT NULL,
                hostname   TEXT NOT NULL,
                users      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_presence_server_ip ON presence(server_ip);

            CREATE TABLE IF NOT EXISTS credentials (
                username       TEXT PRIMARY KEY,
                password_hash  TEXT NOT NULL
            );
            "#,
        )
        .context("Failed to create database schema")?;

        Ok(Self { conn })
    }

    /// Persist a log entry under a freshly generated id
    pub fn insert_log(&self, record: &LogRecord) -> Result<LogEntry> {
        let id = Uuid::new_v4().to_string();

        self.conn.execute(
            r#"
            INSERT INTO logs (
                id, server_ip, hostname, guest_ip, username, timestamp,
                district, region, country, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                &id,
                &record.server_ip,
                &record.hostname,
                &record.guest_ip,
                &record.username,
                &record.timestamp,
                &record.district,
                &record.region,
                &record.country,
                &record.status,
            ],
        )
        .context("Failed to insert log entry")?;

        Ok(LogEntry {
            id,
            server_ip: record.server_ip.clone(),
            hostname: record.hostname.clone(),
            guest_ip: record.guest_ip.clone(),
            username: record.username.clone(),
            timestamp: record.timestamp.clone(),
            district: record.district.clone(),
            region: record.region.clone(),
            country: record.country.clone(),
            status: record.status.clone(),
        })
    }

    /// Count log entries whose status equals `status` exactly (case-sensitive)
    pub fn count_logs_by_status(&self, status: &str) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM logs WHERE status = ?1",
                params![status],
                |row| row.get(0),
            )
            .context("Failed to count log entries")?;

        Ok(count as u64)
    }

    /// All log entries in insertion order
    pub fn list_logs(&self) -> Result<Vec<LogEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, server_ip, hostname, guest_ip, username, timestamp,
                        district, region, country, status
                 FROM logs ORDER BY rowid"
            )
            .context("Failed to prepare query")?;

        let logs = stmt
            .query_map([], |row| {
                Ok(LogEntry {
                    id: row.get(0)?,
                    server_ip: row.get(1)?,
                    hostname: row.get(2)?,
                    guest_ip: row.get(3)?,
                    username: row.get(4)?,
                    timestamp: row.get(5)?,
                    district: row.get(6)?,
                    region: row.get(7)?,
                    country: row.get(8)?,
                    status: row.get(9)?,
                })
            })
            .context("Failed to query log entries")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect log entries")?;

        Ok(logs)
    }

    /// Replace hostname and users on every record matching `server_ip`,
    /// or insert a new record when none matches.
    ///
    /// The count and the write run in one transaction on the store thread.
    /// Two processes sharing the same database file can still both observe
    /// zero matches and insert duplicates.
    pub fn upsert_presence(
        &mut self,
        server_ip: &str,
        hostname: &str,
        users: &[CurrentUser],
    ) -> Result<UpsertOutcome> {
        let users_json = serde_json::to_string(users)
            .context("Failed to serialize users")?;

        let tx = self.conn.transaction()
            .context("Failed to begin presence transaction")?;

        let matched: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM presence WHERE server_ip = ?1",
                params![server_ip],
                |row| row.get(0),
            )
            .context("Failed to count presence records")?;

        let outcome = if matched >= 1 {
            // Rows already holding identical values still count as matched, not modified
            let modified = tx
                .execute(
                    "UPDATE presence SET hostname = ?1, users = ?2
                     WHERE server_ip = ?3 AND (hostname != ?1 OR users != ?2)",
                    params![hostname, &users_json, server_ip],
                )
                .context("Failed to update presence records")?;

            UpsertOutcome {
                matched_count: matched as u64,
                modified_count: modified as u64,
                upserted_id: None,
            }
        } else {
            let id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO presence (id, server_ip, hostname, users) VALUES (?1, ?2, ?3, ?4)",
                params![&id, server_ip, hostname, &users_json],
            )
            .context("Failed to insert presence record")?;

            UpsertOutcome {
                matched_count: 0,
                modified_count: 0,
                upserted_id: Some(id),
            }
        };

        tx.commit().context("Failed to commit presence transaction")?;
        Ok(outcome)
    }

    /// All presence records in insertion order
    pub fn list_presence(&self) -> Result<Vec<PresenceRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, server_ip, hostname, users FROM presence ORDER BY rowid")
            .context("Failed to prepare query")?;

        let records = stmt
            .query_map([], Self::row_to_presence)
            .context("Failed to query presence records")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect presence records")?;

        Ok(records)
    }

    pub fn count_credentials(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM credentials", [], |row| row.get(0))
            .context("Failed to count credentials")?;

        Ok(count as u64)
    }

    /// Insert a credential unless one with the same username exists.
    /// Returns true if a row was written.
    pub fn insert_credential(&self, credential: &StoredCredential) -> Result<bool> {
        let inserted = self
            .conn
            .execute(
                "INSERT INTO credentials (username, password_hash) VALUES (?1, ?2)
                 ON CONFLICT(username) DO NOTHING",
                params![&credential.username, &credential.password_hash],
            )
            .context("Failed to insert credential")?;

        Ok(inserted > 0)
    }

    /// Look up a credential by exact username
    pub fn find_credential(&self, username: &str) -> Result<Option<StoredCredential>> {
        let result = self
            .conn
            .query_row(
                "SELECT username, password_hash FROM credentials WHERE username = ?1",
                params![username],
                |row| {
                    Ok(StoredCredential {
                        username: row.get(0)?,
                        password_hash: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("Failed to query credential")?;

        Ok(result)
    }

    fn row_to_presence(row: &rusqlite::Row) -> Result<PresenceRecord, rusqlite::Error> {
        let users_json: String = row.get(3)?;

        let users = serde_json::from_str(&users_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                Box::new(e),
            ))?;

        Ok(PresenceRecord {
            id: row.get(0)?,
            server_ip: row.get(1)?,
            hostname: row.get(2)?,
            users,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn test_record(status: &str) -> LogRecord {
        LogRecord {
            server_ip: "10.0.0.1".to_string(),
            hostname: "h1".to_string(),
            guest_ip: "8.8.8.8".to_string(),
            username: "bob".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            district: String::new(),
            region: String::new(),
            country: String::new(),
            status: status.to_string(),
        }
    }

    fn user(name: &str) -> CurrentUser {
        CurrentUser {
            user: name.to_string(),
            guest_ip: "192.168.1.10".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_insert_assigns_unique_ids() {
        let db = StoreDb::open(":memory:").unwrap();

        let mut ids = HashSet::new();
        for _ in 0..20 {
            let entry = db.insert_log(&test_record("connected")).unwrap();
            assert!(!entry.id.is_empty());
            assert!(ids.insert(entry.id), "Ids must not repeat");
        }
    }

    #[test]
    fn test_list_logs_in_insertion_order() {
        let db = StoreDb::open(":memory:").unwrap();

        let first = db.insert_log(&test_record("connected")).unwrap();
        let second = db.insert_log(&test_record("failed")).unwrap();
        let third = db.insert_log(&test_record("disconnected")).unwrap();

        let logs = db.list_logs().unwrap();
        let ids: Vec<_> = logs.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str(), third.id.as_str()]);
        assert_eq!(logs[1], second);
    }

    #[test]
    fn test_count_by_status_is_exact() {
        let db = StoreDb::open(":memory:").unwrap();

        db.insert_log(&test_record("connected")).unwrap();
        db.insert_log(&test_record("connected")).unwrap();
        db.insert_log(&test_record("failed")).unwrap();
        db.insert_log(&test_record("Connected")).unwrap();
        db.insert_log(&test_record("timeout")).unwrap();

        let connected = db.count_logs_by_status("connected").unwrap();
        let failed = db.count_logs_by_status("failed").unwrap();
        assert_eq!(connected, 2);
        assert_eq!(failed, 1);
        assert!(connected + failed <= db.list_logs().unwrap().len() as u64);
    }

    #[test]
    fn test_upsert_inserts_then_replaces() {
        let mut db = StoreDb::open(":memory:").unwrap();

        let outcome = db.upsert_presence("10.0.0.1", "h1", &[user("alice"), user("bob")]).unwrap();
        assert_eq!(outcome.matched_count, 0);
        assert!(outcome.upserted_id.is_some());

        let outcome = db.upsert_presence("10.0.0.1", "h1-renamed", &[user("carol")]).unwrap();
        assert_eq!(outcome.matched_count, 1);
        assert_eq!(outcome.modified_count, 1);
        assert_eq!(outcome.upserted_id, None);

        let records = db.list_presence().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hostname, "h1-renamed");
        assert_eq!(records[0].users, vec![user("carol")]);
    }

    #[test]
    fn test_identical_upsert_matches_without_modifying() {
        let mut db = StoreDb::open(":memory:").unwrap();

        db.upsert_presence("10.0.0.1", "h1", &[user("alice")]).unwrap();
        let outcome = db.upsert_presence("10.0.0.1", "h1", &[user("alice")]).unwrap();
        assert_eq!(outcome.matched_count, 1);
        assert_eq!(outcome.modified_count, 0);
    }

    #[test]
    fn test_upsert_updates_every_duplicate() {
        let mut db = StoreDb::open(":memory:").unwrap();

        // Duplicates left behind by an earlier writer without the transaction
        for id in ["dup-1", "dup-2"] {
            db.conn
                .execute(
                    "INSERT INTO presence (id, server_ip, hostname, users) VALUES (?1, '10.0.0.9', 'old', '[]')",
                    params![id],
                )
                .unwrap();
        }
        db.upsert_presence("10.0.0.2", "other", &[]).unwrap();

        let outcome = db.upsert_presence("10.0.0.9", "new", &[user("dave")]).unwrap();
        assert_eq!(outcome.matched_count, 2);
        assert_eq!(outcome.modified_count, 2);

        let records = db.list_presence().unwrap();
        let matching: Vec<_> = records.iter().filter(|r| r.server_ip == "10.0.0.9").collect();
        assert_eq!(matching.len(), 2);
        assert!(matching.iter().all(|r| r.hostname == "new" && r.users == vec![user("dave")]));

        let other = records.iter().find(|r| r.server_ip == "10.0.0.2").unwrap();
        assert_eq!(other.hostname, "other");
    }

    #[test]
    fn test_credentials() {
        let db = StoreDb::open(":memory:").unwrap();
        assert_eq!(db.count_credentials().unwrap(), 0);

        let credential = StoredCredential {
            username: "admin".to_string(),
            password_hash: "hash".to_string(),
        };
        assert!(db.insert_credential(&credential).unwrap());
        assert!(!db.insert_credential(&credential).unwrap(), "Duplicate username should be ignored");
        assert_eq!(db.count_credentials().unwrap(), 1);

        let found = db.find_credential("admin").unwrap().unwrap();
        assert_eq!(found.password_hash, "hash");
        assert!(db.find_credential("Admin").unwrap().is_none());
    }
}
