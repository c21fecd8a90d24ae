use std::thread;
use tokio::sync::{mpsc, oneshot};
use anyhow::Result;
use shared::types::{CurrentUser, LogEntry, PresenceRecord, UpsertOutcome};
use crate::store::db::{LogRecord, StoreDb, StoredCredential};

/// Commands sent to the store thread
pub enum StoreCommand {
    InsertLog(LogRecord, oneshot::Sender<Result<LogEntry>>),
    CountLogsByStatus(String, oneshot::Sender<Result<u64>>),
    ListLogs(oneshot::Sender<Result<Vec<LogEntry>>>),
    UpsertPresence {
        server_ip: String,
        hostname: String,
        users: Vec<CurrentUser>,
        reply: oneshot::Sender<Result<UpsertOutcome>>,
    },
    ListPresence(oneshot::Sender<Result<Vec<PresenceRecord>>>),
    CountCredentials(oneshot::Sender<Result<u64>>),
    InsertCredential(StoredCredential, oneshot::Sender<Result<bool>>),
    FindCredential(String, oneshot::Sender<Result<Option<StoredCredential>>>),
    Shutdown,
}

/// Handle to the store thread. Every command runs to completion before the
/// next one starts, so read-then-write sequences inside one command never
/// interleave with another request.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    /// Spawn a new store thread owning the given database
    pub fn spawn(mut db: StoreDb) -> Self {
        let (tx, mut rx) = mpsc::channel::<StoreCommand>(256);

        thread::spawn(move || {
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    StoreCommand::InsertLog(record, reply) => {
                        let _ = reply.send(db.insert_log(&record));
                    }
                    StoreCommand::CountLogsByStatus(status, reply) => {
                        let _ = reply.send(db.count_logs_by_status(&status));
                    }
                    StoreCommand::ListLogs(reply) => {
                        let _ = reply.send(db.list_logs());
                    }
                    StoreCommand::UpsertPresence { server_ip, hostname, users, reply } => {
                        let result = db.upsert_presence(&server_ip, &hostname, &users);
                        let _ = reply.send(result);
                    }
                    StoreCommand::ListPresence(reply) => {
                        let _ = reply.send(db.list_presence());
                    }
                    StoreCommand::CountCredentials(reply) => {
                        let _ = reply.send(db.count_credentials());
                    }
                    StoreCommand::InsertCredential(credential, reply) => {
                        let _ = reply.send(db.insert_credential(&credential));
                    }
                    StoreCommand::FindCredential(username, reply) => {
                        let _ = reply.send(db.find_credential(&username));
                    }
                    StoreCommand::Shutdown => {
                        tracing::info!("Store thread shutting down");
                        break;
                    }
                }
            }
        });

        Self { tx }
    }

    /// Persist a log entry; the returned entry carries the new id
    pub async fn insert_log(&self, record: LogRecord) -> Result<LogEntry> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::InsertLog(record, reply)).await?;
        rx.await?
    }

    pub async fn count_logs_by_status(&self, status: String) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::CountLogsByStatus(status, reply)).await?;
        rx.await?
    }

    pub async fn list_logs(&self) -> Result<Vec<LogEntry>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::ListLogs(reply)).await?;
        rx.await?
    }

    /// Replace or insert the presence record(s) for a server
    pub async fn upsert_presence(
        &self,
        server_ip: String,
        hostname: String,
        users: Vec<CurrentUser>,
    ) -> Result<UpsertOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::UpsertPresence {
            server_ip,
            hostname,
            users,
            reply,
        }).await?;
        rx.await?
    }

    pub async fn list_presence(&self) -> Result<Vec<PresenceRecord>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::ListPresence(reply)).await?;
        rx.await?
    }

    pub async fn count_credentials(&self) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::CountCredentials(reply)).await?;
        rx.await?
    }

    pub async fn insert_credential(&self, credential: StoredCredential) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::InsertCredential(credential, reply)).await?;
        rx.await?
    }

    pub async fn find_credential(&self, username: String) -> Result<Option<StoredCredential>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::FindCredential(username, reply)).await?;
        rx.await?
    }

    /// Shutdown the store thread
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(StoreCommand::Shutdown).await?;
        Ok(())
    }
}
