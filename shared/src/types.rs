use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A recorded connection attempt.
/// Created once by the store and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Assigned by the store at creation
    pub id: String,

    /// Address of the server the guest tried to reach
    pub server_ip: String,

    pub hostname: String,

    /// Address the connection came from
    pub guest_ip: String,

    pub username: String,

    /// Caller-supplied, stored verbatim
    pub timestamp: String,

    /// Geolocation of `guest_ip`, empty when the lookup failed
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,

    /// "connected", "failed" or free text
    pub status: String,
}

/// Body of `POST /log`. Every field defaults to empty so that missing
/// fields are reported by validation rather than by the JSON decoder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewLogEntry {
    #[serde(alias = "ip_server")]
    pub server_ip: String,
    pub hostname: String,
    #[serde(alias = "ip_guest")]
    pub guest_ip: String,
    pub username: String,
    pub timestamp: String,
    pub status: String,
}

/// One user currently connected to a server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    #[serde(default)]
    pub user: String,
    #[serde(default, alias = "ip_guest")]
    pub guest_ip: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Latest known set of users connected to a server, keyed by `server_ip`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub id: String,
    pub server_ip: String,
    pub hostname: String,
    pub users: Vec<CurrentUser>,
}

/// Body of `POST /connected-user`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresenceUpdate {
    #[serde(alias = "ip_server")]
    pub server_ip: String,
    pub hostname: String,
    pub users: Vec<CurrentUser>,
}

/// Result of a presence upsert, shaped like a document-store update result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
    /// Set only when no record matched and a new one was inserted
    pub upserted_id: Option<String>,
}

/// Body of `POST /login`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Uniform response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub message: String,
    pub data: Map<String, Value>,
}

impl ApiResponse {
    pub fn new(status: u16, message: impl Into<String>, key: &str, value: Value) -> Self {
        let mut data = Map::new();
        data.insert(key.to_string(), value);
        Self {
            status,
            message: message.into(),
            data,
        }
    }
}

/// Envelope used by the login endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
}
