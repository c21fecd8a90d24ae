/// Route paths served by the daemon
pub const LOG_PATH: &str = "/log";
pub const COUNT_CONNECTED_PATH: &str = "/count/connected";
pub const COUNT_FAILED_PATH: &str = "/count/failed";
pub const CONNECTED_USER_PATH: &str = "/connected-user";
pub const LOGIN_PATH: &str = "/login";
pub const HEALTH_PATH: &str = "/healthz";

/// Well-known values of the log status field. Any other string is accepted.
pub const STATUS_CONNECTED: &str = "connected";
pub const STATUS_FAILED: &str = "failed";

/// Envelope messages
pub const MSG_SUCCESS: &str = "success";
pub const MSG_ERROR: &str = "error";
pub const MSG_FAILED: &str = "failed";
pub const MSG_WRONG_PASSWORD: &str = "wrong password";

/// Credential created the first time the credential table is found empty
pub const BOOTSTRAP_USERNAME: &str = "admin";
pub const BOOTSTRAP_PASSWORD: &str = "admin";
