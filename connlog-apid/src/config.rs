use std::path::{Path, PathBuf};
use serde::Deserialize;
use anyhow::{Context, Result};

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub geolocation: GeolocationConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Deadline applied to every request that touches the store or the geolocation API
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeolocationConfig {
    #[serde(default = "default_geo_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_geo_fields")]
    pub fields: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/connlog/connlog.db")
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_geo_base_url() -> String {
    "https://api.ipgeolocation.io/ipgeo".to_string()
}

fn default_geo_fields() -> String {
    "state_prov,district,country_name".to_string()
}

fn default_bcrypt_cost() -> u32 {
    14
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            base_url: default_geo_base_url(),
            api_key: String::new(),
            fields: default_geo_fields(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&config.auth.bcrypt_cost) {
            anyhow::bail!(
                "auth.bcrypt_cost must be between {} and {}",
                MIN_BCRYPT_COST,
                MAX_BCRYPT_COST
            );
        }
        Ok(config)
    }

    /// GEOLOCATION_BASE_URL and GEOLOCATION_KEY win over the file when set and non-empty
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("GEOLOCATION_BASE_URL") {
            self.geolocation.base_url = url;
        }
        if let Some(key) = non_empty("GEOLOCATION_KEY") {
            self.geolocation.api_key = key;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.api.listen, "0.0.0.0:8080");
        assert_eq!(config.api.request_timeout_secs, 10);
        assert_eq!(config.auth.bcrypt_cost, 14);
        assert_eq!(config.geolocation.fields, "state_prov,district,country_name");
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [store]
            db_path = "/tmp/connlog.db"

            [api]
            listen = "127.0.0.1:9000"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.db_path, PathBuf::from("/tmp/connlog.db"));
        assert_eq!(config.api.listen, "127.0.0.1:9000");
        assert_eq!(config.api.request_timeout_secs, 10);
    }

    #[test]
    fn test_rejects_out_of_range_cost() {
        assert!(Config::parse("[auth]\nbcrypt_cost = 2").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::parse("[geolocation]\napi_key = \"from-file\"").unwrap();
        config.apply_env_overrides(|key| match key {
            "GEOLOCATION_KEY" => Some("from-env".to_string()),
            "GEOLOCATION_BASE_URL" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.geolocation.api_key, "from-env");
        assert_eq!(config.geolocation.base_url, "https://api.ipgeolocation.io/ipgeo");
    }
}
