use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use crate::config::GeolocationConfig;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("geolocation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("geolocation service answered {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed geolocation response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Raw answer of the geolocation API. Fields the API omits stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeoIp {
    pub ip: String,
    pub district: String,
    pub state_prov: String,
    pub country_name: String,
}

/// Location fields folded into a log entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoFields {
    pub district: String,
    pub region: String,
    pub country: String,
}

impl From<GeoIp> for GeoFields {
    fn from(geo: GeoIp) -> Self {
        Self {
            district: geo.district,
            region: geo.state_prov,
            country: geo.country_name,
        }
    }
}

#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: &str) -> Result<GeoIp, GeoError>;
}

/// Client for an ipgeolocation.io-compatible endpoint
pub struct IpGeolocationClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    fields: String,
}

impl IpGeolocationClient {
    pub fn new(config: &GeolocationConfig) -> Result<Self, GeoError> {
        // No client-side timeout: the request deadline bounds the call
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            fields: config.fields.clone(),
        })
    }
}

#[async_trait]
impl GeoLookup for IpGeolocationClient {
    async fn lookup(&self, ip: &str) -> Result<GeoIp, GeoError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("ip", ip),
                ("fields", self.fields.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::Status(status));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Best-effort enrichment: a failed lookup is logged and yields empty fields.
pub async fn enrich(geo: &dyn GeoLookup, ip: &str) -> GeoFields {
    match geo.lookup(ip).await {
        Ok(result) => {
            tracing::debug!(guest_ip = %result.ip, country = %result.country_name, "Geolocation resolved");
            result.into()
        }
        Err(e) => {
            tracing::warn!(guest_ip = %ip, "Geolocation lookup failed: {}", e);
            GeoFields::default()
        }
    }
}
