use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::app::ports::DeviceSource;
use crate::config::KismetConfig;
use crate::constants::{
    device_by_key_endpoint, devices_by_mac_endpoint, recent_devices_endpoint, ALLOWED_SOURCE_HOSTS,
    ENDPOINT_SYSTEM_STATUS, ENDPOINT_TRACKED_FIELDS,
};
use crate::error::{BridgeError, Result};
use crate::infra::rate_limiter::RateLimiter;
use crate::metrics;
use crate::pipeline::normalize::sanitize::is_valid_mac;
use crate::types::RawRecord;

/// Client for the Kismet REST API.
///
/// Only loopback hosts are accepted, every request passes the rate limiter first and is bounded
/// by the configured timeout, and construction fails unless the status probe succeeds.
pub struct KismetClient {
    base_url: String,
    http: Option<reqwest::Client>,
    credentials: Option<(String, String)>,
    timeout: Duration,
    rate_limiter: RateLimiter,
}

impl std::fmt::Debug for KismetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials stay out of debug output
        f.debug_struct("KismetClient")
            .field("base_url", &self.base_url)
            .field("open", &self.http.is_some())
            .field("authenticated", &self.credentials.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl KismetClient {
    /// Validate settings, build the session and probe `/system/status.json`.
    pub async fn connect(
        config: &KismetConfig,
        credentials: Option<(String, String)>,
    ) -> Result<Self> {
        let mut client = Self::build(config, credentials)?;
        match client.get_system_status().await {
            Ok(_) => info!("Kismet connection test successful"),
            Err(e) => {
                error!("Kismet connection test failed: {}", e);
                return Err(e);
            }
        }
        info!("Kismet client initialized: {}", client.base_url);
        Ok(client)
    }

    fn build(config: &KismetConfig, credentials: Option<(String, String)>) -> Result<Self> {
        validate_host(&config.host)?;
        validate_port(config.port)?;

        let scheme = if config.use_ssl { "https" } else { "http" };
        let host = if config.host.contains(':') {
            format!("[{}]", config.host)
        } else {
            config.host.clone()
        };
        let base_url = format!("{}://{}:{}", scheme, host, config.port);

        if config.use_ssl && !config.verify_ssl {
            warn!("TLS certificate verification disabled for the Kismet API");
        }
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| BridgeError::Configuration(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http: Some(http),
            credentials,
            timeout,
            rate_limiter: RateLimiter::new(config.max_requests_per_minute),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(skip(self))]
    pub async fn get_system_status(&mut self) -> Result<Value> {
        self.request(Method::GET, ENDPOINT_SYSTEM_STATUS, None).await
    }

    pub async fn get_tracked_fields(&mut self) -> Result<Value> {
        self.request(Method::GET, ENDPOINT_TRACKED_FIELDS, None).await
    }

    /// Devices seen since `last_time`: negative values are relative to now, positive values
    /// are absolute epoch seconds and must not lie in the future.
    pub async fn get_recent_devices(&mut self, last_time: i64) -> Result<Vec<RawRecord>> {
        self.get_recent_devices_with_fields(last_time, &[]).await
    }

    /// Like [`get_recent_devices`](Self::get_recent_devices), asking the server to return only
    /// `fields` when the list is non-empty.
    #[instrument(skip(self, fields), fields(field_count = fields.len()))]
    pub async fn get_recent_devices_with_fields(
        &mut self,
        last_time: i64,
        fields: &[String],
    ) -> Result<Vec<RawRecord>> {
        validate_last_time(last_time, chrono::Utc::now().timestamp())?;

        let endpoint = recent_devices_endpoint(last_time);
        let response = if fields.is_empty() {
            self.request(Method::GET, &endpoint, None).await?
        } else {
            self.request(Method::POST, &endpoint, Some(json!({ "fields": fields })))
                .await?
        };
        expect_device_list(response)
    }

    #[instrument(skip(self))]
    pub async fn get_device_by_key(&mut self, device_key: &str) -> Result<RawRecord> {
        let safe_key = sanitize_device_key(device_key);
        if safe_key.is_empty() {
            return Err(BridgeError::Validation("Invalid device key".into()));
        }
        self.request(Method::GET, &device_by_key_endpoint(&safe_key), None)
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_devices_by_mac(&mut self, mac_address: &str) -> Result<Vec<RawRecord>> {
        if !is_valid_mac(mac_address) {
            return Err(BridgeError::Validation(format!(
                "Invalid MAC address format: {}",
                mac_address
            )));
        }
        let response = self
            .request(Method::GET, &devices_by_mac_endpoint(mac_address), None)
            .await?;
        expect_device_list(response)
    }

    /// Release the HTTP session. Later requests fail with a connectivity error.
    pub fn close(&mut self) {
        if self.http.take().is_some() {
            info!("Kismet client session closed");
        }
    }

    async fn request(&mut self, method: Method, endpoint: &str, body: Option<Value>) -> Result<Value> {
        if !self.rate_limiter.admit() {
            metrics::source::rate_limited();
            return Err(BridgeError::RateLimitExceeded {
                limit: self.rate_limiter.max_requests(),
            });
        }
        let http = self
            .http
            .as_ref()
            .ok_or_else(|| BridgeError::Connectivity("Kismet client session is closed".into()))?;

        let url = format!("{}{}", self.base_url, endpoint);
        let mut builder = http.request(method, &url);
        if let Some((username, password)) = &self.credentials {
            builder = builder.basic_auth(username, Some(password));
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let started = Instant::now();
        let result = self.execute(builder, endpoint).await;
        match &result {
            Ok(_) => metrics::source::request_success(started.elapsed().as_secs_f64()),
            Err(e) => metrics::source::request_error(e.kind()),
        }
        result
    }

    async fn execute(&self, builder: reqwest::RequestBuilder, endpoint: &str) -> Result<Value> {
        let response = builder
            .send()
            .await
            .map_err(|e| self.classify(e, endpoint))?;

        let status = response.status();
        if !status.is_success() {
            error!(endpoint, status = status.as_u16(), "HTTP error from Kismet");
            return Err(BridgeError::Protocol {
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.classify(e, endpoint))?;
        debug!(endpoint, bytes = bytes.len(), "Kismet response received");

        serde_json::from_slice(&bytes).map_err(|e| {
            error!(endpoint, "Invalid JSON response: {}", e);
            BridgeError::MalformedResponse(format!("Invalid JSON response from server: {}", e))
        })
    }

    fn classify(&self, e: reqwest::Error, endpoint: &str) -> BridgeError {
        if e.is_timeout() {
            error!(endpoint, "Request timeout");
            BridgeError::Timeout(self.timeout.as_secs())
        } else if e.is_connect() {
            error!(endpoint, "Connection error: {}", e);
            BridgeError::Connectivity("Cannot connect to Kismet server".into())
        } else if e.is_body() || e.is_decode() {
            error!(endpoint, "Unreadable response body: {}", e);
            BridgeError::MalformedResponse(format!("Unreadable response body: {}", e))
        } else {
            error!(endpoint, "Request failed: {}", e);
            BridgeError::Connectivity(format!("Request failed: {}", e))
        }
    }
}

#[async_trait]
impl DeviceSource for KismetClient {
    async fn system_status(&mut self) -> Result<Value> {
        self.get_system_status().await
    }

    async fn recent_devices(&mut self, last_time: i64) -> Result<Vec<RawRecord>> {
        self.get_recent_devices(last_time).await
    }

    fn close(&mut self) {
        KismetClient::close(self);
    }
}

/// Accept only loopback hosts so the client can never be pointed at another machine.
pub fn validate_host(host: &str) -> Result<()> {
    let allowed = ALLOWED_SOURCE_HOSTS.contains(&host)
        || host.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false);
    if allowed {
        Ok(())
    } else {
        warn!("Non-localhost host attempted: {}", host);
        Err(BridgeError::Configuration(format!(
            "Only localhost connections allowed. Got: {}",
            host
        )))
    }
}

pub fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(BridgeError::Configuration(format!("Invalid port number: {}", port)));
    }
    Ok(())
}

/// Positive `last_time` is an absolute timestamp and must not be after `now`.
pub fn validate_last_time(last_time: i64, now: i64) -> Result<()> {
    if last_time > 0 && last_time > now {
        return Err(BridgeError::Validation("Timestamp cannot be in the future".into()));
    }
    Ok(())
}

/// Strip path separators so a key cannot escape its route.
pub fn sanitize_device_key(device_key: &str) -> String {
    device_key.chars().filter(|c| *c != '/' && *c != '\\').collect()
}

fn expect_device_list(response: Value) -> Result<Vec<RawRecord>> {
    match response {
        Value::Array(devices) => Ok(devices),
        other => Err(BridgeError::MalformedResponse(format!(
            "Expected a JSON array of devices, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
