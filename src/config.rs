//! Client configuration (spec §6.2 "Endpoint & service type", §6.3
//! "Persisted state / configuration").
//!
//! Grounded on `neo4rs::config::{Config, ConfigBuilder}`: a builder with
//! `impl Into<String>` setters and defaults applied in `Default`, validated
//! once in `build()`.

use crate::errors::{Error, Result};
use crate::region::{self, Region};
use std::time::Duration;
use url::Url;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_TABLE_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 10;

/// Which kind of service the endpoint names (spec §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceType {
    #[default]
    Unspecified,
    CloudSim,
    Cloud,
    OnPrem,
}

/// A resolved `scheme://host[:port]` with no path component (spec §6.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: Url,
}

impl Endpoint {
    /// Parses and normalizes an endpoint string per the defaulting rules of
    /// spec §6.2: host-only implies `https://host:443`; port-only implies
    /// `http` unless the port is 443; scheme-only implies port 443 for
    /// `https` and 8080 for `http`. A path component is rejected.
    pub fn parse(input: &str) -> Result<Endpoint> {
        let normalized = normalize(input)?;
        let url = Url::parse(&normalized)?;
        if url.path() != "/" && !url.path().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "endpoint must not contain a path: {input}"
            )));
        }
        Ok(Endpoint { url })
    }
}

/// Applies spec §6.2's scheme/host/port defaulting rules to a raw endpoint
/// string before attempting to parse it as a URL.
fn normalize(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::InvalidConfig("endpoint must not be empty".into()));
    }

    if let Some((scheme, rest)) = input.split_once("://") {
        if rest.is_empty() {
            return Err(Error::InvalidConfig(format!("endpoint has no host: {input}")));
        }
        if rest.contains(':') {
            return Ok(input.to_string());
        }
        let port = default_port_for_scheme(scheme)?;
        return Ok(format!("{scheme}://{rest}:{port}"));
    }

    // No scheme given. Distinguish "host" from "host:port" from "scheme"
    // by whether it parses as a bare port number.
    if let Ok(port) = input.parse::<u16>() {
        let scheme = if port == 443 { "https" } else { "http" };
        return Ok(format!("{scheme}://localhost:{port}"));
    }

    if let Some((host, port)) = input.split_once(':') {
        if port.parse::<u16>().is_ok() {
            return Ok(format!("http://{host}:{port}"));
        }
    }

    Ok(format!("https://{input}:443"))
}

fn default_port_for_scheme(scheme: &str) -> Result<u16> {
    match scheme {
        "https" => Ok(443),
        "http" => Ok(8080),
        other => Err(Error::InvalidConfig(format!("unknown endpoint scheme: {other}"))),
    }
}

/// Immutable, validated client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) endpoint: Endpoint,
    pub(crate) service_type: ServiceType,
    pub(crate) compartment_or_namespace: Option<String>,
    pub(crate) request_timeout: Duration,
    pub(crate) table_request_timeout: Duration,
    pub(crate) max_retry_attempts: u32,
    pub(crate) disable_protocol_fallback: bool,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn table_request_timeout(&self) -> Duration {
        self.table_request_timeout
    }

    pub fn max_retry_attempts(&self) -> u32 {
        self.max_retry_attempts
    }

    pub fn disable_protocol_fallback(&self) -> bool {
        self.disable_protocol_fallback
    }

    pub fn compartment_or_namespace(&self) -> Option<&str> {
        self.compartment_or_namespace.as_deref()
    }

    /// Builds a `Config` from a JSON document with case-insensitive field
    /// names (spec §6.3). Durations are integer milliseconds; enum values
    /// match constant names case-insensitively.
    #[cfg(feature = "json")]
    pub fn from_json(json: &str) -> Result<Config> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidConfig("configuration document must be an object".into()))?;

        let get = |key: &str| {
            object
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        };

        let mut builder = ConfigBuilder::new();
        if let Some(region) = get("region").and_then(|v| v.as_str()) {
            builder = builder.region(region)?;
        }
        if let Some(endpoint) = get("endpoint").and_then(|v| v.as_str()) {
            builder = builder.endpoint(endpoint)?;
        }
        if let Some(ns) = get("compartmentOrNamespace").and_then(|v| v.as_str()) {
            builder = builder.compartment_or_namespace(ns);
        }
        if let Some(ms) = get("requestTimeoutMs").and_then(|v| v.as_u64()) {
            builder = builder.request_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = get("tableRequestTimeoutMs").and_then(|v| v.as_u64()) {
            builder = builder.table_request_timeout(Duration::from_millis(ms));
        }
        if let Some(n) = get("maxRetryAttempts").and_then(|v| v.as_u64()) {
            builder = builder.max_retry_attempts(n as u32);
        }
        builder.build()
    }
}

/// Builds a [`Config`], validating the exactly-one-of region/endpoint rule
/// at `build()` time (spec §6.2).
pub struct ConfigBuilder {
    region: Option<Region>,
    endpoint: Option<String>,
    service_type: ServiceType,
    compartment_or_namespace: Option<String>,
    request_timeout: Duration,
    table_request_timeout: Duration,
    max_retry_attempts: u32,
    disable_protocol_fallback: bool,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the region; a region implies service type `cloud` and an
    /// endpoint derived from the region's catalog entry (spec §6.2).
    pub fn region(mut self, region_id: &str) -> Result<Self> {
        let region = region::lookup(region_id)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown region: {region_id}")))?;
        self.region = Some(region);
        self.service_type = ServiceType::Cloud;
        Ok(self)
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Result<Self> {
        self.endpoint = Some(endpoint.into());
        Ok(self)
    }

    pub fn service_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = service_type;
        self
    }

    pub fn compartment_or_namespace(mut self, value: impl Into<String>) -> Self {
        self.compartment_or_namespace = Some(value.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn table_request_timeout(mut self, timeout: Duration) -> Self {
        self.table_request_timeout = timeout;
        self
    }

    pub fn max_retry_attempts(mut self, max_retry_attempts: u32) -> Self {
        self.max_retry_attempts = max_retry_attempts;
        self
    }

    pub fn disable_protocol_fallback(mut self, disable: bool) -> Self {
        self.disable_protocol_fallback = disable;
        self
    }

    pub fn build(self) -> Result<Config> {
        let endpoint = match (self.region, self.endpoint) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidConfig(
                    "exactly one of region or endpoint may be set".into(),
                ))
            }
            (Some(region), None) => Endpoint::parse(&region.endpoint())?,
            (None, Some(endpoint)) => Endpoint::parse(&endpoint)?,
            (None, None) => {
                return Err(Error::InvalidConfig(
                    "exactly one of region or endpoint must be set".into(),
                ))
            }
        };

        Ok(Config {
            endpoint,
            service_type: self.service_type,
            compartment_or_namespace: self.compartment_or_namespace,
            request_timeout: self.request_timeout,
            table_request_timeout: self.table_request_timeout,
            max_retry_attempts: self.max_retry_attempts,
            disable_protocol_fallback: self.disable_protocol_fallback,
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        ConfigBuilder {
            region: None,
            endpoint: None,
            service_type: ServiceType::Unspecified,
            compartment_or_namespace: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            table_request_timeout: DEFAULT_TABLE_REQUEST_TIMEOUT,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            disable_protocol_fallback: false,
        }
    }
}
