//! Generation-service and render-time configuration

use std::time::Duration;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use super::limits::{default_poll_interval, DEFAULT_EXPORT_NAME};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3001/api";

pub const ENV_API_BASE_URL: &str = "WIDGET_API_BASE_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "WIDGET_POLL_INTERVAL_MS";
pub const ENV_HTTP_TIMEOUT_MS: &str = "WIDGET_HTTP_TIMEOUT_MS";
pub const ENV_AUTH_HEADERS: &str = "WIDGET_DATASOURCE_AUTH_HEADERS";
pub const ENV_EXPORT_NAME: &str = "WIDGET_EXPORT_NAME";

/// Authentication headers handed to every rendered widget as `headersMap`.
///
/// The runtime never interprets the contents; it only guarantees the value is
/// a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HeadersMap(Map<String, Value>);

impl HeadersMap {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Parse a JSON object. Malformed input and non-object JSON yield an
    /// empty map instead of an error.
    pub fn parse_permissive(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(map)) => Self(map),
            Ok(other) => {
                tracing::warn!(
                    target = "aiwidget",
                    kind = json_kind(&other),
                    "auth headers config is not a JSON object; using empty map"
                );
                Self::default()
            }
            Err(err) => {
                tracing::warn!(
                    target = "aiwidget",
                    error = %err,
                    "auth headers config is malformed; using empty map"
                );
                Self::default()
            }
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Settings for talking to the generation service and rendering its output.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: Url,
    pub poll_interval: Duration,
    pub http_timeout: Option<Duration>,
    pub headers: HeadersMap,
    pub export_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval: default_poll_interval(),
            http_timeout: None,
            headers: HeadersMap::default(),
            export_name: DEFAULT_EXPORT_NAME.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - WIDGET_API_BASE_URL: generation service base URL (default: http://localhost:3001/api)
    /// - WIDGET_POLL_INTERVAL_MS: re-poll interval in milliseconds (default: 10000)
    /// - WIDGET_HTTP_TIMEOUT_MS: optional per-request timeout in milliseconds
    /// - WIDGET_DATASOURCE_AUTH_HEADERS: JSON object passed to widgets (default: {})
    /// - WIDGET_EXPORT_NAME: export extracted from generated modules (default: WidgetComponent)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServiceConfig::from_env`] but reading through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup(ENV_API_BASE_URL)
            .and_then(|raw| match parse_base_url(&raw) {
                Ok(url) => Some(url),
                Err(err) => {
                    tracing::warn!(
                        target = "aiwidget",
                        value = %raw,
                        error = %err,
                        "invalid {ENV_API_BASE_URL}; using default"
                    );
                    None
                }
            })
            .unwrap_or_else(default_base_url);

        let poll_interval = lookup(ENV_POLL_INTERVAL_MS)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or_else(default_poll_interval);

        let http_timeout = lookup(ENV_HTTP_TIMEOUT_MS)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let headers = lookup(ENV_AUTH_HEADERS)
            .map(|raw| HeadersMap::parse_permissive(&raw))
            .unwrap_or_default();

        let export_name = lookup(ENV_EXPORT_NAME)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_EXPORT_NAME.to_string());

        Self {
            base_url,
            poll_interval,
            http_timeout,
            headers,
            export_name,
        }
    }
}

/// Parse a base URL and make sure it ends with `/` so relative joins keep
/// its last path segment.
pub fn parse_base_url(raw: &str) -> Result<Url, url::ParseError> {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("{trimmed}/"))
    }
}

static DEFAULT_BASE: Lazy<Url> =
    Lazy::new(|| parse_base_url(DEFAULT_API_BASE_URL).expect("default api base url"));

fn default_base_url() -> Url {
    DEFAULT_BASE.clone()
}
