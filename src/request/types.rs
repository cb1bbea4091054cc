use crate::trust::TlsOptions;
use hyper::{body::Bytes, HeaderMap, Version};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::HashMap, net::IpAddr, time::Duration};

/// One outbound request and its TLS options.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestSpec {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    /// Overall deadline in milliseconds
    pub timeout: Option<u64>,
    /// Deadline for connect and handshake in milliseconds
    pub open_timeout: Option<u64>,
    #[serde(flatten)]
    pub tls: TlsOptions,
}

fn default_method() -> String {
    "GET".to_string()
}

impl RequestSpec {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
            open_timeout: None,
            tls: TlsOptions::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(saturating_millis(timeout));
        self
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = Some(saturating_millis(timeout));
        self
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Per-phase timing in milliseconds
#[derive(Debug, Clone, Serialize, Default)]
pub struct TimingInfo {
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<u64>,
    /// Request written until response head received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttfb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<u64>,
}

/// Negotiated session and peer certificate summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsInfo {
    pub protocol: String,
    pub cipher: String,
    /// "verified" or "skipped"
    pub verification: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub san: Vec<String>,
}

/// A completed exchange.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub url: String,
    pub server_ip: Option<IpAddr>,
    pub timing: TimingInfo,
    pub tls: Option<TlsInfo>,
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
