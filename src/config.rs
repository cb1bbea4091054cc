use crate::request::RequestSpec;
use crate::trust::TlsOptions;
use std::{env, path::PathBuf};

/// Request defaults taken from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub tls: TlsOptions,
    pub timeout_ms: Option<u64>,
    pub open_timeout_ms: Option<u64>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        let millis = |key: &str| {
            lookup(key).and_then(|v| match v.trim().parse() {
                Ok(ms) => Some(ms),
                Err(_) => {
                    tracing::warn!("Ignoring {}={:?}: not a number of milliseconds", key, v);
                    None
                }
            })
        };

        Self {
            tls: TlsOptions {
                verify_ssl: lookup("VERIFY_SSL").map(|v| parse_bool(&v)).unwrap_or(true),
                ssl_ca_file: path("SSL_CA_FILE"),
                ssl_ca_path: path("SSL_CA_PATH"),
                ssl_client_cert: path("SSL_CLIENT_CERT"),
                ssl_client_key: path("SSL_CLIENT_KEY"),
            },
            timeout_ms: millis("REQUEST_TIMEOUT_MS"),
            open_timeout_ms: millis("OPEN_TIMEOUT_MS"),
        }
    }

    /// A request carrying these defaults.
    pub fn request(&self, method: &str, url: &str) -> RequestSpec {
        let mut spec = RequestSpec::new(method, url).with_tls(self.tls.clone());
        spec.timeout = self.timeout_ms;
        spec.open_timeout = self.open_timeout_ms;
        spec
    }
}

fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
