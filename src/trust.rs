//! Resolution of per-request TLS options into an immutable trust decision.
//!
//! Nothing here touches the network or parses certificates; the only side
//! effect is checking that referenced paths exist and can be read, so a bad
//! path is reported before any connection is attempted.

use crate::error::RequestError;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Flat TLS options as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TlsOptions {
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    #[serde(default)]
    pub ssl_ca_file: Option<PathBuf>,
    #[serde(default)]
    pub ssl_ca_path: Option<PathBuf>,
    #[serde(default)]
    pub ssl_client_cert: Option<PathBuf>,
    #[serde(default)]
    pub ssl_client_key: Option<PathBuf>,
}

fn default_verify_ssl() -> bool {
    true
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            verify_ssl: true,
            ssl_ca_file: None,
            ssl_ca_path: None,
            ssl_client_cert: None,
            ssl_client_key: None,
        }
    }
}

impl TlsOptions {
    /// Options that skip peer verification entirely.
    pub fn insecure() -> Self {
        Self {
            verify_ssl: false,
            ..Self::default()
        }
    }

    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_ca_file = Some(path.into());
        self
    }

    pub fn with_ca_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_ca_path = Some(path.into());
        self
    }

    pub fn with_client_cert(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.ssl_client_cert = Some(cert.into());
        self.ssl_client_key = Some(key.into());
        self
    }
}

/// Where the trust anchors for peer verification come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrustMode {
    /// Platform trust store.
    SystemDefault,
    /// A single PEM bundle.
    CaFile(PathBuf),
    /// A hashed certificate directory.
    CaDirectory(PathBuf),
    /// No chain or hostname verification at all.
    Disabled,
}

/// Immutable trust configuration for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrustConfig {
    mode: TrustMode,
}

impl TrustConfig {
    /// Resolves caller options.
    ///
    /// Order: verification off, then CA file, then CA directory, then the
    /// system store. Turning verification off while also naming a CA source
    /// is rejected instead of silently ignoring one of the two.
    pub fn from_options(options: &TlsOptions) -> Result<Self, RequestError> {
        if !options.verify_ssl {
            if options.ssl_ca_file.is_some() || options.ssl_ca_path.is_some() {
                return Err(RequestError::Config(
                    "verify_ssl is false but a CA file or CA path was also given".to_string(),
                ));
            }
            return Ok(Self::disabled());
        }

        if let Some(file) = &options.ssl_ca_file {
            check_readable_file(file, "ssl_ca_file")?;
            return Ok(Self {
                mode: TrustMode::CaFile(file.clone()),
            });
        }

        if let Some(dir) = &options.ssl_ca_path {
            check_readable_dir(dir, "ssl_ca_path")?;
            return Ok(Self {
                mode: TrustMode::CaDirectory(dir.clone()),
            });
        }

        Ok(Self::system_default())
    }

    pub fn system_default() -> Self {
        Self {
            mode: TrustMode::SystemDefault,
        }
    }

    pub fn disabled() -> Self {
        Self {
            mode: TrustMode::Disabled,
        }
    }

    pub fn mode(&self) -> &TrustMode {
        &self.mode
    }

    /// Whether the handshake checks the peer's chain and hostname.
    pub fn verifies_peer(&self) -> bool {
        !matches!(self.mode, TrustMode::Disabled)
    }
}

/// Client certificate and key presented during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl ClientIdentity {
    pub fn from_options(options: &TlsOptions) -> Result<Option<Self>, RequestError> {
        match (&options.ssl_client_cert, &options.ssl_client_key) {
            (None, None) => Ok(None),
            (Some(cert), Some(key)) => {
                check_readable_file(cert, "ssl_client_cert")?;
                check_readable_file(key, "ssl_client_key")?;
                Ok(Some(Self {
                    cert: cert.clone(),
                    key: key.clone(),
                }))
            }
            _ => Err(RequestError::Config(
                "ssl_client_cert and ssl_client_key must be set together".to_string(),
            )),
        }
    }
}

fn check_readable_file(path: &Path, option: &str) -> Result<(), RequestError> {
    let metadata = fs::metadata(path).map_err(|e| {
        RequestError::Config(format!("{option} {} is not accessible: {e}", path.display()))
    })?;
    if !metadata.is_file() {
        return Err(RequestError::Config(format!(
            "{option} {} is not a file",
            path.display()
        )));
    }
    fs::File::open(path).map_err(|e| {
        RequestError::Config(format!("{option} {} is not readable: {e}", path.display()))
    })?;
    Ok(())
}

fn check_readable_dir(path: &Path, option: &str) -> Result<(), RequestError> {
    let metadata = fs::metadata(path).map_err(|e| {
        RequestError::Config(format!("{option} {} is not accessible: {e}", path.display()))
    })?;
    if !metadata.is_dir() {
        return Err(RequestError::Config(format!(
            "{option} {} is not a directory",
            path.display()
        )));
    }
    fs::read_dir(path).map_err(|e| {
        RequestError::Config(format!("{option} {} is not readable: {e}", path.display()))
    })?;
    Ok(())
}
