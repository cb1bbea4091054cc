//! Trust-anchor loading for each trust mode.

use crate::error::RequestError;
use crate::trust::{ClientIdentity, TrustMode};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::RootCertStore;
use rustls_pki_types::pem::PemObject;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

/// Platform roots are read once and shared read-only afterwards.
static SYSTEM_ROOTS: OnceLock<Arc<RootCertStore>> = OnceLock::new();

/// Returns the anchors a verifying handshake should use, or `None` when
/// verification is disabled.
pub fn roots_for(mode: &TrustMode) -> Result<Option<Arc<RootCertStore>>, RequestError> {
    match mode {
        TrustMode::Disabled => Ok(None),
        TrustMode::SystemDefault => Ok(Some(system_roots())),
        TrustMode::CaFile(path) => load_ca_file(path).map(|roots| Some(Arc::new(roots))),
        TrustMode::CaDirectory(path) => load_ca_directory(path).map(|roots| Some(Arc::new(roots))),
    }
}

/// Loads every certificate in a PEM bundle.
pub fn load_ca_file(path: &Path) -> Result<RootCertStore, RequestError> {
    let certs = read_certificates(path)?;
    if certs.is_empty() {
        return Err(RequestError::Config(format!(
            "CA file {} contains no PEM certificates",
            path.display()
        )));
    }

    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots.add(cert).map_err(|e| {
            RequestError::Config(format!(
                "CA file {} holds an unusable trust anchor: {e}",
                path.display()
            ))
        })?;
    }

    tracing::debug!(path = %path.display(), anchors = roots.len(), "Loaded CA file");
    Ok(roots)
}

/// Loads a hashed certificate directory.
///
/// Only `<subject hash>.<n>` entries are considered, the same files a
/// hash-based lookup would open. Entries that fail to parse are skipped.
pub fn load_ca_directory(dir: &Path) -> Result<RootCertStore, RequestError> {
    let listing = fs::read_dir(dir).map_err(|e| {
        RequestError::Config(format!("CA path {} is not readable: {e}", dir.display()))
    })?;

    let mut candidates: Vec<PathBuf> = listing
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_str().is_some_and(is_hashed_name))
        .map(|entry| entry.path())
        .collect();
    candidates.sort();

    let mut roots = RootCertStore::empty();
    for candidate in &candidates {
        let certs = match read_certificates(candidate) {
            Ok(certs) => certs,
            Err(e) => {
                tracing::warn!("Skipping CA path entry: {}", e);
                continue;
            }
        };
        for cert in certs {
            if let Err(e) = roots.add(cert) {
                tracing::warn!(entry = %candidate.display(), "Skipping trust anchor: {}", e);
            }
        }
    }

    if roots.is_empty() {
        return Err(RequestError::Config(format!(
            "CA path {} contains no hashed certificate entries",
            dir.display()
        )));
    }

    tracing::debug!(path = %dir.display(), anchors = roots.len(), "Loaded CA directory");
    Ok(roots)
}

/// Reads a client certificate chain and its private key.
pub fn load_identity(
    identity: &ClientIdentity,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), RequestError> {
    let chain = read_certificates(&identity.cert)?;
    if chain.is_empty() {
        return Err(RequestError::Config(format!(
            "client certificate {} contains no PEM certificates",
            identity.cert.display()
        )));
    }

    let key_pem = read_file(&identity.key)?;
    let key = PrivateKeyDer::from_pem_slice(&key_pem).map_err(|e| {
        RequestError::Config(format!(
            "client key {} holds no usable private key: {e}",
            identity.key.display()
        ))
    })?;

    Ok((chain, key))
}

fn system_roots() -> Arc<RootCertStore> {
    SYSTEM_ROOTS
        .get_or_init(|| {
            let loaded = rustls_native_certs::load_native_certs();
            for err in &loaded.errors {
                tracing::warn!("Platform certificate load error: {}", err);
            }

            let mut roots = RootCertStore::empty();
            let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
            tracing::debug!(added, ignored, "Loaded platform trust anchors");

            if roots.is_empty() {
                tracing::debug!("Platform store is empty, using bundled Mozilla roots");
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            }
            Arc::new(roots)
        })
        .clone()
}

fn read_file(path: &Path) -> Result<Vec<u8>, RequestError> {
    fs::read(path)
        .map_err(|e| RequestError::Config(format!("failed to read {}: {e}", path.display())))
}

fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, RequestError> {
    let pem = read_file(path)?;
    CertificateDer::pem_slice_iter(&pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            RequestError::Config(format!("{} contains malformed PEM: {e}", path.display()))
        })
}

/// `5ad8a5d6.0` style names; `.r0` revocation lists do not qualify.
fn is_hashed_name(name: &str) -> bool {
    let Some((hash, index)) = name.split_once('.') else {
        return false;
    };
    hash.len() == 8
        && hash.bytes().all(|b| b.is_ascii_hexdigit())
        && !index.is_empty()
        && index.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashed_names() {
        assert!(is_hashed_name("5ad8a5d6.0"));
        assert!(is_hashed_name("ABCDEF01.12"));
        assert!(!is_hashed_name("5ad8a5d6.r0"));
        assert!(!is_hashed_name("5ad8a5d6"));
        assert!(!is_hashed_name("digicert.crt"));
        assert!(!is_hashed_name("5ad8a5d.0"));
    }

    #[test]
    fn test_ca_file_without_certificates() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.pem");
        fs::write(&file, "just some text\n").unwrap();
        let err = load_ca_file(&file).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("no PEM certificates"));
    }

    #[test]
    fn test_directory_without_hashed_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.txt"), "nothing here").unwrap();
        let err = load_ca_directory(dir.path()).unwrap_err();
        assert!(err.to_string().contains("no hashed certificate entries"));
    }

    #[test]
    fn test_disabled_mode_has_no_roots() {
        assert!(roots_for(&TrustMode::Disabled).unwrap().is_none());
    }
}
