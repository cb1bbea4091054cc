//! TLS/SSL infrastructure.
//!
//! Builds a rustls client configuration from a [`TrustConfig`] and performs
//! handshakes under it. The crypto provider is passed explicitly, so no
//! process-wide TLS state is consulted or installed.

use super::trust_store;
use super::verify_code;
use crate::error::RequestError;
use crate::request::Phase;
use crate::trust::{ClientIdentity, TrustConfig};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{
    verify_tls12_signature, verify_tls13_signature, CryptoProvider, WebPkiSupportedAlgorithms,
};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::{io, net::SocketAddr, sync::Arc};
use tokio::{
    net::TcpStream,
    time::{timeout_at, Instant},
};
use tokio_rustls::client::TlsStream;

/// Result of peer verification during a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Chain and hostname checked against the configured anchors.
    Verified,
    /// Verification was disabled for this request.
    Skipped,
    /// The handshake failed. `code` is an `X509_V_*` value, or
    /// `X509_V_OK` when the failure was not a verification failure.
    Failed { reason: String, code: i32 },
}

impl VerificationOutcome {
    fn from_tls_error(err: &rustls::Error) -> Self {
        match err {
            rustls::Error::InvalidCertificate(cert_err) => {
                let code = verify_code::for_certificate_error(cert_err);
                Self::Failed {
                    reason: format!(
                        "certificate verify failed ({}): {err}",
                        verify_code::describe(code)
                    ),
                    code,
                }
            }
            rustls::Error::NoCertificatesPresented => Self::Failed {
                reason: format!("certificate verify failed (no peer certificate): {err}"),
                code: verify_code::X509_V_ERR_UNSPECIFIED,
            },
            other => Self::Failed {
                reason: other.to_string(),
                code: verify_code::X509_V_OK,
            },
        }
    }

    /// Failure of a handshake that was not verifying the peer. Certificate
    /// problems seen here (a key that does not match its certificate, no
    /// certificate at all) never carry a verification code.
    fn from_unverified_tls_error(err: &rustls::Error) -> Self {
        let reason = match err {
            rustls::Error::InvalidCertificate(_) => {
                "TLS handshake failed: peer certificate unusable for the handshake".to_string()
            }
            rustls::Error::NoCertificatesPresented => {
                "TLS handshake failed: peer presented no certificate".to_string()
            }
            other => format!("TLS handshake failed: {other}"),
        };
        Self::Failed {
            reason,
            code: verify_code::X509_V_OK,
        }
    }
}

/// Failure while opening a connection.
#[derive(Debug)]
pub enum ConnectError {
    /// Socket-level failure: refused, reset, unreachable, EOF.
    Network(String),
    /// The deadline elapsed during the given phase.
    TimedOut(Phase),
    /// The TLS layer rejected the handshake; always a `Failed` outcome.
    Handshake(VerificationOutcome),
}

/// An established TLS connection, owned by one request.
pub struct ConnectionAttempt {
    pub host: String,
    pub peer: SocketAddr,
    pub trust: TrustConfig,
    pub stream: TlsStream<TcpStream>,
    pub verification: VerificationOutcome,
}

/// Performs handshakes under one trust configuration.
#[derive(Clone)]
pub struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
    trust: TrustConfig,
}

impl TlsConnector {
    /// Loads trust anchors and client identity up front; every failure here
    /// is a configuration error raised before any socket is opened.
    pub fn new(trust: &TrustConfig, identity: Option<&ClientIdentity>) -> Result<Self, RequestError> {
        let config = client_config(trust, identity)?;
        Ok(Self {
            inner: tokio_rustls::TlsConnector::from(config),
            trust: trust.clone(),
        })
    }

    pub fn trust(&self) -> &TrustConfig {
        &self.trust
    }

    /// Runs the TLS handshake over an open TCP stream.
    pub async fn connect(
        &self,
        tcp: TcpStream,
        host: &str,
        server_name: ServerName<'static>,
        deadline: Instant,
    ) -> Result<ConnectionAttempt, ConnectError> {
        let peer = tcp
            .peer_addr()
            .map_err(|e| ConnectError::Network(format!("connection lost before handshake: {e}")))?;

        let stream = match timeout_at(deadline, self.inner.connect(server_name, tcp)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(classify_handshake_error(&e, self.trust.verifies_peer())),
            Err(_) => return Err(ConnectError::TimedOut(Phase::Handshaking)),
        };

        let verification = if self.trust.verifies_peer() {
            VerificationOutcome::Verified
        } else {
            VerificationOutcome::Skipped
        };

        Ok(ConnectionAttempt {
            host: host.to_string(),
            peer,
            trust: self.trust.clone(),
            stream,
            verification,
        })
    }
}

/// Creates the rustls client configuration for a trust decision.
pub fn client_config(
    trust: &TrustConfig,
    identity: Option<&ClientIdentity>,
) -> Result<Arc<ClientConfig>, RequestError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| RequestError::Config(format!("TLS setup failed: {e}")))?;

    let builder = match trust_store::roots_for(trust.mode())? {
        Some(roots) => builder.with_root_certificates(roots),
        None => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipPeerVerification::new(&provider))),
    };

    let mut config = match identity {
        Some(identity) => {
            let (chain, key) = trust_store::load_identity(identity)?;
            builder
                .with_client_auth_cert(chain, key)
                .map_err(|e| RequestError::Config(format!("client certificate rejected: {e}")))?
        }
        None => builder.with_no_client_auth(),
    };
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// tokio-rustls reports TLS failures as `InvalidData` I/O errors wrapping
/// the rustls error; anything else is the socket failing underneath.
fn classify_handshake_error(err: &io::Error, verifies_peer: bool) -> ConnectError {
    match err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        Some(tls_err) if verifies_peer => {
            ConnectError::Handshake(VerificationOutcome::from_tls_error(tls_err))
        }
        Some(tls_err) => {
            ConnectError::Handshake(VerificationOutcome::from_unverified_tls_error(tls_err))
        }
        None => ConnectError::Network(format!("TLS handshake failed: {err}")),
    }
}

/// Accepts any chain and name. Handshake signatures are still checked so
/// the peer must hold the key for the certificate it presents.
#[derive(Debug)]
struct SkipPeerVerification {
    algorithms: WebPkiSupportedAlgorithms,
}

impl SkipPeerVerification {
    fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for SkipPeerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
