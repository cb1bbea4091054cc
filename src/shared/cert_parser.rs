//! X.509 certificate parsing utilities.

use crate::infra::tls::{ConnectionAttempt, VerificationOutcome};
use crate::request::types::TlsInfo;
use std::net::{Ipv4Addr, Ipv6Addr};
use x509_parser::prelude::*;

/// Summary of a DER-encoded certificate.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PeerCertificate {
    pub issuer: Option<String>,
    pub subject: Option<String>,
    pub valid_from: Option<i64>,
    pub valid_to: Option<i64>,
    pub san: Vec<String>,
}

impl PeerCertificate {
    /// Returns `None` when the bytes are not a certificate.
    pub fn parse(der: &[u8]) -> Option<Self> {
        let (_, cert) = X509Certificate::from_der(der).ok()?;

        let san = match cert.subject_alternative_name() {
            Ok(Some(ext)) => ext
                .value
                .general_names
                .iter()
                .filter_map(general_name_to_string)
                .collect(),
            _ => Vec::new(),
        };

        Some(Self {
            issuer: display_name(cert.issuer()),
            subject: display_name(cert.subject()),
            valid_from: Some(cert.validity().not_before.timestamp()),
            valid_to: Some(cert.validity().not_after.timestamp()),
            san,
        })
    }
}

/// Common name when present, full distinguished name otherwise.
fn display_name(name: &X509Name<'_>) -> Option<String> {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
        .or_else(|| Some(name.to_string()))
}

fn general_name_to_string(name: &GeneralName<'_>) -> Option<String> {
    match name {
        GeneralName::DNSName(dns) => Some(dns.to_string()),
        GeneralName::IPAddress(bytes) => match bytes.len() {
            4 => {
                let octets: [u8; 4] = (*bytes).try_into().ok()?;
                Some(Ipv4Addr::from(octets).to_string())
            }
            16 => {
                let octets: [u8; 16] = (*bytes).try_into().ok()?;
                Some(Ipv6Addr::from(octets).to_string())
            }
            _ => None,
        },
        _ => None,
    }
}

/// Describes the negotiated session of an established connection.
pub fn describe_session(attempt: &ConnectionAttempt) -> TlsInfo {
    let (_, session) = attempt.stream.get_ref();

    let protocol = match session.protocol_version() {
        Some(rustls::ProtocolVersion::TLSv1_2) => "TLS 1.2".to_string(),
        Some(rustls::ProtocolVersion::TLSv1_3) => "TLS 1.3".to_string(),
        _ => "TLS".to_string(),
    };

    let cipher = session
        .negotiated_cipher_suite()
        .map(|cs| format!("{:?}", cs.suite()))
        .unwrap_or_else(|| "Unknown".to_string());

    let verification = match attempt.verification {
        VerificationOutcome::Skipped => "skipped",
        _ => "verified",
    }
    .to_string();

    let leaf = session
        .peer_certificates()
        .and_then(|certs| certs.first())
        .and_then(|cert| PeerCertificate::parse(cert.as_ref()))
        .unwrap_or_default();

    TlsInfo {
        protocol,
        cipher,
        verification,
        issuer: leaf.issuer,
        subject: leaf.subject,
        valid_from: leaf.valid_from,
        valid_to: leaf.valid_to,
        san: leaf.san,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_invalid_der() {
        assert!(PeerCertificate::parse(&[0, 1, 2, 3]).is_none());
    }

    #[test]
    fn test_ip_san_formatting() {
        let v4 = GeneralName::IPAddress(&[127, 0, 0, 1]);
        assert_eq!(general_name_to_string(&v4).as_deref(), Some("127.0.0.1"));

        let loopback = Ipv6Addr::LOCALHOST.octets();
        let v6 = GeneralName::IPAddress(&loopback);
        assert_eq!(general_name_to_string(&v6).as_deref(), Some("::1"));

        let bogus = GeneralName::IPAddress(&[1, 2, 3]);
        assert_eq!(general_name_to_string(&bogus), None);
    }
}
