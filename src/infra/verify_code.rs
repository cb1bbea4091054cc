//! Certificate verification result codes.
//!
//! Numbering follows the `X509_V_*` codes that OpenSSL-based clients report,
//! so callers comparing against other tooling see familiar values.

use rustls::CertificateError;

pub const X509_V_OK: i32 = 0;
pub const X509_V_ERR_UNSPECIFIED: i32 = 1;
pub const X509_V_ERR_UNABLE_TO_GET_CRL: i32 = 3;
pub const X509_V_ERR_CERT_SIGNATURE_FAILURE: i32 = 7;
pub const X509_V_ERR_CERT_NOT_YET_VALID: i32 = 9;
pub const X509_V_ERR_CERT_HAS_EXPIRED: i32 = 10;
pub const X509_V_ERR_UNABLE_TO_GET_ISSUER_CERT_LOCALLY: i32 = 20;
pub const X509_V_ERR_CERT_REVOKED: i32 = 23;
pub const X509_V_ERR_INVALID_PURPOSE: i32 = 26;
pub const X509_V_ERR_CERT_REJECTED: i32 = 28;
pub const X509_V_ERR_UNHANDLED_CRITICAL_EXTENSION: i32 = 34;
pub const X509_V_ERR_HOSTNAME_MISMATCH: i32 = 62;

/// Maps a rustls certificate error onto the closest verification code.
pub fn for_certificate_error(err: &CertificateError) -> i32 {
    match err {
        CertificateError::UnknownIssuer => X509_V_ERR_UNABLE_TO_GET_ISSUER_CERT_LOCALLY,
        CertificateError::BadSignature => X509_V_ERR_CERT_SIGNATURE_FAILURE,
        CertificateError::Expired | CertificateError::ExpiredContext { .. } => {
            X509_V_ERR_CERT_HAS_EXPIRED
        }
        CertificateError::NotValidYet | CertificateError::NotValidYetContext { .. } => {
            X509_V_ERR_CERT_NOT_YET_VALID
        }
        CertificateError::Revoked => X509_V_ERR_CERT_REVOKED,
        CertificateError::UnknownRevocationStatus
        | CertificateError::ExpiredRevocationListContext { .. } => X509_V_ERR_UNABLE_TO_GET_CRL,
        CertificateError::UnhandledCriticalExtension => X509_V_ERR_UNHANDLED_CRITICAL_EXTENSION,
        CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. } => {
            X509_V_ERR_HOSTNAME_MISMATCH
        }
        CertificateError::InvalidPurpose | CertificateError::InvalidPurposeContext { .. } => {
            X509_V_ERR_INVALID_PURPOSE
        }
        CertificateError::ApplicationVerificationFailure => X509_V_ERR_CERT_REJECTED,
        _ => X509_V_ERR_UNSPECIFIED,
    }
}

/// Human-readable text for a verification code.
pub fn describe(code: i32) -> &'static str {
    match code {
        X509_V_OK => "ok",
        X509_V_ERR_UNABLE_TO_GET_CRL => "unable to get certificate CRL",
        X509_V_ERR_CERT_SIGNATURE_FAILURE => "certificate signature failure",
        X509_V_ERR_CERT_NOT_YET_VALID => "certificate is not yet valid",
        X509_V_ERR_CERT_HAS_EXPIRED => "certificate has expired",
        X509_V_ERR_UNABLE_TO_GET_ISSUER_CERT_LOCALLY => "unable to get local issuer certificate",
        X509_V_ERR_CERT_REVOKED => "certificate revoked",
        X509_V_ERR_INVALID_PURPOSE => "unsupported certificate purpose",
        X509_V_ERR_CERT_REJECTED => "certificate rejected",
        X509_V_ERR_UNHANDLED_CRITICAL_EXTENSION => "unhandled critical extension",
        X509_V_ERR_HOSTNAME_MISMATCH => "hostname mismatch",
        _ => "unspecified certificate verification error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_codes() {
        assert_eq!(
            for_certificate_error(&CertificateError::UnknownIssuer),
            X509_V_ERR_UNABLE_TO_GET_ISSUER_CERT_LOCALLY
        );
        assert_eq!(
            for_certificate_error(&CertificateError::NotValidForName),
            X509_V_ERR_HOSTNAME_MISMATCH
        );
        assert_eq!(
            for_certificate_error(&CertificateError::Expired),
            X509_V_ERR_CERT_HAS_EXPIRED
        );
    }

    #[test]
    fn test_every_mapped_code_is_nonzero() {
        let errors = [
            CertificateError::BadEncoding,
            CertificateError::BadSignature,
            CertificateError::Revoked,
            CertificateError::InvalidPurpose,
            CertificateError::UnhandledCriticalExtension,
        ];
        for err in &errors {
            assert_ne!(for_certificate_error(err), X509_V_OK, "{err:?}");
        }
    }

    #[test]
    fn test_context_variants_share_codes() {
        use rustls::pki_types::{ServerName, UnixTime};
        use std::time::Duration;

        let expired = CertificateError::ExpiredContext {
            time: UnixTime::since_unix_epoch(Duration::from_secs(2_000_000_000)),
            not_after: UnixTime::since_unix_epoch(Duration::from_secs(1_700_000_000)),
        };
        assert_eq!(for_certificate_error(&expired), X509_V_ERR_CERT_HAS_EXPIRED);

        let mismatch = CertificateError::NotValidForNameContext {
            expected: ServerName::try_from("www.mozilla.org").unwrap(),
            presented: vec!["DnsName(\"localhost\")".to_string()],
        };
        assert_eq!(for_certificate_error(&mismatch), X509_V_ERR_HOSTNAME_MISMATCH);
    }

    #[test]
    fn test_unmapped_errors_are_unspecified() {
        assert_eq!(
            for_certificate_error(&CertificateError::BadEncoding),
            X509_V_ERR_UNSPECIFIED
        );
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(20), "unable to get local issuer certificate");
        assert_eq!(describe(62), "hostname mismatch");
        assert_eq!(describe(9999), "unspecified certificate verification error");
    }
}
