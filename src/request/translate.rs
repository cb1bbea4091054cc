//! Translation of raw TLS failures into request errors.
//!
//! Pure functions only, so the policy for what counts as a certificate
//! failure can be exercised without a network.

use crate::error::RequestError;
use crate::infra::tls::VerificationOutcome;
use crate::infra::verify_code::X509_V_OK;

const VERIFICATION_MARKERS: &[&str] = &[
    "certificate verify failed",
    "invalid peer certificate",
    "unknown issuer",
    "unknownissuer",
    "self signed certificate",
    "self-signed certificate",
    "unable to get local issuer certificate",
    "hostname mismatch",
];

/// Maps a raw failure reason and verification code to a request error.
///
/// A nonzero code is always a verification failure. With code zero the
/// reason text decides; alerts sent by the peer never qualify, since they
/// report the peer rejecting us rather than us rejecting the peer.
pub fn translate(reason: &str, code: i32) -> RequestError {
    if code != X509_V_OK || names_verification_failure(reason) {
        RequestError::SslCertificateNotVerified {
            message: reason.to_string(),
            code,
        }
    } else {
        RequestError::ConnectionFailed(reason.to_string())
    }
}

/// `None` for successful or skipped verification.
pub fn from_outcome(outcome: &VerificationOutcome) -> Option<RequestError> {
    match outcome {
        VerificationOutcome::Verified | VerificationOutcome::Skipped => None,
        VerificationOutcome::Failed { reason, code } => Some(translate(reason, *code)),
    }
}

fn names_verification_failure(reason: &str) -> bool {
    let lower = reason.to_ascii_lowercase();
    if lower.contains("alert") {
        return false;
    }
    VERIFICATION_MARKERS.iter().any(|marker| lower.contains(marker))
}
