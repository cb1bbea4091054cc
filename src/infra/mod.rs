//! Infrastructure layer: name resolution, sockets, trust anchors and TLS.
//!
//! These pieces know nothing about HTTP; the request layer composes them.

pub mod dns;
pub mod tcp;
pub mod tls;
pub mod trust_store;
pub mod verify_code;

pub use dns::{DnsResolver, DnsResult, HickoryDnsResolver, StaticResolver};
pub use tls::{ConnectError, ConnectionAttempt, TlsConnector, VerificationOutcome};
