//! Helpers shared by the request pipeline.

pub mod cert_parser;
pub mod status_text;
pub mod timing;

pub use cert_parser::{describe_session, PeerCertificate};
pub use status_text::status_text;
pub use timing::{DetailedTiming, Stage};
