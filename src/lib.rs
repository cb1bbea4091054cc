pub mod config;
pub mod error;
pub mod infra;
pub mod request;
pub mod shared;
pub mod trust;

pub use config::Config;
pub use error::RequestError;
pub use infra::{DnsResolver, HickoryDnsResolver, StaticResolver};
pub use request::{Phase, RequestExecutor, RequestService, RequestServiceExt, RequestSpec, Response};
pub use trust::{ClientIdentity, TlsOptions, TrustConfig, TrustMode};
