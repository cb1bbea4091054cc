//! The request layer: executes one HTTP exchange over a freshly opened,
//! explicitly trusted connection.

pub mod executor;
pub mod phase;
pub mod response_builder;
pub mod service;
pub mod translate;
pub mod types;

pub use executor::RequestExecutor;
pub use phase::{Lifecycle, Phase};
pub use response_builder::{build_response, is_binary_content, version_to_string, ResponseParts};
pub use service::{RequestService, RequestServiceExt, ResponseFuture};
pub use types::*;
