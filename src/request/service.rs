//! Request service abstraction layer.
//!
//! A trait-based seam over request execution, so callers can hold a
//! `dyn RequestService` and tests can substitute a mock.

use super::executor::RequestExecutor;
use super::types::{RequestSpec, Response};
use crate::error::RequestError;
use crate::infra::dns::DnsResolver;
use crate::trust::TlsOptions;
use std::future::Future;
use std::pin::Pin;

pub type ResponseFuture<'a> = Pin<Box<dyn Future<Output = Result<Response, RequestError>> + Send + 'a>>;

/// Executes HTTP requests.
pub trait RequestService: Send + Sync {
    fn execute(&self, spec: RequestSpec) -> ResponseFuture<'_>;
}

impl<R: DnsResolver> RequestService for RequestExecutor<R> {
    fn execute(&self, spec: RequestSpec) -> ResponseFuture<'_> {
        Box::pin(RequestExecutor::execute(self, spec))
    }
}

/// Convenience methods for any [`RequestService`].
pub trait RequestServiceExt: RequestService {
    fn get(&self, url: &str, tls: TlsOptions) -> ResponseFuture<'_> {
        self.execute(RequestSpec::get(url).with_tls(tls))
    }

    fn post(&self, url: &str, body: Option<String>, tls: TlsOptions) -> ResponseFuture<'_> {
        let mut spec = RequestSpec::new("POST", url).with_tls(tls);
        spec.body = body;
        self.execute(spec)
    }
}

impl<T: RequestService + ?Sized> RequestServiceExt for T {}
