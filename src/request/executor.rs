//! HTTP request execution under an explicit trust configuration.
//!
//! One call opens one connection and walks it through
//! `Idle → Connecting → Handshaking → Sending → ReceivingResponse → Done`.
//! Any failure ends the attempt; retries are the caller's decision.

use super::phase::{Lifecycle, Phase};
use super::response_builder::{build_response, ResponseParts};
use super::translate;
use super::types::*;
use crate::error::RequestError;
use crate::infra::dns::{DnsResolver, HickoryDnsResolver};
use crate::infra::tcp;
use crate::infra::tls::{ConnectError, TlsConnector};
use crate::shared::{describe_session, DetailedTiming, Stage};
use crate::trust::{ClientIdentity, TrustConfig};
use http_body_util::{BodyExt, Full};
use hyper::{
    body::Bytes,
    header::{HeaderName, HeaderValue, HOST, USER_AGENT},
    HeaderMap, Method, Request, StatusCode, Version,
};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use std::{future::Future, str::FromStr, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    time::{timeout_at, Instant},
};

/// Default request timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 30000;

const DEFAULT_USER_AGENT: &str = concat!("trusted-request/", env!("CARGO_PKG_VERSION"));

/// Where a request goes.
#[derive(Debug)]
struct Target {
    url: String,
    host: String,
    host_header: String,
    port: u16,
    path: String,
    /// Present for `https` targets only.
    server_name: Option<ServerName<'static>>,
}

impl Target {
    fn from_url(url: &str) -> Result<Self, RequestError> {
        let parsed = url::Url::parse(url).map_err(|e| RequestError::InvalidUrl(format!("{url}: {e}")))?;

        let is_https = match parsed.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(RequestError::InvalidUrl(format!(
                    "unsupported scheme '{other}'"
                )))
            }
        };

        let host = match parsed.host() {
            Some(url::Host::Domain(domain)) => domain.to_string(),
            Some(url::Host::Ipv4(ip)) => ip.to_string(),
            Some(url::Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(RequestError::InvalidUrl("URL has no host".to_string())),
        };

        let port = parsed
            .port_or_known_default()
            .unwrap_or(if is_https { 443 } else { 80 });

        let host_str = parsed.host_str().unwrap_or(&host);
        let host_header = match parsed.port() {
            Some(explicit) => format!("{host_str}:{explicit}"),
            None => host_str.to_string(),
        };

        let path = &parsed[url::Position::BeforePath..url::Position::AfterQuery];
        let path = if path.is_empty() { "/" } else { path }.to_string();

        let server_name = if is_https {
            Some(ServerName::try_from(host.clone()).map_err(|e| {
                RequestError::InvalidUrl(format!("invalid TLS server name '{host}': {e}"))
            })?)
        } else {
            None
        };

        Ok(Self {
            url: url.to_string(),
            host,
            host_header,
            port,
            path,
            server_name,
        })
    }
}

/// Absolute deadlines derived from the request's timeouts.
#[derive(Debug, Clone, Copy)]
struct Deadlines {
    /// Bounds the whole exchange.
    overall: Instant,
    /// Bounds DNS, TCP connect and the TLS handshake.
    open: Instant,
}

impl Deadlines {
    fn from_spec(spec: &RequestSpec) -> Self {
        let start = Instant::now();
        let overall = after(start, spec.timeout.unwrap_or(DEFAULT_TIMEOUT_MS));
        let open = match spec.open_timeout {
            Some(ms) => overall.min(after(start, ms)),
            None => overall,
        };
        Self { overall, open }
    }
}

/// `start + ms`, clamped to a year out when the sum would overflow.
fn after(start: Instant, ms: u64) -> Instant {
    start
        .checked_add(Duration::from_millis(ms))
        .unwrap_or_else(|| start + Duration::from_secs(365 * 24 * 60 * 60))
}

/// Raw HTTP exchange result.
struct Exchange {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
}

/// Executes requests, one fresh connection each.
///
/// Holds no per-request state, so one executor can serve concurrent calls.
pub struct RequestExecutor<R = HickoryDnsResolver> {
    resolver: R,
}

impl RequestExecutor {
    pub fn new() -> Self {
        Self {
            resolver: HickoryDnsResolver::new(),
        }
    }
}

impl Default for RequestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: DnsResolver> RequestExecutor<R> {
    pub fn with_resolver(resolver: R) -> Self {
        Self { resolver }
    }

    pub async fn execute(&self, spec: RequestSpec) -> Result<Response, RequestError> {
        let mut lifecycle = Lifecycle::new(&spec.url);
        let result = self.run(&spec, &mut lifecycle).await;
        match &result {
            Ok(_) => lifecycle.advance(Phase::Done),
            Err(e) => lifecycle.fail(e),
        }
        result
    }

    /// Like [`execute`](Self::execute), abandoning the request in whatever
    /// phase it is in once `cancel` completes.
    pub async fn execute_until<F>(&self, spec: RequestSpec, cancel: F) -> Result<Response, RequestError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => Err(RequestError::Cancelled),
            result = self.execute(spec) => result,
        }
    }

    async fn run(&self, spec: &RequestSpec, lifecycle: &mut Lifecycle) -> Result<Response, RequestError> {
        // Everything that can fail without the network fails here.
        let target = Target::from_url(&spec.url)?;
        let trust = TrustConfig::from_options(&spec.tls)?;
        let identity = ClientIdentity::from_options(&spec.tls)?;
        let connector = match target.server_name {
            Some(_) => Some(TlsConnector::new(&trust, identity.as_ref())?),
            None => None,
        };
        let request = build_http_request(spec, &target)?;
        let deadlines = Deadlines::from_spec(spec);
        let mut timing = DetailedTiming::new();

        lifecycle.advance(Phase::Connecting);
        timing.begin(Stage::Dns);
        let dns = match timeout_at(deadlines.open, self.resolver.resolve(&target.host)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => return Err(RequestError::ConnectionFailed(e)),
            Err(_) => {
                return Err(RequestError::Timeout {
                    phase: Phase::Connecting,
                })
            }
        };
        timing.end(Stage::Dns);

        timing.begin(Stage::Tcp);
        let tcp_stream = tcp::connect_any(&dns.ips, target.port, deadlines.open)
            .await
            .map_err(connect_error)?;
        timing.end(Stage::Tcp);
        let server_ip = tcp_stream.peer_addr().ok().map(|addr| addr.ip());

        let (exchange, tls) = match (connector, target.server_name.clone()) {
            (Some(connector), Some(server_name)) => {
                lifecycle.advance(Phase::Handshaking);
                timing.begin(Stage::Tls);
                let attempt = connector
                    .connect(tcp_stream, &target.host, server_name, deadlines.open)
                    .await
                    .map_err(connect_error)?;
                timing.end(Stage::Tls);
                tracing::debug!(
                    host = %attempt.host,
                    peer = %attempt.peer,
                    verification = ?attempt.verification,
                    "TLS session established"
                );

                let tls = describe_session(&attempt);
                let exchange =
                    send_and_receive(attempt.stream, request, deadlines.overall, lifecycle, &mut timing)
                        .await?;
                (exchange, Some(tls))
            }
            _ => {
                let exchange =
                    send_and_receive(tcp_stream, request, deadlines.overall, lifecycle, &mut timing).await?;
                (exchange, None)
            }
        };

        Ok(build_response(ResponseParts {
            status: exchange.status,
            version: exchange.version,
            headers: exchange.headers,
            body: exchange.body,
            url: target.url,
            server_ip,
            timing,
            tls,
        }))
    }
}

fn connect_error(err: ConnectError) -> RequestError {
    match err {
        ConnectError::Network(message) => RequestError::ConnectionFailed(message),
        ConnectError::TimedOut(phase) => RequestError::Timeout { phase },
        ConnectError::Handshake(outcome) => translate::from_outcome(&outcome)
            .unwrap_or_else(|| RequestError::ConnectionFailed("TLS handshake failed".to_string())),
    }
}

/// Builds an HTTP/1.1 request; caller headers override the defaults.
fn build_http_request(spec: &RequestSpec, target: &Target) -> Result<Request<Full<Bytes>>, RequestError> {
    let method = Method::from_str(&spec.method.to_uppercase())
        .map_err(|_| RequestError::InvalidRequest(format!("Invalid method: {}", spec.method)))?;

    let body = spec.body.clone().unwrap_or_default();
    let mut request = Request::builder()
        .method(method)
        .uri(target.path.as_str())
        .header(HOST, target.host_header.as_str())
        .body(Full::new(Bytes::from(body)))
        .map_err(|e| RequestError::InvalidRequest(format!("Failed to build request: {e}")))?;

    let headers = request.headers_mut();
    for (key, value) in &spec.headers {
        let name = HeaderName::from_str(key)
            .map_err(|_| RequestError::InvalidRequest(format!("Invalid header name: {key}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| RequestError::InvalidRequest(format!("Invalid value for header {key}")))?;
        headers.insert(name, value);
    }
    headers
        .entry(USER_AGENT)
        .or_insert(HeaderValue::from_static(DEFAULT_USER_AGENT));

    Ok(request)
}

/// Writes the request and reads the full response over an open stream.
async fn send_and_receive<IO>(
    io: IO,
    request: Request<Full<Bytes>>,
    deadline: Instant,
    lifecycle: &mut Lifecycle,
    timing: &mut DetailedTiming,
) -> Result<Exchange, RequestError>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    lifecycle.advance(Phase::Sending);
    timing.begin(Stage::Wait);

    let (mut sender, conn) =
        match timeout_at(deadline, hyper::client::conn::http1::handshake(TokioIo::new(io))).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                return Err(RequestError::ConnectionFailed(format!(
                    "HTTP handshake failed: {e}"
                )))
            }
            Err(_) => {
                return Err(RequestError::Timeout {
                    phase: Phase::Sending,
                })
            }
        };

    // Drives the connection; its errors also surface through the sender.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("Connection closed with error: {}", e);
        }
    });

    match timeout_at(deadline, sender.ready()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(RequestError::ConnectionFailed(format!("Request failed: {e}"))),
        Err(_) => {
            return Err(RequestError::Timeout {
                phase: Phase::Sending,
            })
        }
    }

    // The request is queued on the connection here; the wait that follows
    // is for the response head.
    let pending = sender.send_request(request);
    lifecycle.advance(Phase::ReceivingResponse);

    let response = match timeout_at(deadline, pending).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => return Err(RequestError::ConnectionFailed(format!("Request failed: {e}"))),
        Err(_) => {
            return Err(RequestError::Timeout {
                phase: Phase::ReceivingResponse,
            })
        }
    };
    timing.end(Stage::Wait);

    timing.begin(Stage::Download);
    let (parts, body) = response.into_parts();
    let body = match timeout_at(deadline, body.collect()).await {
        Ok(Ok(collected)) => collected.to_bytes(),
        Ok(Err(e)) => {
            return Err(RequestError::ConnectionFailed(format!(
                "Failed to read body: {e}"
            )))
        }
        Err(_) => {
            return Err(RequestError::Timeout {
                phase: Phase::ReceivingResponse,
            })
        }
    };
    timing.end(Stage::Download);

    Ok(Exchange {
        status: parts.status,
        version: parts.version,
        headers: parts.headers,
        body,
    })
}
