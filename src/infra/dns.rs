//! DNS resolution infrastructure.
//!
//! A trait seam so requests can run against the system resolver or a pinned
//! host table.

use hickory_resolver::{config::*, TokioAsyncResolver};
use std::{collections::HashMap, future::Future, net::IpAddr, time::Instant};
use tokio::sync::OnceCell;

/// Resolved addresses and how long the lookup took.
#[derive(Debug, Clone)]
pub struct DnsResult {
    pub ips: Vec<IpAddr>,
    pub duration_ms: u64,
}

/// Resolves hostnames to addresses.
pub trait DnsResolver: Send + Sync {
    fn resolve(&self, host: &str) -> impl Future<Output = Result<DnsResult, String>> + Send;
}

/// Resolver backed by hickory, configured from the system when possible.
#[derive(Default)]
pub struct HickoryDnsResolver {
    resolver: OnceCell<TokioAsyncResolver>,
}

impl HickoryDnsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    async fn resolver(&self) -> &TokioAsyncResolver {
        self.resolver
            .get_or_init(|| async {
                TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
                    tracing::debug!("System resolver config unavailable ({}), using defaults", e);
                    TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
                })
            })
            .await
    }
}

impl DnsResolver for HickoryDnsResolver {
    async fn resolve(&self, host: &str) -> Result<DnsResult, String> {
        if let Some(result) = literal(host) {
            return Ok(result);
        }

        let start = Instant::now();
        let response = self
            .resolver()
            .await
            .lookup_ip(host)
            .await
            .map_err(|e| format!("DNS lookup for {host} failed: {e}"))?;

        let ips: Vec<IpAddr> = response.iter().collect();
        if ips.is_empty() {
            return Err(format!("DNS lookup for {host} returned no addresses"));
        }
        Ok(DnsResult {
            ips,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Fixed host table; unknown names fail to resolve.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>, ip: IpAddr) -> Self {
        self.hosts
            .entry(host.into().to_ascii_lowercase())
            .or_default()
            .push(ip);
        self
    }
}

impl DnsResolver for StaticResolver {
    async fn resolve(&self, host: &str) -> Result<DnsResult, String> {
        if let Some(result) = literal(host) {
            return Ok(result);
        }
        self.hosts
            .get(&host.to_ascii_lowercase())
            .map(|ips| DnsResult {
                ips: ips.clone(),
                duration_ms: 0,
            })
            .ok_or_else(|| format!("no static address for {host}"))
    }
}

fn literal(host: &str) -> Option<DnsResult> {
    host.parse::<IpAddr>().ok().map(|ip| DnsResult {
        ips: vec![ip],
        duration_ms: 0,
    })
}
