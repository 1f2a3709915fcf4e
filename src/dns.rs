// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! etcd member identity resolution via DNS SRV records.
//!
//! Every etcd member publishes an SRV record under
//! `_etcd-server-ssl._tcp.<discovery domain>`. A node's canonical member hostname is
//! the SRV target whose forward lookup contains the node's IP.
//!
//! # Architecture
//!
//! 1. Query SRV records for `_<service>._<proto>.<domain>.`
//! 2. Forward-lookup every target (A/AAAA, hosts file included)
//! 3. The target whose address set contains the node IP is the member hostname
//!
//! Forward lookups ask for A and AAAA records together. The resolver keeps no answer
//! cache, so lookups are never cached across reconciles; a failed forward lookup of any target
//! aborts resolution because an unreachable resolver must not be mistaken for a
//! missing member.
//!
//! # Example
//!
//! ```rust,no_run
//! use etcd_host_endpoints::dns::{resolve_member_hostname, HickoryResolver};
//! use std::net::IpAddr;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let resolver = HickoryResolver::from_system_conf()?;
//! let ip: IpAddr = "10.0.0.1".parse()?;
//! let hostname = resolve_member_hostname(&resolver, "etcd-server-ssl", "tcp", "example.com", ip).await?;
//! # Ok(())
//! # }
//! ```

use crate::errors::{HostEndpointsError, Result};
use anyhow::Context as _;
use async_trait::async_trait;
use hickory_proto::rr::Name;
use hickory_resolver::config::{LookupIpStrategy, ResolverOpts};
use hickory_resolver::system_conf::read_system_conf;
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use tracing::debug;

/// DNS lookups needed to map an IP to its SRV-advertised member hostname.
#[async_trait]
pub trait SrvResolver: Send + Sync {
    /// Return the targets of all SRV records for `name`, as fully qualified names.
    ///
    /// # Errors
    ///
    /// Returns [`HostEndpointsError::DnsResolutionFailure`] if the query fails.
    async fn lookup_srv(&self, name: &str) -> Result<Vec<String>>;

    /// Forward-lookup `host` to its addresses.
    ///
    /// # Errors
    ///
    /// Returns [`HostEndpointsError::DnsResolutionFailure`] if the lookup fails.
    async fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>>;
}

/// [`SrvResolver`] backed by hickory's async resolver and the system configuration.
pub struct HickoryResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryResolver {
    /// Build a resolver from `/etc/resolv.conf` (or the platform equivalent).
    ///
    /// # Errors
    ///
    /// Returns an error if the system resolver configuration cannot be read.
    pub fn from_system_conf() -> anyhow::Result<Self> {
        let (config, opts) =
            read_system_conf().context("Failed to load system resolver configuration")?;
        let resolver = TokioAsyncResolver::tokio(config, resolver_opts(opts));
        Ok(Self { resolver })
    }
}

/// Adjust system resolver options for member resolution.
///
/// Both address families are queried on every forward lookup and no answers are
/// cached, so a removed SRV target disappears on the next reconcile.
#[must_use]
pub fn resolver_opts(mut opts: ResolverOpts) -> ResolverOpts {
    opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
    opts.cache_size = 0;
    opts
}

#[async_trait]
impl SrvResolver for HickoryResolver {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<String>> {
        let lookup = self.resolver.srv_lookup(name).await.map_err(|e| {
            HostEndpointsError::DnsResolutionFailure {
                query: name.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(lookup.iter().map(|srv| srv.target().to_utf8()).collect())
    }

    async fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>> {
        let lookup = self.resolver.lookup_ip(host).await.map_err(|e| {
            HostEndpointsError::DnsResolutionFailure {
                query: host.to_string(),
                reason: format!("could not resolve member: {e}"),
            }
        })?;

        Ok(lookup.iter().collect())
    }
}

/// Build the fully qualified SRV query name `_<service>._<proto>.<domain>.`.
///
/// # Errors
///
/// Returns [`HostEndpointsError::DnsResolutionFailure`] if the result is not a valid
/// DNS name.
pub fn srv_query_name(service: &str, proto: &str, domain: &str) -> Result<Name> {
    let raw = format!("_{service}._{proto}.{}", domain.trim_end_matches('.'));
    let mut name = Name::from_ascii(&raw).map_err(|e| HostEndpointsError::DnsResolutionFailure {
        query: raw.clone(),
        reason: format!("invalid SRV name: {e}"),
    })?;
    name.set_fqdn(true);
    Ok(name)
}

/// Strip the trailing `.<discovery domain>` from a member DNS name.
///
/// Names outside the domain are returned unchanged.
#[must_use]
pub fn strip_discovery_domain<'a>(dns_name: &'a str, discovery_domain: &str) -> &'a str {
    dns_name
        .strip_suffix(discovery_domain)
        .and_then(|prefix| prefix.strip_suffix('.'))
        .unwrap_or(dns_name)
}

/// Find the SRV target of `_<service>._<proto>.<domain>` that resolves to `ip`.
///
/// All targets are checked. When more than one target resolves to `ip` the last one
/// wins. The returned name has leading and trailing dots trimmed.
///
/// # Errors
///
/// - [`HostEndpointsError::DnsResolutionFailure`] if the SRV query or any forward
///   lookup fails
/// - [`HostEndpointsError::SelfNotFound`] if no target resolves to `ip`
pub async fn resolve_member_hostname<R>(
    resolver: &R,
    service: &str,
    proto: &str,
    domain: &str,
    ip: IpAddr,
) -> Result<String>
where
    R: SrvResolver + ?Sized,
{
    let query = srv_query_name(service, proto, domain)?.to_ascii();
    let targets = resolver.lookup_srv(&query).await?;

    let mut self_target: Option<String> = None;
    for target in &targets {
        debug!(target = %target, ip = %ip, "checking against SRV target");
        let addrs = resolver.lookup_host(target).await?;

        if addrs.contains(&ip) {
            let trimmed = target.trim_matches('.').to_string();
            if let Some(previous) = &self_target {
                debug!(
                    previous = %previous,
                    current = %trimmed,
                    ip = %ip,
                    "Multiple SRV targets resolve to the same IP, using the last one"
                );
            }
            self_target = Some(trimmed);
        }
    }

    self_target.ok_or_else(|| HostEndpointsError::SelfNotFound {
        query,
        ip: ip.to_string(),
    })
}

#[cfg(test)]
#[path = "dns_tests.rs"]
mod dns_tests;
