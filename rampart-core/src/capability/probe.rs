//! TCP connect probing for network-scan jobs.
//!
//! The probe attempts plain `connect()` calls against a curated port list
//! and reports each accepted connection as one finding. No banner grabbing,
//! no half-open tricks: a completed handshake is the whole signal, which
//! keeps the capability safe to point at production hosts.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use ipnetwork::IpNetwork;
use rampart_model::{Exposure, Finding, JobKind};
use tokio::net::{TcpStream, lookup_host};
use tracing::debug;

use crate::capability::AssessmentCapability;
use crate::error::{PipelineError, Result};

/// Ports worth a connect attempt when the job does not say otherwise.
/// Biased toward services that are interesting when reachable at all.
const DEFAULT_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 143, 443, 445, 993, 995, 1433, 3306, 3389, 5432, 5900, 6379,
    8080, 8443,
];

/// Tuning for [`PortProbe`].
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Ports attempted on every probed host.
    pub ports: Vec<u16>,
    /// Deadline for a single connect attempt.
    pub connect_timeout: Duration,
    /// Concurrent connect attempts within one job.
    pub parallelism: usize,
    /// Upper bound on hosts expanded out of a CIDR target.
    pub max_hosts: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PORTS.to_vec(),
            connect_timeout: Duration::from_millis(1_500),
            parallelism: 16,
            max_hosts: 16,
        }
    }
}

/// Connect-scan capability for [`JobKind::NetworkScan`].
#[derive(Debug)]
pub struct PortProbe {
    config: ProbeConfig,
}

impl PortProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Expand the target into concrete addresses to probe.
    ///
    /// Literal addresses pass through, CIDR blocks enumerate up to
    /// `max_hosts`, and anything else goes through resolver lookup.
    async fn expand_target(&self, target: &str) -> Result<Vec<IpAddr>> {
        if let Ok(ip) = target.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        if let Ok(network) = target.parse::<IpNetwork>() {
            let hosts: Vec<IpAddr> = network.iter().take(self.config.max_hosts).collect();
            if hosts.is_empty() {
                return Err(PipelineError::Capability(format!(
                    "network {target} contains no probeable hosts"
                )));
            }
            return Ok(hosts);
        }
        let mut hosts: Vec<IpAddr> = lookup_host((target, 0u16))
            .await
            .map_err(|e| {
                PipelineError::Capability(format!("DNS resolution failed for {target}: {e}"))
            })?
            .map(|addr| addr.ip())
            .collect();
        hosts.sort_unstable();
        hosts.dedup();
        if hosts.is_empty() {
            return Err(PipelineError::Capability(format!(
                "DNS resolution returned no addresses for {target}"
            )));
        }
        Ok(hosts)
    }

    async fn connect_one(&self, addr: SocketAddr) -> Option<SocketAddr> {
        match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => Some(addr),
            Ok(Err(_)) | Err(_) => None,
        }
    }
}

#[async_trait]
impl AssessmentCapability for PortProbe {
    fn kind(&self) -> JobKind {
        JobKind::NetworkScan
    }

    fn name(&self) -> &'static str {
        "port-probe"
    }

    async fn execute(&self, target: &str) -> Result<Vec<Finding>> {
        let hosts = self.expand_target(target).await?;
        let multi_host = hosts.len() > 1;
        debug!(
            target = %target,
            hosts = hosts.len(),
            ports = self.config.ports.len(),
            "starting connect probe"
        );

        let attempts = hosts
            .iter()
            .flat_map(|&ip| self.config.ports.iter().map(move |&port| SocketAddr::new(ip, port)));
        let open: Vec<SocketAddr> = stream::iter(attempts)
            .map(|addr| self.connect_one(addr))
            .buffer_unordered(self.config.parallelism.max(1))
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await;

        let mut findings: Vec<Finding> = open
            .into_iter()
            .map(|addr| {
                let profile = service_profile(addr.port());
                let identifier = if multi_host {
                    format!("{}:{}/tcp", addr.ip(), addr.port())
                } else {
                    format!("{}/tcp", addr.port())
                };
                let finding = Finding::new(
                    identifier,
                    profile.service,
                    exposure_for(addr.ip()),
                    profile.classification,
                );
                match profile.baseline_severity {
                    Some(score) => finding.with_severity(score),
                    None => finding,
                }
            })
            .collect();
        // buffer_unordered completes in arrival order; pin the output down.
        findings.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        debug!(target = %target, open = findings.len(), "connect probe finished");
        Ok(findings)
    }
}

struct ServiceProfile {
    service: &'static str,
    classification: &'static str,
    /// Baseline risk of the service being reachable at all, 0-10 scale.
    /// `None` for services whose exposure is unremarkable on its own.
    baseline_severity: Option<f64>,
}

fn service_profile(port: u16) -> ServiceProfile {
    let (service, classification, baseline_severity) = match port {
        21 => ("ftp", "file-transfer", Some(7.5)),
        22 => ("ssh", "remote-access", Some(5.0)),
        23 => ("telnet", "remote-access", Some(8.5)),
        25 => ("smtp", "mail", Some(5.3)),
        53 => ("dns", "infrastructure", None),
        80 => ("http", "web", None),
        110 => ("pop3", "mail", Some(6.5)),
        143 => ("imap", "mail", Some(6.5)),
        443 => ("https", "web", None),
        445 => ("smb", "file-transfer", Some(8.0)),
        993 => ("imaps", "mail", None),
        995 => ("pop3s", "mail", None),
        1433 => ("mssql", "database", Some(7.0)),
        3306 => ("mysql", "database", Some(7.0)),
        3389 => ("rdp", "remote-access", Some(8.0)),
        5432 => ("postgresql", "database", Some(7.0)),
        5900 => ("vnc", "remote-access", Some(7.8)),
        6379 => ("redis", "cache", Some(8.2)),
        8080 => ("http-alt", "web", None),
        8443 => ("https-alt", "web", None),
        _ => ("unknown", "network", None),
    };
    ServiceProfile {
        service,
        classification,
        baseline_severity,
    }
}

/// Reachability tier inferred from address scope alone.
///
/// Perimeter is never inferred here: a connect probe cannot tell a DMZ
/// from any other private segment, so that tier only enters findings via
/// catalog data.
fn exposure_for(ip: IpAddr) -> Exposure {
    match ip {
        IpAddr::V4(v4) => {
            if v4.is_loopback() {
                Exposure::Local
            } else if v4.is_private() || v4.is_link_local() {
                Exposure::Internal
            } else {
                Exposure::Public
            }
        }
        IpAddr::V6(v6) => {
            if v6.is_loopback() {
                Exposure::Local
            } else if v6.is_unique_local() || v6.is_unicast_link_local() {
                Exposure::Internal
            } else {
                Exposure::Public
            }
        }
    }
}
