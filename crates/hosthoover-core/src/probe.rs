//! Reachability probing

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

/// Probe failures that say nothing about the host
#[derive(Error, Debug, Clone)]
pub enum ProbeError {
    /// Probes cannot be sent at all (no raw socket privilege, no route family)
    #[error("probe unavailable: {0}")]
    Unavailable(String),
}

/// Cheap liveness check performed before a session is opened
#[async_trait]
pub trait Prober: Send + Sync {
    /// `Ok(true)` if the host answered within `timeout`
    async fn probe(&self, addr: IpAddr, timeout: Duration) -> Result<bool, ProbeError>;

    /// Probe method name for logs
    fn method(&self) -> &'static str;
}

const PAYLOAD: [u8; 56] = [0; 56];

/// ICMP echo prober, one raw socket per address family
#[derive(Default)]
pub struct IcmpProber {
    v4: OnceLock<Result<Client, String>>,
    v6: OnceLock<Result<Client, String>>,
    ident: AtomicU16,
}

impl IcmpProber {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, addr: IpAddr) -> Result<&Client, ProbeError> {
        let slot = match addr {
            IpAddr::V4(_) => self
                .v4
                .get_or_init(|| Client::new(&Config::default()).map_err(|e| e.to_string())),
            IpAddr::V6(_) => self.v6.get_or_init(|| {
                Client::new(&Config::builder().kind(ICMP::V6).build()).map_err(|e| e.to_string())
            }),
        };
        slot.as_ref()
            .map_err(|reason| ProbeError::Unavailable(format!("cannot open ICMP socket: {reason}")))
    }
}

#[async_trait]
impl Prober for IcmpProber {
    #[instrument(skip(self), level = "debug")]
    async fn probe(&self, addr: IpAddr, probe_timeout: Duration) -> Result<bool, ProbeError> {
        let client = self.client(addr)?;
        let ident = PingIdentifier(self.ident.fetch_add(1, Ordering::Relaxed));
        let mut pinger = client.pinger(addr, ident).await;
        pinger.timeout(probe_timeout);

        match timeout(probe_timeout, pinger.ping(PingSequence(0), &PAYLOAD)).await {
            Ok(Ok((_packet, rtt))) => {
                debug!(%addr, ?rtt, "echo reply");
                Ok(true)
            }
            Ok(Err(e)) => {
                debug!(%addr, error = %e, "no echo reply");
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }

    fn method(&self) -> &'static str {
        "icmp"
    }
}

/// TCP connect prober; a refused connection still proves the host is up
pub struct TcpProber {
    port: u16,
}

impl TcpProber {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl Prober for TcpProber {
    #[instrument(skip(self), level = "debug")]
    async fn probe(&self, addr: IpAddr, probe_timeout: Duration) -> Result<bool, ProbeError> {
        let socket = SocketAddr::new(addr, self.port);
        match timeout(probe_timeout, TcpStream::connect(socket)).await {
            Ok(Ok(_stream)) => Ok(true),
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => Ok(true),
            Ok(Err(e)) if e.kind() == io::ErrorKind::PermissionDenied => {
                Err(ProbeError::Unavailable(e.to_string()))
            }
            Ok(Err(e)) => {
                debug!(%addr, error = %e, "connect failed");
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }

    fn method(&self) -> &'static str {
        "tcp"
    }
}
