//! Peer addresses and how catch-up picks them.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Network address of a catch-up server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerAddress {
    host: String,
    port: u16,
}

impl PeerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for PeerAddress {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ClientError::InvalidAddress(s.to_string()))?;
        if host.is_empty() {
            return Err(ClientError::InvalidAddress(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| ClientError::InvalidAddress(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}

/// Resolves the peers a catch-up should talk to.
///
/// The primary is the preferred upstream. Retries of individual requests go
/// to the secondary, which may be a different member each time.
pub trait CatchupAddressProvider: Send + Sync {
    fn primary(&self) -> Result<PeerAddress>;

    fn secondary(&self) -> Result<PeerAddress> {
        self.primary()
    }
}

/// Always answers with the same address.
#[derive(Debug, Clone)]
pub struct SingleAddressProvider {
    address: PeerAddress,
}

impl SingleAddressProvider {
    pub fn new(address: PeerAddress) -> Self {
        Self { address }
    }
}

impl CatchupAddressProvider for SingleAddressProvider {
    fn primary(&self) -> Result<PeerAddress> {
        Ok(self.address.clone())
    }
}

/// A fixed primary plus a rotation of secondaries for retries.
#[derive(Debug)]
pub struct PrioritisedAddressProvider {
    primary: PeerAddress,
    secondaries: Vec<PeerAddress>,
    next: AtomicUsize,
}

impl PrioritisedAddressProvider {
    pub fn new(primary: PeerAddress, secondaries: Vec<PeerAddress>) -> Self {
        Self {
            primary,
            secondaries,
            next: AtomicUsize::new(0),
        }
    }
}

impl CatchupAddressProvider for PrioritisedAddressProvider {
    fn primary(&self) -> Result<PeerAddress> {
        Ok(self.primary.clone())
    }

    fn secondary(&self) -> Result<PeerAddress> {
        if self.secondaries.is_empty() {
            return Err(ClientError::AddressResolution(format!(
                "no secondary for {}",
                self.primary
            )));
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.secondaries.len();
        Ok(self.secondaries[index].clone())
    }
}
