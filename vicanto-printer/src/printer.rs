//! Printer transport for sending ESC/POS data
//!
//! Network printers only (raw TCP, usually port 9100).

use crate::error::{DeviceError, DeviceResult};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};

/// Default bound for connect and write
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Trait for printer transports
#[allow(async_fn_in_trait)]
pub trait Printer {
    /// Send raw ESC/POS data to the printer
    async fn print(&self, data: &[u8]) -> DeviceResult<()>;

    /// Check if the printer is online/reachable
    async fn is_online(&self) -> bool;
}

/// Network printer (TCP port 9100)
///
/// Most thermal printers support raw TCP printing on port 9100.
/// Each print opens a fresh connection; the printer closes idle sockets
/// on its own and holding one open blocks other terminals.
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    addr: SocketAddr,
    timeout: Duration,
}

impl NetworkPrinter {
    /// Create a new network printer
    pub fn new(host: &str, port: u16) -> DeviceResult<Self> {
        Self::from_addr(&format!("{}:{}", host, port))
    }

    /// Create from a socket address string (e.g., "192.168.1.100:9100")
    pub fn from_addr(addr: &str) -> DeviceResult<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| DeviceError::InvalidConfig(format!("Invalid address: {}", addr)))?;

        Ok(Self {
            addr,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the printer address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the connection timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn connect(&self) -> DeviceResult<TcpStream> {
        tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| DeviceError::Timeout(format!("Connection timeout: {}", self.addr)))?
            .map_err(|e| DeviceError::Connection(format!("{}: {}", self.addr, e)))
    }
}

impl Printer for NetworkPrinter {
    #[instrument(skip(self, data), fields(addr = %self.addr, data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> DeviceResult<()> {
        let mut stream = self.connect().await?;
        debug!("Connected, sending {} bytes", data.len());

        tokio::time::timeout(self.timeout, async {
            stream.write_all(data).await?;
            stream.flush().await?;
            stream.shutdown().await
        })
        .await
        .map_err(|_| DeviceError::Timeout(format!("Write timeout: {}", self.addr)))??;

        debug!("Data sent");
        Ok(())
    }

    #[instrument(skip(self), fields(addr = %self.addr))]
    async fn is_online(&self) -> bool {
        match self.connect().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Printer unreachable");
                false
            }
        }
    }
}
