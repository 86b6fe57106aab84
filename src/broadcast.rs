//! Out-of-band mixdown progress over loopback UDP
//!
//! A pass may announce its position once per chunk as a small JSON datagram
//! (`{"position":..,"length":..,"pid":".."}`) sent to a well-known local
//! port. Delivery is best-effort: nothing is acknowledged, retried or
//! sequenced, and no failure here ever reaches the mixdown caller.
//!
//! Several passes (usually in different processes) may send to the same
//! port at once. Receivers tell them apart by `pid`.

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Well-known loopback port monitors listen on
pub const PROGRESS_PORT: u16 = 1609;

/// Upper bound on an encoded progress datagram
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Identity embedded in every message sent by this process
pub fn process_identity() -> String {
    std::process::id().to_string()
}

// ============================================================================
// Configuration
// ============================================================================

/// Where and whether to broadcast progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    pub enabled: bool,
    /// Local endpoint the sender binds (port 0 picks any free port)
    pub bind: SocketAddr,
    /// Destination of every datagram
    pub target: SocketAddr,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);
        Self {
            enabled: true,
            bind: SocketAddr::new(loopback, 0),
            target: SocketAddr::new(loopback, PROGRESS_PORT),
        }
    }
}

impl BroadcastConfig {
    /// Broadcasting switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Default endpoints with a different target port
    pub fn with_port(port: u16) -> Self {
        let mut config = Self::default();
        config.target.set_port(port);
        config
    }
}

// ============================================================================
// Wire message
// ============================================================================

/// One progress report, built fresh for every chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMessage {
    /// Frames written so far
    pub position: u64,
    /// Total frames of the pass, 0 when unbounded
    pub length: u64,
    /// Identity of the sending process
    pub pid: String,
}

impl ProgressMessage {
    pub fn new(position: u64, length: u64, pid: impl Into<String>) -> Self {
        Self {
            position,
            length,
            pid: pid.into(),
        }
    }

    /// Fraction complete, or `None` for unbounded passes
    pub fn fraction(&self) -> Option<f32> {
        (self.length > 0).then(|| self.position as f32 / self.length as f32)
    }

    /// UTF-8 JSON payload for a single datagram
    pub fn to_datagram(&self) -> Result<Vec<u8>> {
        let bytes = serde_json::to_vec(self)?;
        if bytes.len() >= MAX_DATAGRAM_SIZE {
            let reason = format!(
                "progress message is {} bytes (limit {})",
                bytes.len(),
                MAX_DATAGRAM_SIZE
            );
            return Err(std::io::Error::new(ErrorKind::InvalidData, reason).into());
        }
        Ok(bytes)
    }

    pub fn from_datagram(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// ============================================================================
// Sender
// ============================================================================

/// Fire-and-forget progress sender owned by a single pass
///
/// Starts `Open` when the endpoint could be created and `Closed` otherwise.
/// `close` (or drop) moves it to `Closed`; there is no way back.
#[derive(Debug)]
pub struct ProgressBroadcaster {
    socket: Option<UdpSocket>,
    target: SocketAddr,
    pid: String,
    sent: u64,
    dropped: u64,
}

impl ProgressBroadcaster {
    /// Create the endpoint described by `config`
    ///
    /// Never fails: if broadcasting is disabled or the socket cannot be set
    /// up, the broadcaster comes back closed and every `send` is a no-op.
    pub fn open(config: &BroadcastConfig) -> Self {
        let mut broadcaster = Self::closed(config.target);
        if !config.enabled {
            debug!("[BROADCAST] Disabled by configuration");
            return broadcaster;
        }

        let socket = UdpSocket::bind(config.bind).and_then(|socket| {
            socket.set_nonblocking(true)?;
            Ok(socket)
        });

        match socket {
            Ok(socket) => {
                debug!(
                    "[BROADCAST] Endpoint open on {:?}, sending to {}",
                    socket.local_addr().ok(),
                    config.target
                );
                broadcaster.socket = Some(socket);
            }
            Err(e) => {
                warn!(
                    "[BROADCAST] Could not open progress endpoint on {}: {} - continuing without progress broadcast",
                    config.bind, e
                );
            }
        }

        broadcaster
    }

    /// A broadcaster that never sends
    pub fn closed(target: SocketAddr) -> Self {
        Self {
            socket: None,
            target,
            pid: process_identity(),
            sent: 0,
            dropped: 0,
        }
    }

    /// Report under a different identity than the current process id
    pub fn with_identity(mut self, pid: impl Into<String>) -> Self {
        self.pid = pid.into();
        self
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Datagrams handed to the socket
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Datagrams that could not be sent
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Send one progress report; failures are counted and otherwise ignored
    pub fn send(&mut self, position: u64, length: u64) {
        let Some(socket) = self.socket.as_ref() else {
            return;
        };

        let message = ProgressMessage::new(position, length, self.pid.as_str());
        let outcome = message
            .to_datagram()
            .and_then(|payload| Ok(socket.send_to(&payload, self.target)?));

        match outcome {
            Ok(_) => self.sent += 1,
            Err(e) => {
                self.dropped += 1;
                trace!("[BROADCAST] Dropped progress {}/{}: {}", position, length, e);
            }
        }
    }

    /// Release the endpoint; safe to call more than once
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!(
                "[BROADCAST] Endpoint closed ({} sent, {} dropped)",
                self.sent, self.dropped
            );
        }
    }
}

impl Drop for ProgressBroadcaster {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Receiver
// ============================================================================

/// Receiving end used by monitors of one or more running passes
///
/// The socket is bound exclusively, without address or port reuse. Only one
/// listener per address can run at a time; a second `bind` to the same port
/// fails with an `Io` error (`AddrInUse`). Senders are unaffected since each
/// binds its own ephemeral port.
#[derive(Debug)]
pub struct ProgressListener {
    socket: UdpSocket,
}

impl ProgressListener {
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Wait up to `timeout` for the next message
    ///
    /// Returns `Ok(None)` on timeout and a `Serialization` error for
    /// datagrams that are not progress messages.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<ProgressMessage>> {
        // a zero timeout means "block forever" to the socket
        let timeout = timeout.max(Duration::from_millis(1));
        self.socket.set_read_timeout(Some(timeout))?;

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        match self.socket.recv_from(&mut buf) {
            Ok((len, _)) => ProgressMessage::from_datagram(&buf[..len]).map(Some),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
