//! Connection setup and ownership.
//!
//! A `Connection` wraps the transport for the lifetime of one session and
//! closes it exactly once: explicitly via [`Connection::close`], or on drop if
//! the session unwinds before reaching its teardown. Once closed, reads and
//! writes fail with `NotConnected` instead of touching the stream.

use crate::config::Config;
use crate::framer::{FrameError, Framer, ReadOutcome, Transport, DELIMITER};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Errors raised while establishing the connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to resolve {peer}: {source}")]
    Resolve {
        peer: String,
        #[source]
        source: io::Error,
    },

    #[error("{peer} did not resolve to any address")]
    NoAddress { peer: String },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// An open, exclusively owned stream to one remote endpoint.
pub struct Connection<T: Transport> {
    stream: Option<T>,
    peer: String,
}

impl<T: Transport> Connection<T> {
    pub fn new(stream: T, peer: impl Into<String>) -> Self {
        Self {
            stream: Some(stream),
            peer: peer.into(),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Write raw bytes, exactly as given.
    pub fn send(&mut self, data: &[u8]) -> io::Result<()> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        stream.write_all(data)?;
        stream.flush()?;
        trace!(peer = %self.peer, len = data.len(), "Sent bytes");
        Ok(())
    }

    /// Write `text` followed by the delimiter in a single write.
    pub fn send_line(&mut self, text: &str) -> io::Result<()> {
        let mut data = Vec::with_capacity(text.len() + DELIMITER.len());
        data.extend_from_slice(text.as_bytes());
        data.extend_from_slice(DELIMITER);
        self.send(&data)
    }

    /// Read one line with the given framer settings.
    pub fn read_line(&mut self, framer: &Framer) -> ReadOutcome {
        match self.stream.as_mut() {
            Some(stream) => framer.read_line(stream),
            None => ReadOutcome::Failed(FrameError::Io(not_connected())),
        }
    }

    /// Shut down and release the stream.
    ///
    /// Returns `false` if the connection was already closed.
    pub fn close(&mut self) -> bool {
        let Some(mut stream) = self.stream.take() else {
            return false;
        };

        match stream.shutdown_both() {
            Ok(()) => info!(peer = %self.peer, "Connection closed"),
            // The peer may already have torn the stream down.
            Err(e) if e.kind() == ErrorKind::NotConnected => {
                debug!(peer = %self.peer, "Connection already shut down by peer")
            }
            Err(e) => warn!(peer = %self.peer, error = %e, "Shutdown failed"),
        }
        true
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.close();
    }
}

fn not_connected() -> io::Error {
    io::Error::new(ErrorKind::NotConnected, "connection is closed")
}

/// Resolve the configured endpoint and connect to the first address that
/// accepts within the connect timeout.
pub fn connect(config: &Config) -> Result<Connection<TcpStream>, ConnectError> {
    let peer = config.peer();
    let addrs: Vec<SocketAddr> = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|source| ConnectError::Resolve {
            peer: peer.clone(),
            source,
        })?
        .collect();

    let mut last_error = None;
    for addr in addrs {
        debug!(%addr, "Connecting");
        match connect_addr(addr, config.connect_timeout) {
            Ok(stream) => {
                info!(peer = %peer, %addr, "Connected");
                return Ok(Connection::new(stream, peer));
            }
            Err(source) => {
                debug!(%addr, error = %source, "Connect attempt failed");
                last_error = Some(ConnectError::Connect { addr, source });
            }
        }
    }

    Err(last_error.unwrap_or(ConnectError::NoAddress { peer }))
}

fn connect_addr(addr: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.connect_timeout(&addr.into(), timeout)?;
    // Probe commands are tiny; send each one immediately.
    socket.set_nodelay(true)?;
    Ok(socket.into())
}
