//! Connection acquisition.
//!
//! Every request gets a fresh stream connection which is closed when the
//! request finishes. Nothing here is pooled or shared.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, warn};

use super::backoff::Backoff;
use crate::error::{Error, Result};

/// Where the FastCGI application listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix-domain stream socket.
    Unix(PathBuf),
    /// TCP host and port.
    Tcp { host: String, port: u16 },
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp { host, port } if host.contains(':') => write!(f, "[{host}]:{port}"),
            Endpoint::Tcp { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseEndpointError {
    #[error("endpoint {0:?} is neither a socket path nor host:port")]
    MissingPort(String),

    #[error("invalid port in endpoint {0:?}")]
    InvalidPort(String),

    #[error("empty host in endpoint {0:?}")]
    EmptyHost(String),
}

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    /// Accepts `unix:/path`, any string containing `/` (a socket path),
    /// `host:port` and `[v6-addr]:port`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix("unix:") {
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }
        if s.contains('/') {
            return Ok(Endpoint::Unix(PathBuf::from(s)));
        }

        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ParseEndpointError::MissingPort(s.to_string()))?;
        let port = port
            .parse()
            .map_err(|_| ParseEndpointError::InvalidPort(s.to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(ParseEndpointError::EmptyHost(s.to_string()));
        }

        Ok(Endpoint::Tcp {
            host: host.to_string(),
            port,
        })
    }
}

impl Endpoint {
    /// Make one blocking connection attempt.
    pub fn connect(&self) -> io::Result<Stream> {
        match self {
            Endpoint::Unix(path) => UnixStream::connect(path).map(Stream::Unix),
            Endpoint::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port))?;
                stream.set_nodelay(true)?;
                Ok(Stream::Tcp(stream))
            }
        }
    }
}

/// A connected blocking stream.
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Stream {
    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        match self {
            Stream::Tcp(stream) => stream.set_nonblocking(nonblocking),
            Stream::Unix(stream) => stream.set_nonblocking(nonblocking),
        }
    }

    /// Shut down both directions.
    pub fn shutdown(&self) -> io::Result<()> {
        match self {
            Stream::Tcp(stream) => stream.shutdown(Shutdown::Both),
            Stream::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(stream) => stream.read(buf),
            Stream::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(stream) => stream.write(buf),
            Stream::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(stream) => stream.flush(),
            Stream::Unix(stream) => stream.flush(),
        }
    }
}

/// Opens connections to one endpoint, retrying failures per a [`Backoff`].
#[derive(Debug, Clone)]
pub struct Connector {
    endpoint: Endpoint,
    backoff: Backoff,
}

impl Connector {
    pub fn new(endpoint: Endpoint, backoff: Backoff) -> Self {
        Self { endpoint, backoff }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Connect, sleeping between failed attempts.
    ///
    /// Blocks until connected when the policy has no attempt bound.
    pub fn connect(&self) -> Result<Stream> {
        let stream = self
            .backoff
            .retry(
                |attempt| {
                    self.endpoint
                        .connect()
                        .inspect_err(|e| self.log_failure(attempt, e))
                },
                std::thread::sleep,
            )
            .map_err(|e| Error::Connect {
                endpoint: self.endpoint.clone(),
                attempts: e.attempts,
                source: e.last_error,
            })?;

        debug!(endpoint = %self.endpoint, "Connected");
        Ok(stream)
    }

    pub(crate) fn log_failure(&self, attempt: u32, error: &io::Error) {
        if self.backoff.exhausted(attempt) {
            warn!(endpoint = %self.endpoint, attempt, error = %error, "Connect failed, giving up");
        } else {
            warn!(
                endpoint = %self.endpoint,
                attempt,
                error = %error,
                retry_in_ms = self.backoff.delay(attempt).as_millis() as u64,
                "Connect failed, retrying"
            );
        }
    }
}
