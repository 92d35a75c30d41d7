//! mio event loop for a single request.
//!
//! Readiness-based model: poll tells us when the socket is ready, then we
//! perform non-blocking reads and writes until they would block. Received
//! bytes go straight to the [`ClientSession`].

use bytes::{Buf, BytesMut};
use mio::event::Source;
use mio::{Events, Interest, Poll, Registry, Token};
use std::io::{self, Read, Write};
use std::net::Shutdown;
use tracing::{debug, trace};

use crate::error::Result;
use crate::protocol::{Output, Request};
use crate::runtime::connection::{Connector, Stream};
use crate::runtime::session::{ClientSession, ProcessResult};

const CONNECTION: Token = Token(0);
const EVENTS_CAPACITY: usize = 16;
const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Non-blocking connection registered with mio.
#[derive(Debug)]
pub enum MioStream {
    Tcp(mio::net::TcpStream),
    Unix(mio::net::UnixStream),
}

impl MioStream {
    /// Wrap a connected stream, switching it to non-blocking mode.
    pub fn from_std(stream: Stream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(match stream {
            Stream::Tcp(stream) => MioStream::Tcp(mio::net::TcpStream::from_std(stream)),
            Stream::Unix(stream) => MioStream::Unix(mio::net::UnixStream::from_std(stream)),
        })
    }

    pub fn shutdown(&self) -> io::Result<()> {
        match self {
            MioStream::Tcp(stream) => stream.shutdown(Shutdown::Both),
            MioStream::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

impl Read for MioStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            MioStream::Tcp(stream) => stream.read(buf),
            MioStream::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for MioStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            MioStream::Tcp(stream) => stream.write(buf),
            MioStream::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            MioStream::Tcp(stream) => stream.flush(),
            MioStream::Unix(stream) => stream.flush(),
        }
    }
}

impl Source for MioStream {
    fn register(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        match self {
            MioStream::Tcp(stream) => stream.register(registry, token, interests),
            MioStream::Unix(stream) => stream.register(registry, token, interests),
        }
    }

    fn reregister(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> io::Result<()> {
        match self {
            MioStream::Tcp(stream) => stream.reregister(registry, token, interests),
            MioStream::Unix(stream) => stream.reregister(registry, token, interests),
        }
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        match self {
            MioStream::Tcp(stream) => stream.deregister(registry),
            MioStream::Unix(stream) => stream.deregister(registry),
        }
    }
}

/// Connect through `connector` and run `request` to completion.
///
/// The request is encoded before connecting, so an oversized stream never
/// opens a connection.
pub fn run(connector: &Connector, request: Request) -> Result<Output> {
    let mut session = ClientSession::new(request);
    let mut out = BytesMut::new();
    session.connection_made(&mut out)?;

    let mut stream = MioStream::from_std(connector.connect()?)?;
    let result = event_loop(&mut stream, session, out);
    if let Err(e) = stream.shutdown() {
        trace!(error = %e, "Shutdown after request");
    }
    result
}

/// Run `session` over an already connected non-blocking stream.
pub fn drive(stream: &mut MioStream, mut session: ClientSession) -> Result<Output> {
    let mut out = BytesMut::new();
    session.connection_made(&mut out)?;
    event_loop(stream, session, out)
}

fn event_loop(stream: &mut MioStream, mut session: ClientSession, mut out: BytesMut) -> Result<Output> {
    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(EVENTS_CAPACITY);
    let mut read_buf = vec![0u8; READ_BUFFER_SIZE];

    poll.registry()
        .register(stream, CONNECTION, Interest::READABLE | Interest::WRITABLE)?;

    loop {
        if let Err(e) = poll.poll(&mut events, None) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(e.into());
        }

        for event in events.iter() {
            if event.token() != CONNECTION {
                continue;
            }

            if event.is_writable() && !out.is_empty() && handle_writable(stream, &mut out)? {
                debug!("Request sent");
                poll.registry()
                    .reregister(stream, CONNECTION, Interest::READABLE)?;
            }

            if event.is_readable() || event.is_read_closed() || event.is_error() {
                if let Some(output) = handle_readable(stream, &mut session, &mut read_buf)? {
                    poll.registry().deregister(stream)?;
                    return Ok(output);
                }
            }
        }
    }
}

/// Write queued bytes until the socket would block. Returns `true` once
/// everything has been written.
fn handle_writable(stream: &mut MioStream, out: &mut BytesMut) -> io::Result<bool> {
    while !out.is_empty() {
        match stream.write(&out[..]) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
            }
            Ok(n) => {
                trace!(written = n, remaining = out.len() - n, "write");
                out.advance(n);
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Drain the socket into the session. Returns the output once the request
/// completes.
fn handle_readable(
    stream: &mut MioStream,
    session: &mut ClientSession,
    read_buf: &mut [u8],
) -> Result<Option<Output>> {
    loop {
        match stream.read(read_buf) {
            Ok(0) => {
                debug!("Peer closed connection");
                return session.connection_lost().map(Some);
            }
            Ok(n) => {
                trace!(read = n, "read");
                if session.data_received(&read_buf[..n])? == ProcessResult::Complete {
                    return Ok(session.finish());
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
