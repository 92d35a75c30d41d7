//! tokio driver for the incremental client.
//!
//! Same session as the mio driver, run as an async task over any
//! `AsyncRead + AsyncWrite` stream.

use bytes::BytesMut;
use std::future::Future;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};
use tracing::{debug, trace};

use super::connection::{Connector, Endpoint};
use super::session::{ClientSession, ProcessResult};
use crate::error::{Error, Result};
use crate::protocol::{Output, Request};

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Connect through `connector` and run `request` to completion.
///
/// The request is encoded before connecting, so an oversized stream never
/// opens a connection.
pub async fn call(connector: &Connector, request: Request) -> Result<Output> {
    let mut session = ClientSession::new(request);
    let mut out = BytesMut::new();
    session.connection_made(&mut out)?;

    match connector.endpoint() {
        Endpoint::Unix(path) => {
            let mut stream = connect_with_retry(connector, || UnixStream::connect(path)).await?;
            exchange_and_close(&mut stream, session, out).await
        }
        Endpoint::Tcp { host, port } => {
            let mut stream =
                connect_with_retry(connector, || TcpStream::connect((host.as_str(), *port)))
                    .await?;
            stream.set_nodelay(true)?;
            exchange_and_close(&mut stream, session, out).await
        }
    }
}

/// Run `session` over a connected stream.
pub async fn drive<S>(stream: &mut S, mut session: ClientSession) -> Result<Output>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut out = BytesMut::new();
    session.connection_made(&mut out)?;
    exchange(stream, session, out).await
}

async fn exchange_and_close<S>(stream: &mut S, session: ClientSession, out: BytesMut) -> Result<Output>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let result = exchange(stream, session, out).await;
    if let Err(e) = stream.shutdown().await {
        trace!(error = %e, "Shutdown after request");
    }
    result
}

async fn exchange<S>(stream: &mut S, mut session: ClientSession, out: BytesMut) -> Result<Output>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&out).await?;
    stream.flush().await?;
    debug!(bytes = out.len(), "Request sent");

    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
    loop {
        buf.clear();
        let n = stream.read_buf(&mut buf).await?;
        if n == 0 {
            debug!("Peer closed connection");
            return session.connection_lost();
        }

        trace!(read = n, "read");
        if session.data_received(&buf)? == ProcessResult::Complete {
            return session.finish().ok_or(Error::ConnectionClosed);
        }
    }
}

async fn connect_with_retry<T, F, Fut>(connector: &Connector, mut connect: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let backoff = connector.backoff();
    let mut attempts = 0;
    loop {
        attempts += 1;
        match connect().await {
            Ok(stream) => {
                debug!(endpoint = %connector.endpoint(), "Connected");
                return Ok(stream);
            }
            Err(e) => {
                connector.log_failure(attempts, &e);
                if backoff.exhausted(attempts) {
                    return Err(Error::Connect {
                        endpoint: connector.endpoint().clone(),
                        attempts,
                        source: e,
                    });
                }
                tokio::time::sleep(backoff.delay(attempts)).await;
            }
        }
    }
}
