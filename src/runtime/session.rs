//! Buffer-driven client session.
//!
//! A [`ClientSession`] does no I/O of its own. The driver hands it the
//! outbound buffer once the connection is up, feeds it whatever bytes
//! arrive, and tells it when the peer closes. The mio and tokio drivers
//! both sit on top of this.

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{Output, OutputCollector, Record, Request, RequestOptions, REQUEST_ID};

/// Result of feeding received bytes to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    /// EndRequest not seen yet.
    NeedData,
    /// The request has completed; output is ready.
    Complete,
}

/// Client side of a single request over one connection.
#[derive(Debug)]
pub struct ClientSession {
    request: Request,
    request_id: u16,
    options: RequestOptions,
    recv: BytesMut,
    collector: OutputCollector,
    output: Option<Output>,
}

impl ClientSession {
    /// Session for `request` with keep-connection set and every stream
    /// terminated.
    pub fn new(request: Request) -> Self {
        Self::with_options(request, RequestOptions::INCREMENTAL)
    }

    pub fn with_options(request: Request, options: RequestOptions) -> Self {
        Self {
            request,
            request_id: REQUEST_ID,
            options,
            recv: BytesMut::new(),
            collector: OutputCollector::new(REQUEST_ID),
            output: None,
        }
    }

    /// The connection is up: append the whole outbound sequence to `out`.
    pub fn connection_made(&mut self, out: &mut BytesMut) -> std::result::Result<(), ProtocolError> {
        let start = out.len();
        self.request.encode(self.request_id, self.options, out)?;
        debug!(
            request_id = self.request_id,
            bytes = out.len() - start,
            "Request queued"
        );
        Ok(())
    }

    /// Feed bytes read from the connection.
    ///
    /// Chunks may split records anywhere. Bytes following EndRequest stay in
    /// the buffer unconsumed, later chunks are ignored.
    pub fn data_received(&mut self, data: &[u8]) -> std::result::Result<ProcessResult, ProtocolError> {
        if self.output.is_some() {
            trace!(len = data.len(), "Ignoring bytes after end of request");
            return Ok(ProcessResult::Complete);
        }

        self.recv.extend_from_slice(data);
        while let Some(record) = Record::decode(&mut self.recv)? {
            if self.collector.push(record)? {
                let collector =
                    std::mem::replace(&mut self.collector, OutputCollector::new(self.request_id));
                self.output = collector.finish();
                return Ok(ProcessResult::Complete);
            }
        }

        Ok(ProcessResult::NeedData)
    }

    /// The peer closed the connection.
    ///
    /// Returns the output if the request completed, otherwise
    /// [`Error::ConnectionClosed`].
    pub fn connection_lost(&mut self) -> Result<Output> {
        match self.output.take() {
            Some(output) => Ok(output),
            None => {
                debug!(buffered = self.recv.len(), "Connection lost mid-request");
                Err(Error::ConnectionClosed)
            }
        }
    }

    /// Take the output once the request has completed.
    pub fn finish(&mut self) -> Option<Output> {
        self.output.take()
    }

    pub fn is_complete(&self) -> bool {
        self.output.is_some()
    }

    /// Bytes received but not yet forming a full record.
    pub fn buffered(&self) -> usize {
        self.recv.len()
    }
}
