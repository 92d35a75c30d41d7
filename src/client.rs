//! Blocking FastCGI client.
//!
//! Each call opens a fresh connection, writes the whole request, reads
//! records until EndRequest and closes the connection on every exit path.
//! The client holds only configuration, so one `&Client` can be shared by
//! concurrent callers.

use bytes::{Bytes, BytesMut};
use std::io::{Read, Write};
use tracing::{debug, trace};

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{Body, Output, OutputCollector, Params, Record, Request, RequestOptions, REQUEST_ID};
use crate::runtime::{Connector, Stream};

/// Blocking client for one FastCGI application endpoint.
#[derive(Debug, Clone)]
pub struct Client {
    connector: Connector,
    options: RequestOptions,
}

impl Client {
    pub fn new(connector: Connector) -> Self {
        Self::with_options(connector, RequestOptions::BLOCKING)
    }

    pub fn with_options(connector: Connector, options: RequestOptions) -> Self {
        Self { connector, options }
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    /// Run one responder request and return everything the application
    /// wrote.
    pub fn call(
        &self,
        params: Params,
        stdin: impl Into<Bytes>,
        data: impl Into<Bytes>,
    ) -> Result<Output> {
        self.execute(&Request::new(params, stdin, data))
    }

    /// Like [`Client::call`] with a prepared request.
    ///
    /// The request is encoded before connecting, so an oversized stream is
    /// rejected without touching the network.
    pub fn execute(&self, request: &Request) -> Result<Output> {
        let mut outbound = BytesMut::new();
        request.encode(REQUEST_ID, self.options, &mut outbound)?;

        let mut stream = self.connector.connect()?;
        let result = exchange(&mut stream, &outbound, REQUEST_ID);
        close(&stream);
        result
    }

    /// Ask the application for management variables such as
    /// `FCGI_MAX_CONNS`.
    pub fn get_values(&self, keys: &[&str]) -> Result<Vec<(String, String)>> {
        let outbound = Record::get_values(keys.iter().copied()).encode()?;

        let mut stream = self.connector.connect()?;
        let result = query_values(&mut stream, &outbound);
        close(&stream);
        result
    }
}

/// Write `outbound` and collect reply records for `request_id` until
/// EndRequest.
pub fn exchange<S: Read + Write>(stream: &mut S, outbound: &[u8], request_id: u16) -> Result<Output> {
    stream.write_all(outbound)?;
    stream.flush()?;
    debug!(request_id, bytes = outbound.len(), "Request sent");

    let mut collector = OutputCollector::new(request_id);
    while !collector.push(Record::read_from(stream)?)? {}

    collector.finish().ok_or(Error::ConnectionClosed)
}

fn query_values<S: Read + Write>(stream: &mut S, outbound: &[u8]) -> Result<Vec<(String, String)>> {
    stream.write_all(outbound)?;
    stream.flush()?;

    loop {
        let record = Record::read_from(stream)?;
        match record.body {
            Body::GetValuesResult(values) => return Ok(values),
            Body::UnknownType(record_type) => {
                return Err(ProtocolError::RejectedRecordType(record_type).into())
            }
            other => debug!(record_type = other.type_tag(), "Skipping record"),
        }
    }
}

fn close(stream: &Stream) {
    if let Err(e) = stream.shutdown() {
        trace!(error = %e, "Shutdown after request");
    }
}
