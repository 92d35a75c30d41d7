//! One request/response exchange, independent of the transport.
//!
//! [`Request`] builds the outbound record sequence and [`OutputCollector`]
//! folds the application's reply records into an [`Output`]. Both the
//! blocking client and the incremental session go through these.

use bytes::{Bytes, BytesMut};
use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use super::pairs::encode_pairs_to_vec;
use super::record::{Body, ProtocolStatus, Record, Role, KEEP_CONN, MANAGEMENT_REQUEST_ID};
use super::response::{parse_response, Response};
use crate::error::{ProtocolError, Result};

/// Request id used for every request. Connections are never multiplexed.
pub const REQUEST_ID: u16 = 1;

/// CGI parameters, sent in insertion order.
pub type Params = IndexMap<String, String>;

/// Wire-level knobs for the outbound sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Set the keep-connection flag on BeginRequest.
    pub keep_conn: bool,
    /// Close the data stream with an empty Data record.
    pub terminate_data: bool,
}

impl RequestOptions {
    /// Blocking call: the application closes the connection, no Data
    /// terminator unless configured.
    pub const BLOCKING: RequestOptions = RequestOptions {
        keep_conn: false,
        terminate_data: false,
    };

    /// Event-driven call: keep-connection requested, every stream closed.
    pub const INCREMENTAL: RequestOptions = RequestOptions {
        keep_conn: true,
        terminate_data: true,
    };
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::BLOCKING
    }
}

/// Everything the application receives for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub params: Params,
    pub stdin: Bytes,
    pub data: Bytes,
}

impl Request {
    pub fn new(params: Params, stdin: impl Into<Bytes>, data: impl Into<Bytes>) -> Self {
        Self {
            params,
            stdin: stdin.into(),
            data: data.into(),
        }
    }

    /// Outbound records in send order:
    ///
    /// BeginRequest, Params, Params(end), Stdin, Stdin(end), Data, and with
    /// `terminate_data` a final empty Data unless `Data` was already empty.
    pub fn records(&self, request_id: u16, options: RequestOptions) -> Vec<Record> {
        let params = encode_pairs_to_vec(
            self.params
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )
        .freeze();
        let flags = if options.keep_conn { KEEP_CONN } else { 0 };

        let mut records = vec![
            Record::begin_request(request_id, Role::Responder, flags),
            Record::new(request_id, Body::Params(params)),
            Record::new(request_id, Body::Params(Bytes::new())),
            Record::new(request_id, Body::Stdin(self.stdin.clone())),
            Record::new(request_id, Body::Stdin(Bytes::new())),
            Record::new(request_id, Body::Data(self.data.clone())),
        ];
        if options.terminate_data && !self.data.is_empty() {
            records.push(Record::new(request_id, Body::Data(Bytes::new())));
        }

        records
    }

    /// Encode the full outbound sequence, appending to `buf`.
    ///
    /// Any stream larger than one record can carry is rejected and `buf` is
    /// left as it was.
    pub fn encode(
        &self,
        request_id: u16,
        options: RequestOptions,
        buf: &mut BytesMut,
    ) -> std::result::Result<(), ProtocolError> {
        let mut out = BytesMut::new();
        for record in self.records(request_id, options) {
            record.encode_into(&mut out)?;
        }
        buf.extend_from_slice(&out);
        Ok(())
    }
}

/// Accumulated result of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub stdout: Bytes,
    pub stderr: Bytes,
    pub app_status: u32,
    pub protocol_status: ProtocolStatus,
}

impl Output {
    /// Whether the application reported normal completion.
    pub fn is_complete(&self) -> bool {
        self.protocol_status == ProtocolStatus::RequestComplete
    }

    /// Parse stdout as a CGI response document.
    pub fn response(&self) -> Result<Response> {
        parse_response(self.stdout.clone())
    }

    pub fn into_streams(self) -> (Bytes, Bytes) {
        (self.stdout, self.stderr)
    }
}

/// Folds reply records for one request into an [`Output`].
#[derive(Debug)]
pub struct OutputCollector {
    request_id: u16,
    stdout: BytesMut,
    stderr: BytesMut,
    end: Option<(u32, ProtocolStatus)>,
}

impl OutputCollector {
    pub fn new(request_id: u16) -> Self {
        Self {
            request_id,
            stdout: BytesMut::new(),
            stderr: BytesMut::new(),
            end: None,
        }
    }

    /// Take one reply record. Returns `true` once EndRequest has been seen.
    ///
    /// Management records are skipped. Records for any other request id are
    /// a protocol violation since the connection carries a single request.
    pub fn push(&mut self, record: Record) -> std::result::Result<bool, ProtocolError> {
        if record.request_id == MANAGEMENT_REQUEST_ID {
            debug!(
                record_type = record.body.type_tag(),
                "Skipping management record"
            );
            return Ok(false);
        }
        if record.request_id != self.request_id {
            return Err(ProtocolError::RequestIdMismatch {
                expected: self.request_id,
                actual: record.request_id,
            });
        }

        match record.body {
            Body::Stdout(content) => {
                trace!(len = content.len(), "stdout");
                self.stdout.extend_from_slice(&content);
            }
            Body::Stderr(content) => {
                trace!(len = content.len(), "stderr");
                self.stderr.extend_from_slice(&content);
            }
            Body::EndRequest {
                app_status,
                protocol_status,
            } => {
                if protocol_status != ProtocolStatus::RequestComplete {
                    warn!(
                        request_id = self.request_id,
                        app_status,
                        ?protocol_status,
                        "Request ended without completing"
                    );
                }
                debug!(request_id = self.request_id, app_status, "End of request");
                self.end = Some((app_status, protocol_status));
                return Ok(true);
            }
            other => {
                debug!(record_type = other.type_tag(), "Ignoring unexpected record");
            }
        }

        Ok(false)
    }

    pub fn is_complete(&self) -> bool {
        self.end.is_some()
    }

    /// The output, once EndRequest has been seen.
    pub fn finish(self) -> Option<Output> {
        let (app_status, protocol_status) = self.end?;
        Some(Output {
            stdout: self.stdout.freeze(),
            stderr: self.stderr.freeze(),
            app_status,
            protocol_status,
        })
    }
}
