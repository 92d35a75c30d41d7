//! FastCGI record framing.
//!
//! Every record is an 8 byte header followed by content and padding:
//!
//! ```text
//! version:1 type:1 requestId:2 contentLength:2 paddingLength:1 reserved:1
//! content[contentLength] padding[paddingLength]
//! ```
//!
//! All integers are big-endian. Records produced here are always padded to a
//! multiple of 8 bytes. Records decoded here honor whatever padding length the
//! peer sent.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{self, Read};

use super::pairs::{decode_pairs, encode_pairs};
use crate::error::{Error, ProtocolError};

/// The only protocol version in existence.
pub const VERSION: u8 = 1;

/// Size of the fixed record header.
pub const HEADER_SIZE: usize = 8;

/// Largest content a single record can carry.
pub const MAX_CONTENT_LENGTH: usize = u16::MAX as usize;

/// Request id reserved for management records.
pub const MANAGEMENT_REQUEST_ID: u16 = 0;

/// BeginRequest flag asking the application to keep the connection open.
pub const KEEP_CONN: u8 = 1;

/// Length of the BeginRequest, EndRequest and UnknownType bodies.
const FIXED_BODY_SIZE: usize = 8;

/// Record type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordType {
    BeginRequest = 1,
    AbortRequest = 2,
    EndRequest = 3,
    Params = 4,
    Stdin = 5,
    Stdout = 6,
    Stderr = 7,
    Data = 8,
    GetValues = 9,
    GetValuesResult = 10,
    UnknownType = 11,
}

/// Lookup table from wire tag to record type, indexed by tag.
const RECORD_TYPES: [Option<RecordType>; 12] = [
    None,
    Some(RecordType::BeginRequest),
    Some(RecordType::AbortRequest),
    Some(RecordType::EndRequest),
    Some(RecordType::Params),
    Some(RecordType::Stdin),
    Some(RecordType::Stdout),
    Some(RecordType::Stderr),
    Some(RecordType::Data),
    Some(RecordType::GetValues),
    Some(RecordType::GetValuesResult),
    Some(RecordType::UnknownType),
];

impl RecordType {
    /// Look up a wire tag. Returns `None` for tags this client does not know.
    pub fn from_u8(tag: u8) -> Option<Self> {
        RECORD_TYPES.get(tag as usize).copied().flatten()
    }

    /// Management record types travel on request id 0.
    pub fn is_management(self) -> bool {
        matches!(
            self,
            RecordType::GetValues | RecordType::GetValuesResult | RecordType::UnknownType
        )
    }
}

/// Role requested in a BeginRequest body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Responder,
    Authorizer,
    Filter,
    /// A role value outside the standard set, kept verbatim.
    Other(u16),
}

impl From<u16> for Role {
    fn from(value: u16) -> Self {
        match value {
            1 => Role::Responder,
            2 => Role::Authorizer,
            3 => Role::Filter,
            other => Role::Other(other),
        }
    }
}

impl From<Role> for u16 {
    fn from(role: Role) -> Self {
        match role {
            Role::Responder => 1,
            Role::Authorizer => 2,
            Role::Filter => 3,
            Role::Other(value) => value,
        }
    }
}

/// Protocol-level outcome reported in an EndRequest body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStatus {
    RequestComplete,
    CantMultiplexConnections,
    Overloaded,
    UnknownRole,
    /// A status value outside the standard set, kept verbatim.
    Other(u8),
}

impl From<u8> for ProtocolStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => ProtocolStatus::RequestComplete,
            1 => ProtocolStatus::CantMultiplexConnections,
            2 => ProtocolStatus::Overloaded,
            3 => ProtocolStatus::UnknownRole,
            other => ProtocolStatus::Other(other),
        }
    }
}

impl From<ProtocolStatus> for u8 {
    fn from(status: ProtocolStatus) -> Self {
        match status {
            ProtocolStatus::RequestComplete => 0,
            ProtocolStatus::CantMultiplexConnections => 1,
            ProtocolStatus::Overloaded => 2,
            ProtocolStatus::UnknownRole => 3,
            ProtocolStatus::Other(value) => value,
        }
    }
}

/// Decoded record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub record_type: u8,
    pub request_id: u16,
    pub content_length: u16,
    pub padding_length: u8,
}

impl Header {
    /// Parse a header from the front of `input`.
    ///
    /// Returns `None` if fewer than 8 bytes are available.
    pub fn parse(input: &[u8]) -> Option<Header> {
        let bytes: &[u8; HEADER_SIZE] = input.get(..HEADER_SIZE)?.try_into().ok()?;
        Some(Header::from_bytes(bytes))
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Header {
        Header {
            version: bytes[0],
            record_type: bytes[1],
            request_id: u16::from_be_bytes([bytes[2], bytes[3]]),
            content_length: u16::from_be_bytes([bytes[4], bytes[5]]),
            padding_length: bytes[6],
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let request_id = self.request_id.to_be_bytes();
        let content_length = self.content_length.to_be_bytes();
        [
            self.version,
            self.record_type,
            request_id[0],
            request_id[1],
            content_length[0],
            content_length[1],
            self.padding_length,
            0,
        ]
    }

    /// Bytes following the header: content plus padding.
    pub fn body_len(&self) -> usize {
        self.content_length as usize + self.padding_length as usize
    }

    /// Total encoded size of the record this header introduces.
    pub fn record_len(&self) -> usize {
        HEADER_SIZE + self.body_len()
    }

    /// Validate the header and resolve its type.
    ///
    /// `Ok(None)` means an unknown type on the management request id, which
    /// is tolerated. The content length needs no check: the 16 bit field
    /// cannot exceed the protocol limit.
    pub fn resolve_type(&self) -> Result<Option<RecordType>, ProtocolError> {
        if self.version != VERSION {
            return Err(ProtocolError::UnsupportedVersion(self.version));
        }

        match RecordType::from_u8(self.record_type) {
            Some(record_type) => Ok(Some(record_type)),
            None if self.request_id == MANAGEMENT_REQUEST_ID => Ok(None),
            None => Err(ProtocolError::UnknownRecordType(self.record_type)),
        }
    }

    fn decode_record(
        &self,
        record_type: Option<RecordType>,
        content: Bytes,
    ) -> Result<Record, ProtocolError> {
        let body = match record_type {
            Some(record_type) => Body::decode(record_type, self.request_id, content)?,
            None => Body::UnknownManagement(self.record_type),
        };

        Ok(Record {
            request_id: self.request_id,
            body,
        })
    }
}

/// Padding needed to bring `content_length` up to a multiple of 8.
pub fn padding_for(content_length: usize) -> usize {
    (8 - content_length % 8) % 8
}

/// Typed record content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    BeginRequest {
        role: Role,
        flags: u8,
    },
    AbortRequest,
    EndRequest {
        app_status: u32,
        protocol_status: ProtocolStatus,
    },
    Params(Bytes),
    Stdin(Bytes),
    Stdout(Bytes),
    Stderr(Bytes),
    Data(Bytes),
    /// Variable names the client asks about.
    GetValues(Vec<String>),
    /// Variable names and values reported by the application.
    GetValuesResult(Vec<(String, String)>),
    /// Reply to a management record type the peer did not understand.
    UnknownType(u8),
    /// A management record whose type this client does not know.
    UnknownManagement(u8),
}

impl Body {
    /// Wire tag of this body.
    pub fn type_tag(&self) -> u8 {
        let record_type = match self {
            Body::BeginRequest { .. } => RecordType::BeginRequest,
            Body::AbortRequest => RecordType::AbortRequest,
            Body::EndRequest { .. } => RecordType::EndRequest,
            Body::Params(_) => RecordType::Params,
            Body::Stdin(_) => RecordType::Stdin,
            Body::Stdout(_) => RecordType::Stdout,
            Body::Stderr(_) => RecordType::Stderr,
            Body::Data(_) => RecordType::Data,
            Body::GetValues(_) => RecordType::GetValues,
            Body::GetValuesResult(_) => RecordType::GetValuesResult,
            Body::UnknownType(_) => RecordType::UnknownType,
            Body::UnknownManagement(tag) => return *tag,
        };
        record_type as u8
    }

    /// Stream content, for the byte-stream record types.
    pub fn stream_content(&self) -> Option<&Bytes> {
        match self {
            Body::Params(content)
            | Body::Stdin(content)
            | Body::Stdout(content)
            | Body::Stderr(content)
            | Body::Data(content) => Some(content),
            _ => None,
        }
    }

    fn encode_content(&self, buf: &mut BytesMut) {
        match self {
            Body::BeginRequest { role, flags } => {
                buf.put_u16((*role).into());
                buf.put_u8(*flags);
                buf.put_bytes(0, 5);
            }
            Body::AbortRequest | Body::UnknownManagement(_) => {}
            Body::EndRequest {
                app_status,
                protocol_status,
            } => {
                buf.put_u32(*app_status);
                buf.put_u8((*protocol_status).into());
                buf.put_bytes(0, 3);
            }
            Body::Params(content)
            | Body::Stdin(content)
            | Body::Stdout(content)
            | Body::Stderr(content)
            | Body::Data(content) => buf.extend_from_slice(content),
            Body::GetValues(keys) => {
                encode_pairs(keys.iter().map(|key| (key.as_str(), "")), buf);
            }
            Body::GetValuesResult(values) => {
                encode_pairs(
                    values
                        .iter()
                        .map(|(name, value)| (name.as_str(), value.as_str())),
                    buf,
                );
            }
            Body::UnknownType(record_type) => {
                buf.put_u8(*record_type);
                buf.put_bytes(0, 7);
            }
        }
    }

    fn decode(
        record_type: RecordType,
        request_id: u16,
        mut content: Bytes,
    ) -> Result<Body, ProtocolError> {
        if record_type.is_management() && request_id != MANAGEMENT_REQUEST_ID {
            return Err(ProtocolError::ManagementRequestId {
                record_type: record_type as u8,
                request_id,
            });
        }

        let needs_fixed_body = matches!(
            record_type,
            RecordType::BeginRequest | RecordType::EndRequest | RecordType::UnknownType
        );
        if needs_fixed_body && content.len() < FIXED_BODY_SIZE {
            return Err(ProtocolError::ShortBody {
                record_type: record_type as u8,
                len: content.len(),
            });
        }

        let body = match record_type {
            RecordType::BeginRequest => Body::BeginRequest {
                role: content.get_u16().into(),
                flags: content.get_u8(),
            },
            RecordType::AbortRequest => Body::AbortRequest,
            RecordType::EndRequest => Body::EndRequest {
                app_status: content.get_u32(),
                protocol_status: content.get_u8().into(),
            },
            RecordType::Params => Body::Params(content),
            RecordType::Stdin => Body::Stdin(content),
            RecordType::Stdout => Body::Stdout(content),
            RecordType::Stderr => Body::Stderr(content),
            RecordType::Data => Body::Data(content),
            RecordType::GetValues => Body::GetValues(
                decode_pairs(&content)?
                    .into_iter()
                    .map(|(name, _)| name)
                    .collect(),
            ),
            RecordType::GetValuesResult => Body::GetValuesResult(decode_pairs(&content)?),
            RecordType::UnknownType => Body::UnknownType(content.get_u8()),
        };

        Ok(body)
    }
}

/// One framed protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub request_id: u16,
    pub body: Body,
}

impl Record {
    pub fn new(request_id: u16, body: Body) -> Self {
        Self { request_id, body }
    }

    pub fn begin_request(request_id: u16, role: Role, flags: u8) -> Self {
        Self::new(request_id, Body::BeginRequest { role, flags })
    }

    pub fn abort_request(request_id: u16) -> Self {
        Self::new(request_id, Body::AbortRequest)
    }

    pub fn end_request(request_id: u16, app_status: u32, protocol_status: ProtocolStatus) -> Self {
        Self::new(
            request_id,
            Body::EndRequest {
                app_status,
                protocol_status,
            },
        )
    }

    pub fn get_values<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            MANAGEMENT_REQUEST_ID,
            Body::GetValues(keys.into_iter().map(Into::into).collect()),
        )
    }

    pub fn get_values_result(values: Vec<(String, String)>) -> Self {
        Self::new(MANAGEMENT_REQUEST_ID, Body::GetValuesResult(values))
    }

    pub fn unknown_type(record_type: u8) -> Self {
        Self::new(MANAGEMENT_REQUEST_ID, Body::UnknownType(record_type))
    }

    /// Append the encoded record to `buf`.
    ///
    /// Fails without touching `buf` if the content exceeds 65535 bytes.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        if let Some(content) = self.body.stream_content() {
            if content.len() > MAX_CONTENT_LENGTH {
                return Err(ProtocolError::ContentTooLarge(content.len()));
            }
        }

        let start = buf.len();
        buf.put_bytes(0, HEADER_SIZE);
        self.body.encode_content(buf);

        let content_length = buf.len() - start - HEADER_SIZE;
        if content_length > MAX_CONTENT_LENGTH {
            buf.truncate(start);
            return Err(ProtocolError::ContentTooLarge(content_length));
        }

        let padding_length = padding_for(content_length);
        buf.put_bytes(0, padding_length);

        let header = Header {
            version: VERSION,
            record_type: self.body.type_tag(),
            request_id: self.request_id,
            content_length: content_length as u16,
            padding_length: padding_length as u8,
        };
        buf[start..start + HEADER_SIZE].copy_from_slice(&header.to_bytes());

        Ok(())
    }

    /// Encode the record into a fresh buffer.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Decode one record from the front of `buf`, consuming it.
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched when it does not yet
    /// hold a complete record. On success exactly header + content + padding
    /// bytes are removed; anything after them stays for the next call.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Record>, ProtocolError> {
        let header = match Header::parse(&buf[..]) {
            Some(header) => header,
            None => return Ok(None),
        };
        let record_type = header.resolve_type()?;

        if buf.len() < header.record_len() {
            return Ok(None);
        }

        let mut frame = buf.split_to(header.record_len());
        frame.advance(HEADER_SIZE);
        frame.truncate(header.content_length as usize);

        header.decode_record(record_type, frame.freeze()).map(Some)
    }

    /// Read exactly one record from a blocking reader.
    ///
    /// End of stream anywhere inside the record is reported as
    /// [`Error::ConnectionClosed`].
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Record, Error> {
        let mut head = [0u8; HEADER_SIZE];
        read_full(reader, &mut head)?;

        let header = Header::from_bytes(&head);
        let record_type = header.resolve_type()?;

        let mut body = vec![0u8; header.body_len()];
        read_full(reader, &mut body)?;
        body.truncate(header.content_length as usize);

        Ok(header.decode_record(record_type, Bytes::from(body))?)
    }
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), Error> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
        _ => Error::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(record: Record) {
        let encoded = record.encode().unwrap();
        assert_eq!(encoded.len() % 8, 0, "unaligned encoding of {record:?}");

        let mut buf = encoded.clone();
        let decoded = Record::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, record);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_round_trip_all_types() {
        round_trip(Record::begin_request(1, Role::Responder, KEEP_CONN));
        round_trip(Record::begin_request(7, Role::Filter, 0));
        round_trip(Record::abort_request(3));
        round_trip(Record::end_request(1, 65537, ProtocolStatus::Overloaded));
        round_trip(Record::unknown_type(42));
        round_trip(Record::new(1, Body::Params(Bytes::from_static(b"\x01\x01ab"))));
        round_trip(Record::new(1, Body::Stdin(Bytes::from_static(b"input"))));
        round_trip(Record::new(1, Body::Stdout(Bytes::from_static(b"pong"))));
        round_trip(Record::new(1, Body::Stderr(Bytes::new())));
        round_trip(Record::new(1, Body::Data(Bytes::from_static(b"12345678"))));
        round_trip(Record::get_values(["FCGI_MAX_CONNS", "FCGI_MPXS_CONNS"]));
        round_trip(Record::get_values_result(vec![(
            "FCGI_MAX_REQS".to_string(),
            "50".to_string(),
        )]));
        round_trip(Record::new(0, Body::UnknownManagement(200)));
    }

    #[test]
    fn test_round_trip_nonstandard_codes() {
        round_trip(Record::begin_request(1, Role::Other(9), 0));
        round_trip(Record::end_request(1, 0, ProtocolStatus::Other(77)));
    }

    #[test]
    fn test_encoded_length_multiple_of_8() {
        for len in [0usize, 1, 7, 8, 65535] {
            let record = Record::new(1, Body::Stdout(Bytes::from(vec![b'x'; len])));
            let encoded = record.encode().unwrap();
            assert_eq!(encoded.len() % 8, 0, "content length {len}");
            assert_eq!(encoded.len(), HEADER_SIZE + len + padding_for(len));
        }
    }

    #[test]
    fn test_oversized_content_rejected() {
        let record = Record::new(1, Body::Stdin(Bytes::from(vec![0u8; 65536])));
        let mut buf = BytesMut::from(&b"prefix"[..]);
        assert_eq!(
            record.encode_into(&mut buf),
            Err(ProtocolError::ContentTooLarge(65536))
        );
        assert_eq!(&buf[..], b"prefix");
    }

    #[test]
    fn test_oversized_pairs_rejected() {
        let record = Record::get_values_result(vec![("K".to_string(), "v".repeat(70000))]);
        assert!(matches!(
            record.encode(),
            Err(ProtocolError::ContentTooLarge(_))
        ));
    }

    #[test]
    fn test_encode_stdout() {
        let record = Record::new(5, Body::Stdout(Bytes::from_static(b"data")));
        assert_eq!(
            &record.encode().unwrap()[..],
            b"\x01\x06\x00\x05\x00\x04\x04\x00data\x00\x00\x00\x00"
        );
    }

    #[test]
    fn test_encode_begin_request() {
        let record = Record::begin_request(5, Role::Responder, KEEP_CONN);
        assert_eq!(
            &record.encode().unwrap()[..],
            b"\x01\x01\x00\x05\x00\x08\x00\x00\x00\x01\x01\x00\x00\x00\x00\x00"
        );
    }

    #[test]
    fn test_encode_abort_request() {
        let record = Record::abort_request(5);
        assert_eq!(&record.encode().unwrap()[..], b"\x01\x02\x00\x05\x00\x00\x00\x00");
    }

    #[test]
    fn test_encode_end_request() {
        let record = Record::end_request(5, 65537, ProtocolStatus::Overloaded);
        assert_eq!(
            &record.encode().unwrap()[..],
            b"\x01\x03\x00\x05\x00\x08\x00\x00\x00\x01\x00\x01\x02\x00\x00\x00"
        );
    }

    #[test]
    fn test_encode_unknown_type() {
        let record = Record::unknown_type(12);
        assert_eq!(
            &record.encode().unwrap()[..],
            b"\x01\x0b\x00\x00\x00\x08\x00\x00\x0c\x00\x00\x00\x00\x00\x00\x00"
        );
    }

    #[test]
    fn test_encode_get_values() {
        let record = Record::get_values(["FOO", "BAR"]);
        assert_eq!(
            &record.encode().unwrap()[..],
            b"\x01\x09\x00\x00\x00\x0a\x06\x00\x03\x00FOO\x03\x00BAR\x00\x00\x00\x00\x00\x00"
        );
    }

    #[test]
    fn test_encode_get_values_result() {
        let record = Record::get_values_result(vec![
            ("FOO".to_string(), "abc".to_string()),
            ("BAR".to_string(), "xyz".to_string()),
        ]);
        assert_eq!(
            &record.encode().unwrap()[..],
            b"\x01\x0a\x00\x00\x00\x10\x00\x00\x03\x03FOOabc\x03\x03BARxyz"
        );
    }

    #[test]
    fn test_decode_get_values_keys_only() {
        let mut buf = BytesMut::from(&b"\x01\x09\x00\x00\x00\x0a\x06\x00\x03\x00FOO\x03\x00BAR\x00\x00\x00\x00\x00\x00"[..]);
        let record = Record::decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            record.body,
            Body::GetValues(vec!["FOO".to_string(), "BAR".to_string()])
        );
    }

    #[test]
    fn test_decode_stdin() {
        let mut buf = BytesMut::from(&b"\x01\x05\x00\x01\x00\x07\x00\x00content"[..]);
        let record = Record::decode(&mut buf).unwrap().unwrap();
        assert_eq!(record.request_id, 1);
        assert_eq!(record.body, Body::Stdin(Bytes::from_static(b"content")));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_leaves_buffer() {
        let partial = b"\x01\x05\x00\x01\x00\x07\x00\x00conten";
        let mut buf = BytesMut::from(&partial[..]);
        assert_eq!(Record::decode(&mut buf), Ok(None));
        assert_eq!(&buf[..], partial);

        // short header too
        let mut buf = BytesMut::from(&b"\x01\x06\x00"[..]);
        assert_eq!(Record::decode(&mut buf), Ok(None));
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decode_waits_for_padding() {
        let encoded = Record::new(1, Body::Stdout(Bytes::from_static(b"abc")))
            .encode()
            .unwrap();
        // content is complete but padding is not
        let mut buf = BytesMut::from(&encoded[..encoded.len() - 1]);
        assert_eq!(Record::decode(&mut buf), Ok(None));

        buf.extend_from_slice(&encoded[encoded.len() - 1..]);
        assert!(Record::decode(&mut buf).unwrap().is_some());
    }

    #[test]
    fn test_decode_leaves_trailing_bytes() {
        let mut buf = Record::new(1, Body::Stdout(Bytes::from_static(b"one")))
            .encode()
            .unwrap();
        let first_len = buf.len();
        Record::new(1, Body::Stderr(Bytes::from_static(b"two")))
            .encode_into(&mut buf)
            .unwrap();
        buf.extend_from_slice(b"\x01\x06");
        let total = buf.len();

        let first = Record::decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.body, Body::Stdout(Bytes::from_static(b"one")));
        assert_eq!(buf.len(), total - first_len);

        let second = Record::decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.body, Body::Stderr(Bytes::from_static(b"two")));
        assert_eq!(&buf[..], b"\x01\x06");

        assert_eq!(Record::decode(&mut buf), Ok(None));
    }

    #[test]
    fn test_decode_wrong_version() {
        let mut buf = BytesMut::from(&b"\x02\x01\x00\x01\x00\x00\x00\x00"[..]);
        let err = Record::decode(&mut buf).unwrap_err();
        assert_eq!(err, ProtocolError::UnsupportedVersion(2));
        assert!(err.to_string().contains("unexpected protocol version: 2"));
    }

    #[test]
    fn test_decode_unknown_type_on_request() {
        let mut buf = BytesMut::from(&b"\x01\x0c\x01\x00\x00\x00\x00\x00"[..]);
        let err = Record::decode(&mut buf).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownRecordType(12));
        assert!(err.to_string().contains("unknown record type: 12"));
    }

    #[test]
    fn test_decode_unknown_management_record() {
        // type 12 on request id 0, with 3 content bytes and 5 padding bytes
        let mut buf = BytesMut::from(&b"\x01\x0c\x00\x00\x00\x03\x05\x00abc\x00\x00\x00\x00\x00tail"[..]);
        let record = Record::decode(&mut buf).unwrap().unwrap();
        assert_eq!(record.request_id, 0);
        assert_eq!(record.body, Body::UnknownManagement(12));
        assert_eq!(&buf[..], b"tail");
    }

    #[test]
    fn test_decode_management_type_on_request_id() {
        let mut buf = Record::get_values(["FOO"]).encode().unwrap();
        buf[3] = 1;
        assert_eq!(
            Record::decode(&mut buf),
            Err(ProtocolError::ManagementRequestId {
                record_type: 9,
                request_id: 1
            })
        );
    }

    #[test]
    fn test_decode_short_fixed_body() {
        let mut buf = BytesMut::from(&b"\x01\x03\x00\x01\x00\x04\x04\x00\x00\x00\x00\x00\x00\x00\x00\x00"[..]);
        assert_eq!(
            Record::decode(&mut buf),
            Err(ProtocolError::ShortBody {
                record_type: 3,
                len: 4
            })
        );
    }

    #[test]
    fn test_decode_begin_request() {
        let mut buf = BytesMut::from(&b"\x01\x01\x00\x05\x00\x08\x00\x00\x00\x01\x01\x00\x00\x00\x00\x00"[..]);
        let record = Record::decode(&mut buf).unwrap().unwrap();
        assert_eq!(record.request_id, 5);
        assert_eq!(
            record.body,
            Body::BeginRequest {
                role: Role::Responder,
                flags: KEEP_CONN
            }
        );
    }

    #[test]
    fn test_decode_end_request() {
        let mut buf = BytesMut::from(&b"\x01\x03\x00\x05\x00\x08\x00\x00\x00\x01\x00\x01\x02\x00\x00\x00"[..]);
        let record = Record::decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            record.body,
            Body::EndRequest {
                app_status: 65537,
                protocol_status: ProtocolStatus::Overloaded
            }
        );
    }

    #[test]
    fn test_read_from_stream() {
        let mut bytes = Record::new(1, Body::Stdout(Bytes::from_static(b"pong")))
            .encode()
            .unwrap();
        Record::end_request(1, 0, ProtocolStatus::RequestComplete)
            .encode_into(&mut bytes)
            .unwrap();
        let mut reader = io::Cursor::new(bytes.to_vec());

        let first = Record::read_from(&mut reader).unwrap();
        assert_eq!(first.body, Body::Stdout(Bytes::from_static(b"pong")));
        let second = Record::read_from(&mut reader).unwrap();
        assert!(matches!(second.body, Body::EndRequest { .. }));

        assert!(matches!(
            Record::read_from(&mut reader),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_read_from_truncated_body() {
        let mut reader = io::Cursor::new(b"\x01\x06\x00\x01\x00\x04\x04\x00po".to_vec());
        assert!(matches!(
            Record::read_from(&mut reader),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_read_from_unknown_management_discards_body() {
        let mut bytes = BytesMut::from(&b"\x01\x0c\x00\x00\x00\x02\x06\x00xy\x00\x00\x00\x00\x00\x00"[..]);
        Record::new(1, Body::Stdout(Bytes::from_static(b"ok")))
            .encode_into(&mut bytes)
            .unwrap();
        let mut reader = io::Cursor::new(bytes.to_vec());

        let record = Record::read_from(&mut reader).unwrap();
        assert_eq!(record.body, Body::UnknownManagement(12));
        let record = Record::read_from(&mut reader).unwrap();
        assert_eq!(record.body, Body::Stdout(Bytes::from_static(b"ok")));
    }

    #[test]
    fn test_record_type_table() {
        assert_eq!(RecordType::from_u8(0), None);
        assert_eq!(RecordType::from_u8(1), Some(RecordType::BeginRequest));
        assert_eq!(RecordType::from_u8(11), Some(RecordType::UnknownType));
        assert_eq!(RecordType::from_u8(12), None);
        assert_eq!(RecordType::from_u8(255), None);
        for tag in 1..=11u8 {
            assert_eq!(RecordType::from_u8(tag).map(|t| t as u8), Some(tag));
        }
    }
}
