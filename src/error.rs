//! Error types for the FastCGI client.
//!
//! Protocol violations are always fatal to the exchange in flight. Connection
//! failures while connecting are retried by the connector and only surface
//! here when a bounded retry policy gives up.

use crate::runtime::Endpoint;

/// Violations of the FastCGI wire format or exchange rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unexpected protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("unknown record type: {0}")]
    UnknownRecordType(u8),

    #[error("content length {0} is more than 65535 bytes")]
    ContentTooLarge(usize),

    #[error("record type {record_type} needs an 8 byte body, got {len}")]
    ShortBody { record_type: u8, len: usize },

    #[error("record type {record_type} must use request id 0, got {request_id}")]
    ManagementRequestId { record_type: u8, request_id: u16 },

    #[error("record for request {actual} received while serving request {expected}")]
    RequestIdMismatch { expected: u16, actual: u16 },

    #[error("peer does not understand record type {0}")]
    RejectedRecordType(u8),

    #[error("not enough data to decode name length in name-value pair")]
    NameLengthTruncated,

    #[error("not enough data to decode value length in name-value pair")]
    ValueLengthTruncated,

    #[error("name/value data missing from buffer")]
    PairDataTruncated,

    #[error("name/value pair is not valid UTF-8")]
    InvalidText,
}

/// Top-level error for client operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("FastCGI protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to connect to {endpoint} after {attempts} attempts: {source}")]
    Connect {
        endpoint: Endpoint,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("connection closed before the request completed")]
    ConnectionClosed,

    #[error("malformed response header line: {0:?}")]
    MalformedResponse(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = Error::from(ProtocolError::UnsupportedVersion(2));
        assert_eq!(
            err.to_string(),
            "FastCGI protocol violation: unexpected protocol version: 2"
        );

        let err = Error::from(ProtocolError::UnknownRecordType(12));
        assert!(err.to_string().contains("unknown record type: 12"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_connect_error_display() {
        let err = Error::Connect {
            endpoint: Endpoint::Tcp {
                host: "127.0.0.1".to_string(),
                port: 9000,
            },
            attempts: 3,
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(
            err.to_string(),
            "failed to connect to 127.0.0.1:9000 after 3 attempts: refused"
        );
    }
}
