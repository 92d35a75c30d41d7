//! FastCGI wire protocol.
//!
//! - `record`: record header, typed bodies, encode/decode
//! - `pairs`: name/value pair codec used by PARAMS and GET_VALUES
//! - `request`: outbound record sequence and reply accumulation
//! - `response`: parsing of the CGI document the application writes to stdout

pub mod pairs;
pub mod record;
pub mod request;
pub mod response;

pub use pairs::{decode_pairs, encode_pairs, encode_pairs_to_vec};
pub use record::{
    Body, Header, ProtocolStatus, Record, RecordType, Role, HEADER_SIZE, KEEP_CONN,
    MANAGEMENT_REQUEST_ID, MAX_CONTENT_LENGTH, VERSION,
};
pub use request::{Output, OutputCollector, Params, Request, RequestOptions, REQUEST_ID};
pub use response::{parse_response, Response};

/// Management variable: maximum concurrent transport connections.
pub const FCGI_MAX_CONNS: &str = "FCGI_MAX_CONNS";

/// Management variable: maximum concurrent requests.
pub const FCGI_MAX_REQS: &str = "FCGI_MAX_REQS";

/// Management variable: whether the application multiplexes connections.
pub const FCGI_MPXS_CONNS: &str = "FCGI_MPXS_CONNS";
