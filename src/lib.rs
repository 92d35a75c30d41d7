//! fcgi-relay: client side of the FastCGI protocol.
//!
//! - `protocol`: record and name/value pair codecs, request building and
//!   response parsing
//! - `client`: blocking request/response over a fresh connection
//! - `runtime`: connection acquisition with backoff, the buffer-driven
//!   session and its mio and tokio drivers
//! - `config`: CLI and TOML configuration for the binary

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod runtime;

pub use client::Client;
pub use error::{Error, ProtocolError, Result};
pub use protocol::{Output, Params, Request, RequestOptions, Response};
pub use runtime::{Backoff, ClientSession, Connector, Endpoint};
