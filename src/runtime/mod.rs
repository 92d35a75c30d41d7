//! Connection handling and request drivers.
//!
//! - `connection`: endpoints, blocking streams, connect with retry
//! - `backoff`: retry policy shared by every driver
//! - `session`: sans-io incremental client state machine
//! - `mio`: readiness-based driver for the session (epoll/kqueue)
//! - `tokio`: async driver for the session

mod backoff;
mod connection;
pub mod mio;
mod session;
pub mod tokio;

pub use backoff::{Backoff, RetryError};
pub use connection::{Connector, Endpoint, ParseEndpointError, Stream};
pub use session::{ClientSession, ProcessResult};
