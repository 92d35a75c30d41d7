//! mio-based driver for the incremental client.
//!
//! Readiness-based I/O using mio (epoll on Linux, kqueue on macOS).

mod event_loop;

pub use event_loop::{drive, run, MioStream};
