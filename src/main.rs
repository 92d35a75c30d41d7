//! fcgi-relay: send one request to a FastCGI application
//!
//! Features:
//! - Unix socket or TCP endpoints, reconnecting with exponential backoff
//! - Blocking, mio or tokio request drivers
//! - Parameters from a TOML file and/or the command line
//! - Management variable query (`--get-values`)

use bytes::Bytes;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fcgi_relay::config::{Config, RuntimeType};
use fcgi_relay::protocol::{FCGI_MAX_CONNS, FCGI_MAX_REQS, FCGI_MPXS_CONNS};
use fcgi_relay::{runtime, Client, Connector, Output, Request};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging; stdout carries the response
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    info!(
        endpoint = %config.endpoint,
        runtime = ?config.runtime,
        params = config.params.len(),
        max_attempts = ?config.backoff.max_attempts,
        "Starting fcgi-relay"
    );

    let connector = Connector::new(config.endpoint.clone(), config.backoff);

    if config.get_values {
        return get_values(connector);
    }

    let request = Request::new(
        config.params.clone(),
        read_payload(config.stdin.as_deref())?,
        read_payload(config.data.as_deref())?,
    );

    let output = match config.runtime {
        RuntimeType::Blocking => run_blocking(connector, &config, &request)?,
        RuntimeType::Mio => run_mio(&connector, request)?,
        RuntimeType::Tokio => run_tokio(&connector, request)?,
    };

    report(&output, config.raw)
}

/// Blocking client on this thread
fn run_blocking(
    connector: Connector,
    config: &Config,
    request: &Request,
) -> Result<Output, Box<dyn std::error::Error>> {
    info!("Using blocking client");
    Ok(Client::with_options(connector, config.options).execute(request)?)
}

/// Incremental session on a mio event loop (epoll on Linux, kqueue on macOS)
fn run_mio(connector: &Connector, request: Request) -> Result<Output, Box<dyn std::error::Error>> {
    info!("Using mio runtime (epoll/kqueue)");
    Ok(runtime::mio::run(connector, request)?)
}

/// Incremental session on a single-threaded tokio runtime
fn run_tokio(connector: &Connector, request: Request) -> Result<Output, Box<dyn std::error::Error>> {
    info!("Using tokio runtime");
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(rt.block_on(runtime::tokio::call(connector, request))?)
}

fn get_values(connector: Connector) -> Result<(), Box<dyn std::error::Error>> {
    let values =
        Client::new(connector).get_values(&[FCGI_MAX_CONNS, FCGI_MAX_REQS, FCGI_MPXS_CONNS])?;

    let mut stdout = io::stdout().lock();
    for (name, value) in values {
        writeln!(stdout, "{name}={value}")?;
    }
    Ok(())
}

/// Read a payload file, `-` meaning standard input.
fn read_payload(path: Option<&Path>) -> io::Result<Bytes> {
    let mut buf = Vec::new();
    match path {
        None => {}
        Some(path) if path == Path::new("-") => {
            io::stdin().lock().read_to_end(&mut buf)?;
        }
        Some(path) => buf = std::fs::read(path)?,
    }
    Ok(Bytes::from(buf))
}

fn report(output: &Output, raw: bool) -> Result<(), Box<dyn std::error::Error>> {
    for line in String::from_utf8_lossy(&output.stderr).lines() {
        error!(app_stderr = line, "Application error output");
    }
    if !output.is_complete() {
        warn!(
            app_status = output.app_status,
            protocol_status = ?output.protocol_status,
            "Request was not completed"
        );
    }

    let mut stdout = io::stdout().lock();
    if raw {
        stdout.write_all(&output.stdout)?;
    } else {
        let response = output.response()?;
        info!(
            status = %response.status,
            headers = response.headers.len(),
            body_len = response.body.len(),
            "Response received"
        );
        stdout.write_all(&response.body)?;
    }
    stdout.flush()?;
    Ok(())
}
