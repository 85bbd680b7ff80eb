//! crlf-probe: connect to a line-oriented text protocol server and talk to it
//! by hand.
//!
//! ```text
//! crlf-probe mail.example.org 110
//! send USER alice
//! recv
//! ```

use clap::CommandFactory;
use crlf_probe::config::{CliArgs, Config};
use crlf_probe::connection;
use crlf_probe::session::{Session, SessionOptions};
use std::io;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!();
            eprintln!("{}", CliArgs::command().render_usage());
            return ExitCode::from(2);
        }
    };

    // Initialize logging; stdout belongs to the operator
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        mode = ?config.mode,
        greeting = config.greeting,
        read_timeout_secs = config.read_timeout.as_secs(),
        max_line_length = ?config.max_line_length,
        "Starting crlf-probe"
    );

    println!("Starting line protocol client");
    println!(
        "Connecting to server {} on port {}",
        config.host, config.port
    );

    let conn = match connection::connect(&config) {
        Ok(conn) => conn,
        Err(e) => {
            error!(error = %e, "Connection failed");
            eprintln!("Could not connect: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Connected!");
    println!();

    let session = Session::new(
        conn,
        SessionOptions::from(&config),
        io::stdin().lock(),
        io::stdout().lock(),
    );

    match session.run() {
        Ok(end) => {
            println!("Done");
            end.exit_code()
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
