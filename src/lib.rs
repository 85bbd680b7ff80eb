//! crlf-probe: an interactive probe client for CRLF-delimited text protocols.
//!
//! The client is a raw pipe with line framing, used to poke at servers such as
//! POP3 by hand:
//! - `framer`: turns the byte stream into lines with per-read deadlines
//! - `connection`: connection setup and close-once ownership
//! - `command`: operator input parsing for the explicit and auto modes
//! - `session`: the operator-driven command loop
//! - `config`: CLI arguments and TOML configuration

pub mod command;
pub mod config;
pub mod connection;
pub mod framer;
pub mod session;

#[cfg(test)]
mod testing;
