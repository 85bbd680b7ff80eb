//! Operator input parser.
//!
//! Commands are case-sensitive and matched by prefix, so `send` text keeps
//! its exact bytes, leading spaces included.

use crate::config::Mode;

/// One parsed line of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    /// `send <text>` / `s <text>`: write text plus delimiter, no read.
    Send(&'a str),
    /// `recv` / `r`: read one response line.
    Recv,
    /// `fail`: run the malformed-line stress probe, then end the session.
    Fail,
    /// `quit` / `q`: end the session.
    Quit,
    /// Auto mode: send the text (unless empty), then read one response line.
    Raw(&'a str),
    /// Unrecognized explicit-mode input.
    Unknown,
}

/// Parse one operator line, line ending already removed.
pub fn parse(line: &str, mode: Mode) -> Input<'_> {
    if mode == Mode::Auto {
        return Input::Raw(line);
    }

    if let Some(text) = line.strip_prefix("send ").or_else(|| line.strip_prefix("s ")) {
        return Input::Send(text);
    }

    match line {
        "recv" | "r" => Input::Recv,
        "fail" => Input::Fail,
        "quit" | "q" => Input::Quit,
        _ => Input::Unknown,
    }
}

/// Strip one trailing `\n` or `\r\n` from a line read from the operator.
pub fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Reminder printed for unrecognized explicit-mode input.
pub const USAGE: &str = "\
To send data, type \"send\" or \"s\" followed by some text, then hit enter.
To receive data, type \"recv\" or \"r\", then hit enter.
To stress-test the server with malformed lines, type \"fail\".
To quit, type \"quit\" or \"q\", or use Control-C or Control-D.";
