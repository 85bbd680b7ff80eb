//! Interactive session driver.
//!
//! Reads operator lines, turns them into writes and framed reads on the
//! connection, and reports every outcome on the operator output. Reads and
//! writes are strictly sequential; there is never more than one outstanding
//! operation on the connection.
//!
//! The session is `AwaitingInput` until one of these ends it:
//! - operator input ends
//! - `quit`, or the `fail` probe finishing
//! - the peer closes the stream
//! - a transport or decoding failure
//!
//! A read timeout is reported and the session keeps going. Whatever ends the
//! session, the connection is closed exactly once on the way out.

use crate::command::{self, Input, USAGE};
use crate::config::{Config, Mode};
use crate::connection::Connection;
use crate::framer::{Framer, ReadOutcome, Transport};
use std::fmt;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lines written by the `fail` probe, each followed by a read.
const PROBE_LINES: [&[u8]; 3] = [b"\r\n", b" \r\n", b" \n  \r\n"];

/// Written last by the `fail` probe; the session ends without a delimiter.
const PROBE_TAIL: &[u8] = b"xyz";

/// Errors on the operator side of the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to write to operator output: {0}")]
    Output(#[source] io::Error),
}

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Operator input reached end-of-input.
    InputEnded,
    /// Operator issued `quit`.
    Quit,
    /// The `fail` probe ran to completion.
    ProbeFinished,
    /// Peer closed the connection.
    PeerClosed,
    /// Transport or decoding failure.
    Failed,
}

impl SessionEnd {
    pub fn exit_code(self) -> ExitCode {
        match self {
            SessionEnd::Failed => ExitCode::FAILURE,
            _ => ExitCode::SUCCESS,
        }
    }
}

/// Session behaviour settings.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub mode: Mode,
    /// Read one line before the first prompt.
    pub greeting: bool,
    pub framer: Framer,
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            mode: config.mode,
            greeting: config.greeting,
            framer: config.framer(),
        }
    }
}

/// Outcome of one step: keep going, or end the session.
type Step = Result<Option<SessionEnd>, SessionError>;

/// One operator-driven run against a single connection.
pub struct Session<T: Transport, R, W> {
    conn: Connection<T>,
    options: SessionOptions,
    input: R,
    output: W,
}

impl<T, R, W> Session<T, R, W>
where
    T: Transport,
    R: BufRead,
    W: Write,
{
    pub fn new(conn: Connection<T>, options: SessionOptions, input: R, output: W) -> Self {
        Self {
            conn,
            options,
            input,
            output,
        }
    }

    /// Drive the session to completion and close the connection.
    pub fn run(mut self) -> Result<SessionEnd, SessionError> {
        info!(peer = %self.conn.peer(), mode = ?self.options.mode, "Session started");
        let result = self.drive();
        self.teardown();

        match &result {
            Ok(end) => info!(?end, "Session ended"),
            Err(e) => warn!(error = %e, "Session aborted"),
        }
        result
    }

    fn drive(&mut self) -> Result<SessionEnd, SessionError> {
        if self.options.greeting {
            if let Some(end) = self.receive()? {
                return Ok(end);
            }
        }

        let mut line = String::new();
        loop {
            line.clear();
            match self.input.read_line(&mut line) {
                Ok(0) => return Ok(SessionEnd::InputEnded),
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "Operator input failed");
                    return Ok(SessionEnd::InputEnded);
                }
            }

            let text = command::strip_line_ending(&line);
            if let Some(end) = self.dispatch(command::parse(text, self.options.mode))? {
                return Ok(end);
            }
        }
    }

    fn dispatch(&mut self, input: Input<'_>) -> Step {
        match input {
            Input::Send(text) => {
                if let Some(end) = self.transmit_line(text)? {
                    return Ok(Some(end));
                }
                self.say(format_args!("sent: {text}"))?;
                Ok(None)
            }
            Input::Recv => self.receive(),
            Input::Fail => self.probe(),
            Input::Quit => Ok(Some(SessionEnd::Quit)),
            Input::Raw(text) => {
                if !text.is_empty() {
                    if let Some(end) = self.transmit_line(text)? {
                        return Ok(Some(end));
                    }
                }
                self.receive()
            }
            Input::Unknown => {
                self.say(format_args!("{USAGE}"))?;
                Ok(None)
            }
        }
    }

    /// Send empty and whitespace-only lines, printing each response, then
    /// leave a line unterminated and end the session.
    fn probe(&mut self) -> Step {
        for data in PROBE_LINES {
            if let Some(end) = self.transmit(data)? {
                return Ok(Some(end));
            }
            if let Some(end) = self.receive()? {
                return Ok(Some(end));
            }
        }

        if let Some(end) = self.transmit(PROBE_TAIL)? {
            return Ok(Some(end));
        }
        Ok(Some(SessionEnd::ProbeFinished))
    }

    /// Read one line and render the outcome.
    fn receive(&mut self) -> Step {
        match self.conn.read_line(&self.options.framer) {
            ReadOutcome::Line(line) => {
                self.say(format_args!("recv: {line}"))?;
                Ok(None)
            }
            ReadOutcome::Timeout => {
                self.say(format_args!("Timeout, no data received."))?;
                Ok(None)
            }
            ReadOutcome::Closed => {
                self.say(format_args!("Remote connection lost."))?;
                Ok(Some(SessionEnd::PeerClosed))
            }
            ReadOutcome::Failed(e) => {
                warn!(error = %e, "Read failed");
                self.say(format_args!("Error with connection: {e}"))?;
                Ok(Some(SessionEnd::Failed))
            }
        }
    }

    fn transmit_line(&mut self, text: &str) -> Step {
        let result = self.conn.send_line(text);
        self.after_write(result)
    }

    fn transmit(&mut self, data: &[u8]) -> Step {
        let result = self.conn.send(data);
        self.after_write(result)
    }

    fn after_write(&mut self, result: io::Result<()>) -> Step {
        match result {
            Ok(()) => Ok(None),
            Err(e) => {
                warn!(error = %e, "Write failed");
                self.say(format_args!("Error with connection: {e}"))?;
                Ok(Some(SessionEnd::Failed))
            }
        }
    }

    fn teardown(&mut self) {
        if !self.conn.is_open() {
            return;
        }
        let peer = self.conn.peer().to_string();
        if let Err(e) = self.say(format_args!("Closing connection to {peer}")) {
            warn!(error = %e, "Could not report teardown");
        }
        self.conn.close();
    }

    fn say(&mut self, message: fmt::Arguments<'_>) -> Result<(), SessionError> {
        writeln!(self.output, "{message}")
            .and_then(|()| self.output.flush())
            .map_err(SessionError::Output)
    }
}
