//! In-memory transport for unit tests.
//!
//! A `ScriptedStream` replays a queue of deliveries: data chunks, stalls that
//! surface as a timed-out read, and injected I/O errors. Once the script is
//! exhausted reads return 0, i.e. the peer closed. Writes can be made to fail
//! from a given call onward. Clones share state so a test can keep a handle
//! after moving the stream into a connection.

use crate::framer::Transport;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::rc::Rc;
use std::time::Duration;

enum Step {
    Data(Vec<u8>),
    Stall,
    Fail(ErrorKind),
}

#[derive(Default)]
struct Inner {
    steps: VecDeque<Step>,
    written: Vec<u8>,
    writes: usize,
    write_failure: Option<(usize, ErrorKind)>,
    deadlines: Vec<Option<Duration>>,
    shutdowns: usize,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedStream {
    inner: Rc<RefCell<Inner>>,
}

impl ScriptedStream {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue one delivery of `bytes`.
    pub(crate) fn data(self, bytes: &[u8]) -> Self {
        if !bytes.is_empty() {
            self.push(Step::Data(bytes.to_vec()));
        }
        self
    }

    /// Queue a read that reports no data before the deadline.
    pub(crate) fn stall(self) -> Self {
        self.push(Step::Stall);
        self
    }

    /// Queue a read that fails with `kind`.
    pub(crate) fn fail(self, kind: ErrorKind) -> Self {
        self.push(Step::Fail(kind));
        self
    }

    /// Fail every write from the `nth` (0-based) onward with `kind`.
    pub(crate) fn fail_writes_from(self, nth: usize, kind: ErrorKind) -> Self {
        self.inner.borrow_mut().write_failure = Some((nth, kind));
        self
    }

    fn push(&self, step: Step) {
        self.inner.borrow_mut().steps.push_back(step);
    }

    pub(crate) fn written(&self) -> Vec<u8> {
        self.inner.borrow().written.clone()
    }

    pub(crate) fn deadlines(&self) -> Vec<Option<Duration>> {
        self.inner.borrow().deadlines.clone()
    }

    pub(crate) fn current_deadline(&self) -> Option<Duration> {
        self.inner.borrow().deadlines.last().copied().flatten()
    }

    pub(crate) fn shutdowns(&self) -> usize {
        self.inner.borrow().shutdowns
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.borrow_mut();
        match inner.steps.pop_front() {
            None => Ok(0),
            Some(Step::Stall) => Err(ErrorKind::WouldBlock.into()),
            Some(Step::Fail(kind)) => Err(kind.into()),
            Some(Step::Data(mut chunk)) => {
                let n = buf.len().min(chunk.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                chunk.drain(..n);
                if !chunk.is_empty() {
                    inner.steps.push_front(Step::Data(chunk));
                }
                Ok(n)
            }
        }
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.borrow_mut();
        let call = inner.writes;
        inner.writes += 1;
        if let Some((nth, kind)) = inner.write_failure {
            if call >= nth {
                return Err(kind.into());
            }
        }
        inner.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for ScriptedStream {
    fn set_deadline(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.inner.borrow_mut().deadlines.push(timeout);
        Ok(())
    }

    fn shutdown_both(&mut self) -> io::Result<()> {
        self.inner.borrow_mut().shutdowns += 1;
        Ok(())
    }
}
