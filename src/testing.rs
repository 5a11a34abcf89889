//! In-memory helpers shared by unit tests.
use std::{
    cell::RefCell,
    collections::VecDeque,
    io::{self, Cursor, Read, Write},
    rc::Rc,
    time::Duration,
};

use crate::{
    dispatch::Processor,
    worker::{Backoff, Dialer, Failure},
};

/// Duplex stream that replays a fixed server script and records writes.
pub struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    output: Vec<u8>,
    fail_writes: bool,
}

impl ScriptedStream {
    pub fn new(script: &str) -> Self {
        Self::from_bytes(script.as_bytes())
    }

    pub fn from_bytes(script: &[u8]) -> Self {
        Self {
            input: Cursor::new(script.to_vec()),
            output: Vec::new(),
            fail_writes: false,
        }
    }

    pub fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
        }
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Dialer handing out scripted connections in order; fails once exhausted.
pub struct ScriptedDialer {
    pub scripts: VecDeque<io::Result<ScriptedStream>>,
    pub dials: usize,
}

impl ScriptedDialer {
    pub fn new(scripts: Vec<io::Result<ScriptedStream>>) -> Self {
        Self {
            scripts: scripts.into(),
            dials: 0,
        }
    }
}

impl Dialer for ScriptedDialer {
    type Stream = ScriptedStream;

    fn dial(&mut self) -> io::Result<ScriptedStream> {
        self.dials += 1;
        self.scripts.pop_front().unwrap_or_else(|| {
            Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))
        })
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Backoff that records which failures it was asked to wait for.
#[derive(Default)]
pub struct RecordingBackoff {
    pub waits: Vec<Failure>,
}

impl Backoff for RecordingBackoff {
    fn delay(&mut self, failure: Failure) -> Duration {
        self.waits.push(failure);
        Duration::ZERO
    }
}

/// Processor that records identifiers and optionally fails on some of them.
#[derive(Clone, Default)]
pub struct RecordingProcessor {
    pub seen: Rc<RefCell<Vec<i64>>>,
    pub fail_on: Option<i64>,
}

impl Processor for RecordingProcessor {
    type Error = String;

    fn process(&mut self, id: i64) -> Result<(), String> {
        self.seen.borrow_mut().push(id);
        match self.fail_on {
            Some(bad) if bad == id => Err(format!("test run {id} exploded")),
            _ => Ok(()),
        }
    }
}
