use std::io::{self, BufReader, Read, Write};

use log::trace;
use thiserror::Error;

use super::{
    Popped, Reply,
    codec::{self, CodecError},
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to decode reply: {0}")]
    Codec(#[from] CodecError),
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// True when the peer simply closed the connection.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, TransportError::Codec(CodecError::EndOfStream))
    }
}

/// One duplex connection to the store.
///
/// Reads go through a buffer; every command is written as one complete
/// frame and flushed before the reply is read.
pub struct ProtocolTransport<T: Read + Write> {
    stream: BufReader<T>,
}

impl<T: Read + Write> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    pub fn write_command(&mut self, name: &str, args: &[&str]) -> Result<(), TransportError> {
        let frame = codec::encode_command(name, args);
        trace!("sending {name} ({} bytes)", frame.len());

        let stream = self.stream.get_mut();
        stream.write_all(&frame)?;
        stream.flush()?;
        Ok(())
    }

    pub fn read_reply(&mut self) -> Result<Reply, TransportError> {
        Ok(codec::decode_reply(&mut self.stream)?)
    }

    /// Sends a command whose only acceptable answer is a status line.
    pub fn command_status(&mut self, name: &str, args: &[&str]) -> Result<String, TransportError> {
        self.write_command(name, args)?;
        let reply = self.read_reply()?;
        Ok(codec::interpret_status(reply)?)
    }

    /// Issues `BRPOP <queue> <wait_secs>` and interprets the answer.
    pub fn blocking_pop(&mut self, queue: &str, wait_secs: u64) -> Result<Popped, TransportError> {
        self.write_command("BRPOP", &[queue, wait_secs.to_string().as_str()])?;
        let reply = self.read_reply()?;
        Ok(codec::interpret_pop(reply)?)
    }

    pub fn get_ref(&self) -> &T {
        self.stream.get_ref()
    }

    pub fn into_inner(self) -> T {
        self.stream.into_inner()
    }
}
