use std::io::{Read, Write};

use log::debug;
use thiserror::Error;

use crate::protocol::{ProtocolTransport, TransportError};

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("auth failed: {0}")]
    Auth(TransportError),
    #[error("select {index} failed: {source}")]
    Select {
        index: u32,
        source: TransportError,
    },
}

/// A connection that finished its handshake and is ready to poll.
pub struct Session<T: Read + Write> {
    pub transport: ProtocolTransport<T>,
    pub namespace: u32,
}

impl<T: Read + Write> Session<T> {
    pub fn new(transport: ProtocolTransport<T>, namespace: u32) -> Self {
        Self {
            transport,
            namespace,
        }
    }
}

/// Authentication and namespace settings applied to every new connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    pub credential: Option<String>,
    pub namespace: u32,
}

impl Handshake {
    pub fn needs_auth(&self) -> bool {
        self.credential.is_some()
    }

    pub fn needs_select(&self) -> bool {
        self.namespace != 0
    }

    pub fn authenticate<T: Read + Write>(
        &self,
        transport: &mut ProtocolTransport<T>,
    ) -> Result<(), HandshakeError> {
        if let Some(credential) = &self.credential {
            transport
                .command_status("AUTH", &[credential.as_str()])
                .map_err(HandshakeError::Auth)?;
            debug!("authenticated");
        }
        Ok(())
    }

    pub fn select<T: Read + Write>(
        &self,
        transport: &mut ProtocolTransport<T>,
    ) -> Result<(), HandshakeError> {
        if self.needs_select() {
            let index = self.namespace;
            transport
                .command_status("SELECT", &[index.to_string().as_str()])
                .map_err(|source| HandshakeError::Select { index, source })?;
            debug!("selected namespace {index}");
        }
        Ok(())
    }
}
