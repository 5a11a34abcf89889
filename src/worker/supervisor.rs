use std::{
    fmt,
    io::{self, Read, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
    thread,
    time::Duration,
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    dispatch::{Dispatcher, Processor},
    protocol::ProtocolTransport,
};

use super::{Handshake, QueuePoller, Session};

/// Time allowed for a TCP connect before the attempt counts as failed.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);
/// Wait after a failed dial or handshake.
pub const DEFAULT_CONNECT_BACKOFF: Duration = Duration::from_secs(2);
/// Wait after an established session broke.
pub const DEFAULT_SESSION_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Dialing,
    Authenticating,
    SelectingNamespace,
    Polling,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Dialing => "dialing",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::SelectingNamespace => "selecting namespace",
            ConnectionState::Polling => "polling",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which kind of failure ended a supervisor iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Dial or handshake did not succeed.
    Connect,
    /// A session that was polling broke.
    Session,
}

/// Delay strategy between supervisor iterations.
pub trait Backoff {
    fn delay(&mut self, failure: Failure) -> Duration;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    pub connect: Duration,
    pub session: Duration,
}

impl Default for FixedBackoff {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_BACKOFF,
            session: DEFAULT_SESSION_BACKOFF,
        }
    }
}

impl Backoff for FixedBackoff {
    fn delay(&mut self, failure: Failure) -> Duration {
        match failure {
            Failure::Connect => self.connect,
            Failure::Session => self.session,
        }
    }
}

/// Opens fresh duplex streams to the store.
pub trait Dialer {
    type Stream: Read + Write;

    fn dial(&mut self) -> io::Result<Self::Stream>;

    /// Human readable endpoint for log lines.
    fn describe(&self) -> String;

    /// Releases the stream. Dropping it is enough unless the transport needs
    /// an explicit shutdown.
    fn close(&mut self, stream: Self::Stream) {
        drop(stream);
    }
}

/// Dials `host:port` over TCP, trying every resolved address in turn.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    address: String,
    timeout: Duration,
}

impl TcpDialer {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Dialer for TcpDialer {
    type Stream = TcpStream;

    fn dial(&mut self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in self.address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("'{}' did not resolve to any address", self.address),
            )
        }))
    }

    fn describe(&self) -> String {
        self.address.clone()
    }

    fn close(&mut self, stream: TcpStream) {
        if let Err(e) = stream.shutdown(Shutdown::Both) {
            debug!("shutdown failed: {e}");
        }
    }
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("gave up after {0} consecutive failed attempts")]
    Exhausted(u32),
}

/// Owns the connect, handshake, poll and retry cycle.
pub struct Supervisor<D: Dialer, B: Backoff> {
    dialer: D,
    backoff: B,
    handshake: Handshake,
    poller: QueuePoller,
    state: ConnectionState,
    max_attempts: Option<u32>,
}

impl<D: Dialer, B: Backoff> Supervisor<D, B> {
    pub fn new(dialer: D, backoff: B, handshake: Handshake, poller: QueuePoller) -> Self {
        Self {
            dialer,
            backoff,
            handshake,
            poller,
            state: ConnectionState::Disconnected,
            max_attempts: None,
        }
    }

    /// Stop after `attempts` consecutive iterations that ended in failure.
    /// A session that reached polling resets the count.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    pub fn backoff(&self) -> &B {
        &self.backoff
    }

    pub fn poller(&self) -> &QueuePoller {
        &self.poller
    }

    /// Runs until the attempt cap is hit; without a cap it never returns.
    pub fn run<P: Processor>(
        &mut self,
        dispatcher: &mut Dispatcher<P>,
    ) -> Result<(), SupervisorError> {
        info!(
            "starting service endpoint={} queue={}",
            self.dialer.describe(),
            self.poller.queue()
        );

        let mut failures = 0;
        loop {
            let failure = self.run_once(dispatcher);
            if failure == Failure::Session {
                failures = 0;
            }
            failures += 1;

            if let Some(max) = self.max_attempts {
                if failures >= max {
                    return Err(SupervisorError::Exhausted(failures));
                }
            }

            let delay = self.backoff.delay(failure);
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            self.transition(ConnectionState::Disconnected);
        }
    }

    /// One full iteration: dial, handshake, poll until the session breaks.
    /// Leaves the supervisor in [`ConnectionState::Failed`].
    pub fn run_once<P: Processor>(&mut self, dispatcher: &mut Dispatcher<P>) -> Failure {
        self.transition(ConnectionState::Dialing);
        let stream = match self.dialer.dial() {
            Ok(stream) => stream,
            Err(e) => {
                warn!("connect to {} failed: {e}", self.dialer.describe());
                self.transition(ConnectionState::Failed);
                return Failure::Connect;
            }
        };

        let mut transport = ProtocolTransport::new(stream);
        if self.handshake.needs_auth() {
            self.transition(ConnectionState::Authenticating);
            if let Err(e) = self.handshake.authenticate(&mut transport) {
                return self.abandon(transport, e, Failure::Connect);
            }
        }
        if self.handshake.needs_select() {
            self.transition(ConnectionState::SelectingNamespace);
            if let Err(e) = self.handshake.select(&mut transport) {
                return self.abandon(transport, e, Failure::Connect);
            }
        }

        let mut session = Session::new(transport, self.handshake.namespace);
        info!(
            "connected endpoint={} db={} listening={}",
            self.dialer.describe(),
            session.namespace,
            self.poller.queue()
        );
        self.transition(ConnectionState::Polling);

        let err = self.poller.run(&mut session, dispatcher);
        if err.is_end_of_stream() {
            info!("connection closed by server");
        } else {
            warn!("session error: {err}");
        }
        let stats = self.poller.stats();
        debug!(
            "session ended jobs={} timeouts={} heartbeats={}",
            stats.jobs, stats.timeouts, stats.heartbeats
        );

        self.dialer.close(session.transport.into_inner());
        self.transition(ConnectionState::Failed);
        Failure::Session
    }

    fn abandon(
        &mut self,
        transport: ProtocolTransport<D::Stream>,
        err: impl fmt::Display,
        failure: Failure,
    ) -> Failure {
        warn!("{} failed: {err}", self.state);
        self.dialer.close(transport.into_inner());
        self.transition(ConnectionState::Failed);
        failure
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!("connection state {} -> {}", self.state, next);
        self.state = next;
    }
}
