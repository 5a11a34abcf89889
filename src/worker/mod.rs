//! Queue consumption engine.
//!
//! The worker keeps exactly one connection to the store open at a time and
//! speaks to it strictly request-then-reply:
//!
//! ```text
//! Disconnected -> Dialing -> Authenticating -> SelectingNamespace -> Polling
//!       ^                                                               |
//!       +------------------------- Failed <-----------------------------+
//! ```
//!
//! Authentication and namespace selection are skipped when not configured.
//! Any failure discards the connection, waits according to the [`Backoff`]
//! strategy and starts over from [`ConnectionState::Disconnected`].
//!
//! # Key Components
//!
//! - [`Handshake`]: `AUTH` / `SELECT` on a fresh connection.
//! - [`QueuePoller`]: `BRPOP` loop feeding the [`Dispatcher`](crate::dispatch::Dispatcher).
//! - [`Supervisor`]: the dial and retry state machine.
mod handshake;
mod poller;
mod supervisor;

pub use handshake::{Handshake, HandshakeError, Session};
pub use poller::{DEFAULT_IDLE_HEARTBEAT, DEFAULT_POP_WAIT_SECS, PollStats, QueuePoller};
pub use supervisor::{
    Backoff, ConnectionState, DEFAULT_CONNECT_BACKOFF, DEFAULT_DIAL_TIMEOUT,
    DEFAULT_SESSION_BACKOFF, Dialer, Failure, FixedBackoff, Supervisor, SupervisorError,
    TcpDialer,
};
