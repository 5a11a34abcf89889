//! Client side of the key/value store wire protocol.
//!
//! Only the handful of commands a queue consumer needs are spoken here:
//! `AUTH`, `SELECT` and `BRPOP`. Commands go out as arrays of bulk strings and
//! replies come back as one of four frame kinds.
//!
//! # Wire Format
//!
//! Every frame line ends with `\r\n`. A command with `N` arguments is written
//! as:
//!
//! ```text
//! *<N+1>\r\n
//! $<len>\r\n<command>\r\n
//! $<len>\r\n<arg>\r\n      (once per argument)
//! ```
//!
//! Lengths are byte counts, nothing is escaped. Replies start with a lead
//! byte:
//!
//! - `+` status line, `-` error line
//! - `$<len>` bulk value, `$-1` nil
//! - `*<count>` array, `*-1` nil
//!
//! Any other lead byte means the stream can no longer be trusted.
//!
//! # Key Components
//!
//! - [`Reply`]: a decoded reply frame.
//! - [`Popped`]: the meaning of a blocking pop reply (timeout or job).
//! - [`ProtocolTransport`]: a buffered duplex stream that sends commands and
//!   reads replies strictly one after the other.
//!
//! # See Also
//!
//! - [`worker`](crate::worker): the connection lifecycle built on top.
pub mod codec;
mod reply;
mod transport;

pub use codec::CodecError;
pub use reply::{Popped, Reply};
pub use transport::{ProtocolTransport, TransportError};
