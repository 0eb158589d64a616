//! ROMP Transport Layer
//!
//! This module turns an [`Endpoint`](crate::Endpoint) into live byte
//! streams and wraps them in framed sessions:
//!
//! - **[`stream`]**: [`listen`] / [`connect`] / [`Acceptor::accept`] over
//!   TCP, Unix domain and datagram sockets. Accepted TCP peers get Nagle
//!   coalescing disabled; romp trades in small latency-sensitive frames.
//! - **[`session`]**: the framed [`Session`](session::Session) that reads
//!   and writes whole messages, resynchronizing on the magic marker when
//!   a reader loses its place.
//!
//! The datagram family is best-effort only: one socket backs the lone
//! peer, there is no per-peer framing, and delivery is whatever UDP gives
//! you.

pub mod session;
pub mod stream;

pub use session::Session;
pub use stream::{connect, listen, Acceptor, Peer, Stream};

#[cfg(test)]
mod tests;
