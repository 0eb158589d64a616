//! ROMP Client
//!
//! This crate provides the client side of romp: a [`Client`] that connects
//! to a server endpoint and hands out [`Proxy`] values, each a lightweight
//! stand-in for one object living in the server process.
//!
//! # Overview
//!
//! A proxy forwards method invocations over the shared session and drives
//! a small reply state machine: return values come back as values,
//! exceptions re-raise locally with the server's backtrace stitched to the
//! local call site, and block calls deliver every YIELD frame to the
//! caller's closure before the terminating reply.
//!
//! # Usage
//!
//! ```no_run
//! use romp_client::Client;
//! use romp_common::Value;
//!
//! #[tokio::main]
//! async fn main() -> romp_common::Result<()> {
//!     let client = Client::connect("tcpromp://127.0.0.1:4242").await?;
//!     let foo = client.resolve("foo").await?;
//!
//!     let answer = foo.call("foo", vec![Value::Int(42)]).await?.into_value()?;
//!     assert_eq!(answer, Value::Int(42));
//!
//!     foo.call_with("each", vec![], |item| println!("yielded {item:?}"))
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Synchronization
//!
//! Callers on one session are serialized by a session-level mutex so each
//! request sees its own replies; an unsynchronized client skips that lock
//! for a modest throughput gain and is only sound with a single caller
//! per session.

pub mod client;
pub mod proxy;

pub use client::Client;
pub use proxy::{CallReturn, Proxy};
