//! ROMP Common Types and Transport
//!
//! This crate provides the wire protocol and transport layer for romp, a
//! small distributed-object RPC system. A client holds lightweight proxies
//! to objects living in a remote server process and invokes methods on them
//! as if they were local; this crate contains everything both sides share:
//!
//! - **Protocol Layer**: frame header, message taxonomy, the value codec,
//!   and error types
//! - **Endpoint Layer**: `tcpromp://`, `udpromp://` and `unixromp://` URI
//!   parsing
//! - **Transport Layer**: listeners, connectors and the framed [`Session`]
//!   that carries messages over a connected stream
//!
//! # Wire Format
//!
//! Every message starts with an 8-byte header of four big-endian `u16`
//! fields (magic `0x4242`, payload length, message type, object id),
//! followed by the postcard-encoded payload value. Readers that lose
//! framing discard bytes one at a time until the magic reappears.
//!
//! # Example
//!
//! ```no_run
//! use romp_common::{Endpoint, MsgType, Session, Value};
//! use romp_common::protocol::codec;
//! use romp_common::transport::connect;
//!
//! #[tokio::main]
//! async fn main() -> romp_common::Result<()> {
//!     let endpoint: Endpoint = "tcpromp://127.0.0.1:4242".parse()?;
//!     let session = Session::new(connect(&endpoint).await?);
//!
//!     let payload = codec::encode(&Value::Nil)?;
//!     session.write_frame(MsgType::Sync, 0, &payload).await?;
//!     let reply = session.read_frame().await?;
//!     assert_eq!(reply.msg_type, MsgType::Sync);
//!     Ok(())
//! }
//! ```

pub mod endpoint;
pub mod protocol;
pub mod transport;

pub use endpoint::Endpoint;
pub use protocol::error::{RompError, Result};
pub use protocol::frame::{Frame, FrameHeader, MsgType, HEADER_LEN, MAGIC, RESOLVER_ID};
pub use protocol::value::{RemoteError, Value};
pub use transport::session::Session;
