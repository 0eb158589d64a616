//! ROMP Protocol Definitions
//!
//! This module defines the wire-level building blocks shared by servers and
//! clients:
//!
//! - **[`frame`]**: the 8-byte frame header and the message taxonomy
//! - **[`value`]**: the [`Value`](value::Value) domain carried in payloads,
//!   including remote-object references and exception values
//! - **[`codec`]**: the postcard-backed byte encoding of values
//! - **[`error`]**: the [`RompError`](error::RompError) taxonomy and
//!   `Result` alias
//!
//! Frame headers are packed by hand (big-endian `u16`s); only payloads go
//! through the codec.

pub mod codec;
pub mod error;
pub mod frame;
pub mod value;

pub use error::{RompError, Result};
pub use frame::{Frame, FrameHeader, MsgType};
pub use value::{RemoteError, Value};
