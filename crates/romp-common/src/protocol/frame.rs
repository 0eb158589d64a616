//! Frame header and message taxonomy.
//!
//! Every message on a session is one frame: an 8-byte header followed by
//! `payload_len` bytes of codec-encoded payload. All header fields are
//! big-endian `u16`s:
//!
//! ```text
//! [magic 0x4242] [payload_len] [msg_type] [obj_id]
//! ```
//!
//! The `obj_id` field names the target object for requests; for replies it
//! is zero, except SYNC where it distinguishes request (0) from response
//! (1).

use crate::protocol::error::{RompError, Result};

/// Constant marker preceding every frame.
pub const MAGIC: u16 = 0x4242;

/// Size of the packed frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Well-known object id of the server's name resolver.
pub const RESOLVER_ID: u16 = 0;

/// Wire message types.
///
/// Request types flow client to server, reply types server to client; SYNC
/// and NULL_MSG may flow either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MsgType {
    /// Method call expecting exactly one terminating reply.
    Request = 0x1001,
    /// Method call whose yields are streamed back as YIELD frames.
    RequestBlock = 0x1002,
    /// Method call with no reply at all.
    Oneway = 0x1003,
    /// Like `Oneway`, but the server acknowledges with NULL_MSG before
    /// running the call.
    OnewaySync = 0x1004,
    /// Terminating reply carrying a return value.
    Retval = 0x2001,
    /// Terminating reply carrying an exception value.
    Exception = 0x2002,
    /// One block argument produced mid-call.
    Yield = 0x2003,
    /// Synchronization no-op; obj_id 0 is the request, 1 the response.
    Sync = 0x4001,
    /// Empty acknowledgement frame.
    NullMsg = 0x4002,
}

impl MsgType {
    pub fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            0x1001 => Some(MsgType::Request),
            0x1002 => Some(MsgType::RequestBlock),
            0x1003 => Some(MsgType::Oneway),
            0x1004 => Some(MsgType::OnewaySync),
            0x2001 => Some(MsgType::Retval),
            0x2002 => Some(MsgType::Exception),
            0x2003 => Some(MsgType::Yield),
            0x4001 => Some(MsgType::Sync),
            0x4002 => Some(MsgType::NullMsg),
            _ => None,
        }
    }
}

/// Parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_len: u16,
    pub msg_type: MsgType,
    pub obj_id: u16,
}

impl FrameHeader {
    /// Packs the header, magic included, into its 8-byte wire form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..2].copy_from_slice(&MAGIC.to_be_bytes());
        buf[2..4].copy_from_slice(&self.payload_len.to_be_bytes());
        buf[4..6].copy_from_slice(&(self.msg_type as u16).to_be_bytes());
        buf[6..8].copy_from_slice(&self.obj_id.to_be_bytes());
        buf
    }

    /// Parses an 8-byte header. The caller is responsible for having
    /// resynchronized on the magic first; a wrong marker here is an error,
    /// not a resync condition.
    pub fn decode(buf: &[u8; HEADER_LEN]) -> Result<Self> {
        let magic = u16::from_be_bytes([buf[0], buf[1]]);
        if magic != MAGIC {
            return Err(RompError::Protocol(format!(
                "bad frame magic: 0x{magic:04x}"
            )));
        }
        let payload_len = u16::from_be_bytes([buf[2], buf[3]]);
        let raw_type = u16::from_be_bytes([buf[4], buf[5]]);
        let obj_id = u16::from_be_bytes([buf[6], buf[7]]);
        let msg_type = MsgType::from_u16(raw_type).ok_or_else(|| {
            RompError::Protocol(format!("unknown message type: 0x{raw_type:04x}"))
        })?;
        Ok(FrameHeader {
            payload_len,
            msg_type,
            obj_id,
        })
    }
}

/// One complete message read off a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: MsgType,
    pub obj_id: u16,
    pub payload: Vec<u8>,
}
