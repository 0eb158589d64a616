//! Framed message I/O over one connected stream.
//!
//! A [`Session`] owns the two halves of a [`Stream`] and moves whole
//! frames across it. Reads validate the magic marker and, when framing is
//! lost, slide forward one byte at a time until the marker reappears; the
//! search gives up after a payload-length's worth of garbage. Writes emit
//! header and payload as a single buffer so a frame is one send on
//! datagram transports and one syscall on streams.
//!
//! The codec never appears here. Sessions deal in byte strings; callers
//! encode and decode payloads outside the framing layer.

use tokio::sync::Mutex;

use crate::protocol::error::{RompError, Result};
use crate::protocol::frame::{Frame, FrameHeader, MsgType, HEADER_LEN, MAGIC};
use crate::transport::stream::{Stream, StreamReader, StreamWriter};

/// Bytes of garbage tolerated while hunting for the next magic marker,
/// matching the upper bound of a payload.
const RESYNC_BUDGET: usize = u16::MAX as usize;

/// A framed, bidirectional message channel over one transport connection.
///
/// Reads and writes are internally serialized per direction, so a session
/// may be shared: a reply reader and a request writer can run
/// concurrently, and concurrent writers never interleave partial frames.
pub struct Session {
    reader: Mutex<FrameReader>,
    writer: Mutex<StreamWriter>,
}

impl Session {
    pub fn new(stream: Stream) -> Self {
        let (reader, writer) = stream.split();
        Session {
            reader: Mutex::new(FrameReader {
                stream: reader,
                header: [0u8; HEADER_LEN],
            }),
            writer: Mutex::new(writer),
        }
    }

    /// Writes one frame. Payloads are limited to `u16::MAX` bytes by the
    /// header's length field.
    pub async fn write_frame(&self, msg_type: MsgType, obj_id: u16, payload: &[u8]) -> Result<()> {
        if payload.len() > u16::MAX as usize {
            return Err(RompError::Protocol(format!(
                "payload too large: {} bytes",
                payload.len()
            )));
        }
        let header = FrameHeader {
            payload_len: payload.len() as u16,
            msg_type,
            obj_id,
        };
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(&header.encode());
        buf.extend_from_slice(payload);

        let mut writer = self.writer.lock().await;
        writer.write_all(&buf).await.map_err(map_io_error)?;
        writer.flush().await.map_err(map_io_error)?;
        Ok(())
    }

    /// Reads the next frame, resynchronizing on the magic marker if the
    /// stream position is off a frame boundary.
    pub async fn read_frame(&self) -> Result<Frame> {
        let mut reader = self.reader.lock().await;
        reader.read_frame().await
    }
}

struct FrameReader {
    stream: StreamReader,
    // Scratch header buffer, reused across reads.
    header: [u8; HEADER_LEN],
}

impl FrameReader {
    async fn read_frame(&mut self) -> Result<Frame> {
        self.stream
            .read_exact(&mut self.header)
            .await
            .map_err(map_io_error)?;

        let magic = MAGIC.to_be_bytes();
        let mut discarded = 0usize;
        while self.header[0..2] != magic {
            if discarded >= RESYNC_BUDGET {
                return Err(RompError::Protocol(
                    "no frame marker within resync budget".to_string(),
                ));
            }
            self.header.copy_within(1.., 0);
            self.stream
                .read_exact(&mut self.header[HEADER_LEN - 1..])
                .await
                .map_err(map_io_error)?;
            discarded += 1;
        }
        if discarded > 0 {
            tracing::warn!(discarded, "resynchronized on frame marker");
        }

        let header = FrameHeader::decode(&self.header)?;
        let mut payload = vec![0u8; header.payload_len as usize];
        self.stream
            .read_exact(&mut payload)
            .await
            .map_err(map_io_error)?;

        Ok(Frame {
            msg_type: header.msg_type,
            obj_id: header.obj_id,
            payload,
        })
    }
}

/// Zero-byte writes and EOFs mean the peer went away; everything else is a
/// plain I/O failure.
fn map_io_error(err: std::io::Error) -> RompError {
    match err.kind() {
        std::io::ErrorKind::UnexpectedEof
        | std::io::ErrorKind::WriteZero
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::ConnectionReset => RompError::Disconnected,
        _ => RompError::Io(err),
    }
}
