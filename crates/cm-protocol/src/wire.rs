//! Async framing helpers shared by both endpoints: read whole messages out
//! of a stream through a [`FrameBuffer`], write encoded frames in one call.

use crate::{FrameBuffer, Message, ProtocolError, encode};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum WireError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("connection closed mid-frame")]
    TruncatedFrame,
}

/// Reads until one complete message is available. Returns `None` on a clean
/// EOF at a frame boundary; EOF inside a frame is [`WireError::TruncatedFrame`].
pub async fn read_message<R>(
    reader: &mut R,
    frames: &mut FrameBuffer,
) -> Result<Option<Message>, WireError>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(message) = frames.try_next()? {
            trace!(target: "protocol.codec", kind = message_kind(&message), "frame_read");
            return Ok(Some(message));
        }
        let mut chunk = [0u8; READ_CHUNK];
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            if frames.is_empty() {
                return Ok(None);
            }
            return Err(WireError::TruncatedFrame);
        }
        frames.extend(&chunk[..read]);
    }
}

pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    trace!(target: "protocol.codec", kind = message_kind(message), bytes = frame.len(), "frame_written");
    Ok(())
}

fn message_kind(message: &Message) -> &'static str {
    match message {
        Message::Execute { .. } => "execute",
        Message::Ack { .. } => "ack",
        Message::Ping => "ping",
        Message::Pong => "pong",
    }
}
