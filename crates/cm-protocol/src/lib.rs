//! Wire protocol: tagged messages behind a length-prefixed frame codec.
//!
//! A frame is `[u32 big-endian payload length][UTF-8 JSON payload]`. The
//! payload is the internally-tagged serialization of a [`Message`]. The
//! codec itself is pure; [`wire`] adds the async read/write helpers both
//! endpoints share.

pub mod wire;

pub use wire::{WireError, read_message, write_message};

use cm_script::Directive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Frames larger than this are rejected as a protocol error at decode time.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Width of the big-endian length prefix.
pub const LEN_PREFIX: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// One action block, shipped with the typing cadence it should use.
    Execute {
        actions: Vec<Directive>,
        typing_speed: u64,
        typing_variance: u64,
    },
    /// The executor's verdict on the last `Execute`.
    Ack {
        status: AckStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Ping,
    Pong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckStatus {
    Ok,
    Error,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame length {len} exceeds the {max} byte maximum")]
    FrameTooLarge { len: usize, max: usize },
    #[error("malformed frame payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Result of one decode attempt over a caller-owned buffer.
#[derive(Debug)]
pub enum Decoded {
    /// A complete message; the caller must shift `consumed` bytes out.
    Frame { message: Message, consumed: usize },
    /// The buffer does not yet hold a complete frame.
    NeedMore,
}

pub fn encode(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }
    let mut frame = Vec::with_capacity(LEN_PREFIX + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

pub fn decode(buf: &[u8]) -> Result<Decoded, ProtocolError> {
    if buf.len() < LEN_PREFIX {
        return Ok(Decoded::NeedMore);
    }
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    if buf.len() < LEN_PREFIX + len {
        return Ok(Decoded::NeedMore);
    }
    let message = serde_json::from_slice(&buf[LEN_PREFIX..LEN_PREFIX + len])?;
    Ok(Decoded::Frame {
        message,
        consumed: LEN_PREFIX + len,
    })
}

/// Accumulates partial socket reads and drains complete frames, owning the
/// buffer-shift discipline so callers never index into raw bytes.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pops the next complete message, shifting its bytes out of the buffer.
    pub fn try_next(&mut self) -> Result<Option<Message>, ProtocolError> {
        match decode(&self.buf)? {
            Decoded::Frame { message, consumed } => {
                self.buf.drain(..consumed);
                Ok(Some(message))
            }
            Decoded::NeedMore => Ok(None),
        }
    }

    /// True when no partial frame is pending.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_script::SlideAction;

    fn sample_messages() -> Vec<Message> {
        vec![
            Message::Ping,
            Message::Pong,
            Message::Ack {
                status: AckStatus::Ok,
                message: None,
            },
            Message::Ack {
                status: AckStatus::Error,
                message: Some("no application named \"Keynote\"".into()),
            },
            Message::Execute {
                actions: vec![
                    Directive::Focus {
                        app: "Terminal".into(),
                    },
                    Directive::Type { text: "ls".into() },
                    Directive::Run,
                    Directive::Slide {
                        action: SlideAction::GoTo { slide: 4 },
                    },
                    Directive::Key {
                        combo: "cmd+shift+s".into(),
                    },
                    Directive::Wait { seconds: 2 },
                    Directive::Exec {
                        command: "open /tmp".into(),
                    },
                    Directive::Clear,
                ],
                typing_speed: 40,
                typing_variance: 15,
            },
        ]
    }

    #[test]
    fn every_message_round_trips() {
        for message in sample_messages() {
            let bytes = encode(&message).unwrap();
            match decode(&bytes).unwrap() {
                Decoded::Frame {
                    message: decoded,
                    consumed,
                } => {
                    assert_eq!(decoded, message);
                    assert_eq!(consumed, bytes.len());
                }
                Decoded::NeedMore => panic!("complete frame reported as partial"),
            }
        }
    }

    #[test]
    fn payload_carries_type_discriminator_and_wire_field_names() {
        let bytes = encode(&Message::Execute {
            actions: vec![Directive::Run],
            typing_speed: 80,
            typing_variance: 0,
        })
        .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes[LEN_PREFIX..]).unwrap();
        assert_eq!(json["type"], "Execute");
        assert_eq!(json["typing_speed"], 80);
        assert_eq!(json["typing_variance"], 0);
        assert_eq!(json["actions"][0]["type"], "Run");

        let bytes = encode(&Message::Ack {
            status: AckStatus::Ok,
            message: None,
        })
        .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes[LEN_PREFIX..]).unwrap();
        assert_eq!(json["status"], "Ok");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn short_buffers_ask_for_more() {
        let bytes = encode(&Message::Ping).unwrap();
        for cut in 0..bytes.len() {
            assert!(
                matches!(decode(&bytes[..cut]).unwrap(), Decoded::NeedMore),
                "prefix of {cut} bytes should be incomplete"
            );
        }
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let mut bytes = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(b"ignored");
        assert!(matches!(
            decode(&bytes),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn garbage_payload_is_a_protocol_error() {
        let mut bytes = 4u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"}{!ized");
        assert!(matches!(
            decode(&bytes),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn frame_buffer_drains_back_to_back_frames() {
        let mut frames = FrameBuffer::new();
        let first = encode(&Message::Ping).unwrap();
        let second = encode(&Message::Pong).unwrap();
        let mut joined = first.clone();
        joined.extend_from_slice(&second);
        frames.extend(&joined);
        assert_eq!(frames.try_next().unwrap(), Some(Message::Ping));
        assert_eq!(frames.try_next().unwrap(), Some(Message::Pong));
        assert_eq!(frames.try_next().unwrap(), None);
        assert!(frames.is_empty());
    }

    proptest::proptest! {
        /// Splitting an encoded frame at any interior byte yields NeedMore
        /// first and the original message after the second chunk arrives.
        #[test]
        fn split_reads_reassemble(index in 0usize..sample_messages().len(), split in 1usize..64) {
            let message = sample_messages().swap_remove(index);
            let bytes = encode(&message).unwrap();
            let split = split.min(bytes.len() - 1);

            let mut frames = FrameBuffer::new();
            frames.extend(&bytes[..split]);
            proptest::prop_assert!(frames.try_next().unwrap().is_none());
            frames.extend(&bytes[split..]);
            proptest::prop_assert_eq!(frames.try_next().unwrap(), Some(message));
            proptest::prop_assert!(frames.is_empty());
        }
    }
}
