//! Message encoding and decoding with framing.
//!
//! Frame format: `[length: u32 LE][message_type: u8][payload]`, where the
//! length counts the type byte and the payload, and the payload is the
//! postcard encoding of the message's [`Element`].

use crate::protocol::{Message, PROTOCOL_MAGIC, PROTOCOL_VERSION};
use blake3::Hash;
use thiserror::Error;
use tradewind_core::{DecodeError, Element};

/// Largest frame body accepted from a peer.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Deepest element nesting a payload may carry before it is deserialized.
/// Message-level limits are tighter and checked after decoding.
pub const MAX_PAYLOAD_DEPTH: usize = 32;

/// Frame-level failure. The connection survives; the frame is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Fewer bytes than a header.
    #[error("Frame too short: {len} bytes (minimum 5)")]
    TooShort {
        /// Bytes available.
        len: usize,
    },
    /// The header announces more bytes than are present.
    #[error("Incomplete frame: expected {expected} bytes, got {actual}")]
    Incomplete {
        /// Bytes announced, including the length field.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },
    /// The frame exceeds [`MAX_FRAME_LEN`].
    #[error("Frame too large: {len} bytes (maximum {MAX_FRAME_LEN})")]
    TooLarge {
        /// Announced body length.
        len: usize,
    },
    /// The payload is not a valid element encoding.
    #[error("Malformed frame payload: {0}")]
    Payload(String),
    /// The element could not be serialized.
    #[error("Failed to encode frame: {0}")]
    Encode(String),
    /// The type byte disagrees with the payload's tag.
    #[error("Frame type {header} does not match <{tag}>")]
    TypeMismatch {
        /// Type byte from the header.
        header: u8,
        /// Tag found in the payload.
        tag: String,
    },
    /// The element does not decode to a valid message.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Compute schema hash from protocol definitions.
///
/// This hash is used to ensure peers and replay logs agree on the protocol.
pub fn compute_schema_hash() -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&PROTOCOL_VERSION.to_le_bytes());
    hasher.update(PROTOCOL_MAGIC);
    for tag in Message::TAGS {
        hasher.update(tag.as_bytes());
        hasher.update(&[0]);
    }

    let hash: Hash = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(prefix)
}

/// Type byte for a message tag, or `None` for tags outside the protocol.
pub fn message_type_tag(tag: &str) -> Option<u8> {
    Message::TAGS
        .iter()
        .position(|known| *known == tag)
        .and_then(|index| u8::try_from(index).ok())
}

/// Encode a message into a frame.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, CodecError> {
    let header = message_type_tag(msg.tag()).ok_or_else(|| {
        CodecError::Encode(format!("<{}> has no frame type", msg.tag()))
    })?;
    encode_element(header, &msg.to_element())
}

fn encode_element(header: u8, element: &Element) -> Result<Vec<u8>, CodecError> {
    let payload =
        postcard::to_allocvec(element).map_err(|err| CodecError::Encode(err.to_string()))?;
    if 1 + payload.len() > MAX_FRAME_LEN {
        return Err(CodecError::TooLarge {
            len: 1 + payload.len(),
        });
    }

    let mut frame = Vec::with_capacity(4 + 1 + payload.len());
    let length = (1 + payload.len()) as u32;
    frame.extend_from_slice(&length.to_le_bytes());
    frame.push(header);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Split a frame into its type byte and element, without interpreting the
/// element. Trailing bytes after the announced length are ignored.
pub fn decode_element(data: &[u8]) -> Result<(u8, Element), CodecError> {
    if data.len() < 5 {
        return Err(CodecError::TooShort { len: data.len() });
    }

    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if length > MAX_FRAME_LEN {
        return Err(CodecError::TooLarge { len: length });
    }
    if length == 0 {
        return Err(CodecError::TooShort { len: 4 });
    }
    if data.len() < 4 + length {
        return Err(CodecError::Incomplete {
            expected: 4 + length,
            actual: data.len(),
        });
    }

    let header = data[4];
    let payload = &data[5..4 + length];
    check_nesting(payload)?;
    let element: Element =
        postcard::from_bytes(payload).map_err(|err| CodecError::Payload(err.to_string()))?;
    Ok((header, element))
}

/// Walk the postcard layout of an element tree without recursing and reject
/// nesting past [`MAX_PAYLOAD_DEPTH`]. Truncated input is left for postcard
/// to report.
fn check_nesting(payload: &[u8]) -> Result<(), CodecError> {
    let mut cursor = PayloadCursor { payload, pos: 0 };
    // Elements still to visit at each open level.
    let mut pending: Vec<u64> = vec![1];
    while let Some(remaining) = pending.last_mut() {
        if *remaining == 0 {
            pending.pop();
            continue;
        }
        *remaining -= 1;

        let Some(children) = cursor.skip_element_head() else {
            return Ok(());
        };
        if children > 0 {
            if pending.len() >= MAX_PAYLOAD_DEPTH {
                return Err(CodecError::Payload(format!(
                    "elements nested deeper than {MAX_PAYLOAD_DEPTH}"
                )));
            }
            pending.push(children);
        }
    }
    Ok(())
}

struct PayloadCursor<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl PayloadCursor<'_> {
    /// Skip tag and attributes, returning the child count.
    fn skip_element_head(&mut self) -> Option<u64> {
        self.skip_str()?;
        let attributes = self.varint()?;
        for _ in 0..attributes {
            self.skip_str()?;
            self.skip_str()?;
        }
        self.varint()
    }

    fn skip_str(&mut self) -> Option<()> {
        let len = usize::try_from(self.varint()?).ok()?;
        let end = self.pos.checked_add(len)?;
        if end > self.payload.len() {
            return None;
        }
        self.pos = end;
        Some(())
    }

    /// Unsigned LEB128, as postcard writes lengths.
    fn varint(&mut self) -> Option<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self.payload.get(self.pos)?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Some(value);
            }
        }
        None
    }
}

/// Decode a frame into a verified message.
pub fn decode_message(data: &[u8]) -> Result<Message, CodecError> {
    let (header, element) = decode_element(data)?;
    if message_type_tag(element.tag()) != Some(header) {
        return Err(CodecError::TypeMismatch {
            header,
            tag: element.tag().to_string(),
        });
    }
    Ok(Message::decode(&element)?)
}
