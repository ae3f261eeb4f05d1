//! # Message Framing
//!
//! Turns discrete messages into a byte stream and back.
//!
//! ## Wire Format
//! ```text
//! [Length(4, big-endian u32)] [Payload(Length)]
//! ```
//!
//! Transports may split a frame across several deliveries or coalesce
//! several frames into one delivery. A [`Defragmenter`] keeps the partial
//! state for one peer and yields every message that becomes complete.
//!
//! ## Security
//! - The length prefix is checked against a cap before anything is buffered
//!   for it, so a bogus prefix cannot make a peer hold gigabytes.

use crate::config::MAX_FRAME_SIZE;
use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the length prefix in bytes
pub const FRAME_HEADER_LEN: usize = 4;

/// Frame a payload into a new buffer.
///
/// # Errors
/// Returns `ProtocolError::PayloadTooLarge` if the payload length does not fit in 32 bits
pub fn fragment(payload: &[u8]) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    fragment_into(payload, &mut dst)?;
    Ok(dst.freeze())
}

/// Append one frame for `payload` to `dst`.
pub fn fragment_into(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let length =
        u32::try_from(payload.len()).map_err(|_| ProtocolError::PayloadTooLarge(payload.len()))?;

    dst.reserve(FRAME_HEADER_LEN + payload.len());
    dst.put_u32(length);
    dst.put_slice(payload);
    Ok(())
}

/// Per-peer reassembly state.
#[derive(Debug)]
pub struct Defragmenter {
    buffer: BytesMut,
    expected: Option<usize>,
    max_frame_size: usize,
}

impl Default for Defragmenter {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Defragmenter {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            expected: None,
            max_frame_size,
        }
    }

    /// Feed one raw delivery and append every completed message to `out`.
    ///
    /// A single delivery may complete zero, one or many messages. Partial
    /// state carries over to the next call.
    ///
    /// # Errors
    /// Returns `ProtocolError::FrameTooLarge` when a length prefix exceeds the
    /// configured cap. Messages completed before the offending prefix are
    /// still in `out`; the defragmenter must not be fed again afterwards.
    pub fn push(&mut self, chunk: &[u8], out: &mut Vec<Bytes>) -> Result<()> {
        self.buffer.extend_from_slice(chunk);

        loop {
            let length = match self.expected {
                Some(length) => length,
                None => {
                    if self.buffer.len() < FRAME_HEADER_LEN {
                        break;
                    }
                    let length = self.buffer.get_u32() as usize;
                    if length > self.max_frame_size {
                        self.reset();
                        return Err(ProtocolError::FrameTooLarge {
                            length,
                            limit: self.max_frame_size,
                        });
                    }
                    self.expected = Some(length);
                    length
                }
            };

            if self.buffer.len() < length {
                break;
            }

            out.push(self.buffer.split_to(length).freeze());
            self.expected = None;
        }

        Ok(())
    }

    /// Bytes held for the message in flight (prefix excluded once read)
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Length announced by the prefix of the message in flight, if read yet
    pub fn expected_len(&self) -> Option<usize> {
        self.expected
    }

    /// Drop all partial state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.expected = None;
    }
}
