//! Two-stage outbound encoding: payload pack, then transport framing.

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to pack payload: {0}")]
    Pack(#[from] serde_json::Error),
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
}

/// Payload codec supplied by the runtime.
///
/// `pack` turns an application value into bytes; `frame_encode` wraps those
/// bytes for the wire. [`Codec::encode`] composes the two in that order.
pub trait Codec: Send + Sync + 'static {
    fn pack(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    fn frame_encode(&self, packed: Vec<u8>) -> Result<Bytes, CodecError>;

    fn encode(&self, value: &Value) -> Result<Bytes, CodecError> {
        let packed = self.pack(value)?;
        self.frame_encode(packed)
    }
}

/// Compact JSON, one frame per line.
#[derive(Debug, Clone)]
pub struct JsonLineCodec {
    max_frame_len: usize,
}

impl JsonLineCodec {
    pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for JsonLineCodec {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_FRAME_LEN)
    }
}

impl Codec for JsonLineCodec {
    fn pack(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn frame_encode(&self, packed: Vec<u8>) -> Result<Bytes, CodecError> {
        // Compact serde_json output never contains a raw newline.
        let len = packed.len() + 1;
        if len > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        let mut frame = BytesMut::with_capacity(len);
        frame.put_slice(&packed);
        frame.put_u8(b'\n');
        Ok(frame.freeze())
    }
}
