//! Optional compression of serialized envelopes.
//!
//! Decompression never produces more than a caller-given limit, whatever the
//! input claims. Synchronizers pass their connector's frame cap; the free
//! [`decompress`] uses the default [`MAX_FRAME_SIZE`].

use crate::config::MAX_FRAME_SIZE;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Byte-level transform applied after serialization and undone before
/// deserialization. Both ends of a connection must agree on it.
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
    /// Output longer than `limit` bytes is a `DecompressionFailure`
    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    #[default]
    None,
    /// Block format with the decoded length in the first four bytes
    Lz4,
    Zstd,
}

const ZSTD_LEVEL: i32 = 1;

pub fn compress(data: &[u8], kind: &CompressionKind) -> Result<Vec<u8>> {
    match kind {
        CompressionKind::None => Ok(data.to_vec()),
        CompressionKind::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        CompressionKind::Zstd => zstd::stream::encode_all(data, ZSTD_LEVEL)
            .map_err(|_| ProtocolError::CompressionFailure),
    }
}

/// [`decompress_bounded`] with the default frame cap
pub fn decompress(data: &[u8], kind: &CompressionKind) -> Result<Vec<u8>> {
    decompress_bounded(data, kind, MAX_FRAME_SIZE)
}

/// # Errors
/// `ProtocolError::DecompressionFailure` for corrupt input and for output
/// longer than `limit`
pub fn decompress_bounded(data: &[u8], kind: &CompressionKind, limit: usize) -> Result<Vec<u8>> {
    match kind {
        CompressionKind::None if data.len() > limit => Err(ProtocolError::DecompressionFailure),
        CompressionKind::None => Ok(data.to_vec()),
        CompressionKind::Lz4 => unpack_lz4(data, limit),
        CompressionKind::Zstd => unpack_zstd(data, limit),
    }
}

fn unpack_lz4(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let header: [u8; 4] = data
        .get(..4)
        .and_then(|h| h.try_into().ok())
        .ok_or(ProtocolError::DecompressionFailure)?;
    // lz4_flex allocates the announced size up front
    if u32::from_le_bytes(header) as usize > limit {
        return Err(ProtocolError::DecompressionFailure);
    }
    lz4_flex::decompress_size_prepended(data).map_err(|_| ProtocolError::DecompressionFailure)
}

fn unpack_zstd(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let decoder =
        zstd::stream::Decoder::new(data).map_err(|_| ProtocolError::DecompressionFailure)?;
    let mut out = Vec::new();
    // One byte past the limit is enough to tell an oversized stream apart
    decoder
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|_| ProtocolError::DecompressionFailure)?;
    if out.len() > limit {
        return Err(ProtocolError::DecompressionFailure);
    }
    Ok(out)
}

impl Compressor for CompressionKind {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        compress(data, self)
    }

    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>> {
        decompress_bounded(data, self, limit)
    }
}
