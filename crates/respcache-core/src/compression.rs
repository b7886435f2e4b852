//! Compression for serialized entries
//!
//! The disk and network backends compress entry payloads with zstd when
//! their `enable_compression` flag is set. Payloads below a size threshold
//! are stored raw; the zstd magic prefix distinguishes the two on read, so
//! a store written with compression on stays readable with it off.

use crate::error::{CacheError, Result};

/// zstd compression level (1-22)
pub const COMPRESSION_LEVEL: i32 = 3;

/// Payloads smaller than this are not worth compressing
pub const MIN_COMPRESS_SIZE: usize = 256;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Whether a payload carries a zstd frame
pub fn is_compressed(data: &[u8]) -> bool {
    data.len() >= ZSTD_MAGIC.len() && data[..ZSTD_MAGIC.len()] == ZSTD_MAGIC
}

/// Compress a payload, passing small ones through unchanged
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < MIN_COMPRESS_SIZE {
        return Ok(data.to_vec());
    }
    zstd::encode_all(data, COMPRESSION_LEVEL).map_err(|e| CacheError::Compression(e.to_string()))
}

/// Undo [`compress`]; raw payloads pass through unchanged
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if !is_compressed(data) {
        return Ok(data.to_vec());
    }
    zstd::decode_all(data).map_err(|e| CacheError::Decompression(e.to_string()))
}
