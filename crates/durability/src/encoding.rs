//! Journal frame encoding and decoding
//!
//! ## Frame Format
//!
//! ```text
//! [length: u32][type: u8][payload: bytes][crc32: u32]
//! ```
//!
//! - **length**: size of type + payload + crc (NOT including length itself)
//! - **type**: frame type tag (1 = commit batch)
//! - **payload**: MessagePack-serialized `CommitBatch`
//! - **crc32**: CRC32 over \[type\]\[payload\]

use crc32fast::Hasher;
use exemplar_core::{CommitBatch, Error, Result};

/// Frame type tag for a commit batch
pub const TYPE_COMMIT_BATCH: u8 = 1;

/// Bytes of framing around a payload: length(4) + type(1) + crc(4)
pub const FRAME_OVERHEAD: usize = 9;

fn checksum(type_tag: u8, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[type_tag]);
    hasher.update(payload);
    hasher.finalize()
}

/// Encode a commit batch into one frame
///
/// # Errors
///
/// `Serialization` if the batch cannot be encoded.
pub fn encode_batch(batch: &CommitBatch) -> Result<Vec<u8>> {
    let payload = rmp_serde::to_vec(batch)?;
    let total_len = 1 + payload.len() + 4;
    let total_len_u32 = u32::try_from(total_len)
        .map_err(|_| Error::Serialization(format!("batch too large: {} bytes", total_len)))?;

    let mut buf = Vec::with_capacity(4 + total_len);
    buf.extend_from_slice(&total_len_u32.to_le_bytes());
    buf.push(TYPE_COMMIT_BATCH);
    buf.extend_from_slice(&payload);
    buf.extend_from_slice(&checksum(TYPE_COMMIT_BATCH, &payload).to_le_bytes());
    Ok(buf)
}

/// Decode one frame from the start of `buf`
///
/// Returns the batch and the number of bytes consumed. `offset` is the file
/// offset of `buf[0]`, used only in error messages.
///
/// # Errors
///
/// - `IncompleteEntry` when `buf` ends before the frame does (torn tail write)
/// - `Corruption` on invalid length, CRC mismatch, unknown type tag, or an
///   undecodable payload
pub fn decode_batch(buf: &[u8], offset: u64) -> Result<(CommitBatch, usize)> {
    if buf.len() < 4 {
        return Err(Error::IncompleteEntry {
            offset,
            have: buf.len(),
            needed: 4,
        });
    }
    let total_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

    // Minimum valid frame body: type(1) + crc(4)
    if total_len < 5 {
        return Err(Error::Corruption(format!(
            "offset {}: invalid frame length {} (minimum is 5)",
            offset, total_len
        )));
    }
    if buf.len() < 4 + total_len {
        return Err(Error::IncompleteEntry {
            offset,
            have: buf.len(),
            needed: 4 + total_len,
        });
    }

    let type_tag = buf[4];
    let payload = &buf[5..4 + total_len - 4];
    let crc_start = 4 + total_len - 4;
    let expected_crc = u32::from_le_bytes([
        buf[crc_start],
        buf[crc_start + 1],
        buf[crc_start + 2],
        buf[crc_start + 3],
    ]);
    let actual_crc = checksum(type_tag, payload);
    if actual_crc != expected_crc {
        return Err(Error::Corruption(format!(
            "offset {}: CRC mismatch: expected {:08x}, got {:08x}",
            offset, expected_crc, actual_crc
        )));
    }

    if type_tag != TYPE_COMMIT_BATCH {
        return Err(Error::Corruption(format!(
            "offset {}: unknown frame type {}",
            offset, type_tag
        )));
    }

    let batch: CommitBatch = rmp_serde::from_slice(payload).map_err(|e| {
        Error::Corruption(format!("offset {}: payload decode failed: {}", offset, e))
    })?;

    Ok((batch, 4 + total_len))
}
