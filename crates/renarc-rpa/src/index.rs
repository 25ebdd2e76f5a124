//! Loading and inflating the compressed index block.

use std::io::{Read, Seek, SeekFrom};

use flate2::read::{DeflateDecoder, ZlibDecoder};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Default cap on both the compressed and the decompressed index size.
pub const MAX_INDEX_SIZE: u64 = 50 * 1024 * 1024;

/// Read the index block `[offset, archive_size)` and inflate it.
///
/// Output beyond `limit` is dropped; callers decode whatever prefix fits.
pub(crate) fn load_index<R: Read + Seek>(
    reader: &mut R,
    archive_size: u64,
    offset: i64,
    limit: u64,
) -> Result<Vec<u8>> {
    let invalid_offset = || Error::InvalidIndexOffset {
        offset,
        archive_size,
    };
    let start = u64::try_from(offset).map_err(|_| invalid_offset())?;
    if start >= archive_size {
        return Err(invalid_offset());
    }

    let size = archive_size - start;
    if size > limit {
        return Err(Error::IndexTooLarge { size, limit });
    }

    reader.seek(SeekFrom::Start(start))?;
    inflate_bounded(reader.by_ref().take(size), size, limit)
}

/// Inflate `size` compressed bytes from `compressed` as zlib, or as raw
/// deflate when no zlib header is present.
pub(crate) fn inflate_bounded<R: Read>(mut compressed: R, size: u64, limit: u64) -> Result<Vec<u8>> {
    let mut head = Vec::with_capacity(2);
    compressed.by_ref().take(2).read_to_end(&mut head)?;
    let zlib = is_zlib_header(&head);
    let stream = head.as_slice().chain(compressed);

    let capacity = size.saturating_mul(4).min(limit) as usize;
    let data = if zlib {
        read_bounded(ZlibDecoder::new(stream), limit, capacity)?
    } else {
        debug!("index has no zlib header, trying raw deflate");
        read_bounded(DeflateDecoder::new(stream), limit, capacity)?
    };

    debug!(compressed = size, decompressed = data.len(), "index inflated");
    Ok(data)
}

fn read_bounded<R: Read>(decoder: R, limit: u64, capacity: usize) -> Result<Vec<u8>> {
    let mut limited = decoder.take(limit);
    let mut output = Vec::with_capacity(capacity);
    limited
        .read_to_end(&mut output)
        .map_err(|e| Error::Decompression(e.to_string()))?;

    if output.len() as u64 == limit {
        let mut probe = [0u8; 1];
        if matches!(limited.into_inner().read(&mut probe), Ok(n) if n > 0) {
            warn!(limit, "decompressed index exceeds limit, decoding truncated prefix");
        }
    }

    Ok(output)
}

/// RFC 1950 header check: deflate method, window <= 32K, FCHECK valid.
fn is_zlib_header(data: &[u8]) -> bool {
    match data {
        [cmf, flg, ..] => {
            cmf & 0x0F == 8 && cmf >> 4 <= 7 && ((u16::from(*cmf) << 8) | u16::from(*flg)) % 31 == 0
        }
        _ => false,
    }
}
