//! zlib adapter: whole-buffer deflate/inflate for loose objects, plus a
//! streaming inflate that reports exactly how many input bytes it consumed
//! — the packed stream gives no other way to find a zlib stream's end.

use miniz_oxide::deflate::compress_to_vec_zlib;
use miniz_oxide::inflate::core::{decompress, inflate_flags, DecompressorOxide};
use miniz_oxide::inflate::{decompress_to_vec_zlib, TINFLStatus};

use crate::error::{Error, Result};

const DEFAULT_LEVEL: u8 = 6;

/// Compresses a whole buffer with a zlib wrapper at the default level.
pub fn deflate(data: &[u8]) -> Vec<u8> {
    compress_to_vec_zlib(data, DEFAULT_LEVEL)
}

/// Decompresses a complete zlib stream.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    decompress_to_vec_zlib(data).map_err(|e| Error::Inflate(format!("{:?}", e)))
}

/// Decompresses one zlib stream of `expected_size` bytes starting at the
/// front of `data`, without assuming the stream's compressed length is
/// known in advance. Returns the decompressed bytes and the number of
/// input bytes consumed, so the caller can advance past exactly this
/// object and start reading the next one.
pub fn inflate_stream(data: &[u8], expected_size: usize) -> Result<(Vec<u8>, usize)> {
    let mut out = vec![0u8; expected_size];

    let flags = inflate_flags::TINFL_FLAG_USING_NON_WRAPPING_OUTPUT_BUF
        | inflate_flags::TINFL_FLAG_PARSE_ZLIB_HEADER
        | inflate_flags::TINFL_FLAG_COMPUTE_ADLER32;

    let mut decompressor = DecompressorOxide::new();
    let (status, consumed, written) = decompress(&mut decompressor, data, &mut out, 0, flags);

    match status {
        TINFLStatus::Done if written == expected_size => Ok((out, consumed)),
        TINFLStatus::Done => Err(Error::Inflate(format!(
            "decompressed {} bytes, expected {}",
            written, expected_size
        ))),
        other => Err(Error::Inflate(format!("{:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deflate_inflate_round_trip() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let compressed = deflate(data);
        let decompressed = inflate(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn inflate_stream_reports_consumed_bytes() {
        let data = b"some payload bytes to compress for the test";
        let compressed = deflate(data);

        let mut padded = compressed.clone();
        padded.extend_from_slice(b"TRAILING_GARBAGE_NOT_PART_OF_STREAM");

        let (decompressed, consumed) = inflate_stream(&padded, data.len()).unwrap();
        assert_eq!(decompressed, data);
        assert_eq!(consumed, compressed.len());
    }
}
