//! Byte-stream compression transforms: gzip, brotli, zip, per spec.md §4.6.
//!
//! Compression is skipped below `compression.fileSize` uncompressed bytes
//! (spec.md §9 DESIGN NOTE: treat the threshold as a minimum byte count).

use std::io::Write;

use crate::config::{CompressionConfig, CompressionFormat};
use crate::error::Result;

/// Compress `bytes` per `config`, or return them unchanged if compression is
/// disabled or `bytes` is below the configured threshold.
pub fn maybe_compress(bytes: &[u8], config: &CompressionConfig) -> Result<Vec<u8>> {
    if !config.enabled || (bytes.len() as u64) < config.file_size {
        return Ok(bytes.to_vec());
    }
    compress(bytes, config.format, config.level)
}

pub fn compress(bytes: &[u8], format: CompressionFormat, level: u8) -> Result<Vec<u8>> {
    match format {
        CompressionFormat::Gzip => compress_gzip(bytes, level),
        CompressionFormat::Brotli => compress_brotli(bytes, level),
        CompressionFormat::Zip => compress_zip(bytes, level),
    }
}

fn compress_gzip(bytes: &[u8], level: u8) -> Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level as u32));
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

fn compress_brotli(bytes: &[u8], level: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let params = brotli::enc::BrotliEncoderParams {
        quality: level as i32,
        ..Default::default()
    };
    brotli::BrotliCompress(&mut std::io::Cursor::new(bytes), &mut out, &params)
        .map_err(|e| crate::error::EngineError::internal(format!("brotli compression failed: {e}")))?;
    Ok(out)
}

fn compress_zip(bytes: &[u8], level: u8) -> Result<Vec<u8>> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .compression_level(Some(level as i64));
        writer
            .start_file("artifact", options)
            .map_err(|e| crate::error::EngineError::internal(format!("zip write failed: {e}")))?;
        writer.write_all(bytes)?;
        writer
            .finish()
            .map_err(|e| crate::error::EngineError::internal(format!("zip finish failed: {e}")))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(enabled: bool, file_size: u64, format: CompressionFormat) -> CompressionConfig {
        CompressionConfig {
            enabled,
            format,
            level: 6,
            file_size,
        }
    }

    #[test]
    fn disabled_passes_through_unchanged() {
        let data = b"hello world".to_vec();
        let out = maybe_compress(&data, &cfg(false, 0, CompressionFormat::Gzip)).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn below_threshold_passes_through_unchanged() {
        let data = b"tiny".to_vec();
        let out = maybe_compress(&data, &cfg(true, 1_000_000, CompressionFormat::Gzip)).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn gzip_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(10);
        let compressed = compress(&data, CompressionFormat::Gzip, 6).unwrap();
        assert_ne!(compressed, data);
        let mut decoder = flate2::read::GzDecoder::new(&compressed[..]);
        let mut out = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn brotli_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(10);
        let compressed = compress(&data, CompressionFormat::Brotli, 5).unwrap();
        let mut out = Vec::new();
        brotli::BrotliDecompress(&mut std::io::Cursor::new(&compressed), &mut out)
            .expect("brotli decompress");
        assert_eq!(out, data);
    }
}
