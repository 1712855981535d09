//! Built-in leaf codecs.
//!
//! All of them are byte-to-byte: `encode` consumes the raw little-endian bytes
//! of its (already normalised) input and returns [`Buffer::Bytes`].  Shape and
//! dtype are restored by the caller through [`Codec::decode_into`].

use std::io::{Read, Write};

use crate::buffer::{ArrayBuf, Buffer};
use crate::codec::{AnyCodec, Codec, CodecConfig, CodecError};
use crate::registry::CodecRegistry;

pub const NONE_ID:   &str = "none";
pub const ZSTD_ID:   &str = "zstd";
pub const LZ4_ID:    &str = "lz4";
pub const BROTLI_ID: &str = "brotli";
pub const LZMA_ID:   &str = "lzma";
pub const CRC32_ID:  &str = "crc32";

/// Default Zstd compression level.
pub const DEFAULT_ZSTD_LEVEL:     i32 = 3;
pub const DEFAULT_BROTLI_QUALITY: u32 = 11;
pub const DEFAULT_BROTLI_LGWIN:   u32 = 22;

const CRC32_LEN: usize = 4;

// ── none ─────────────────────────────────────────────────────────────────────

/// Payload stored verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoneCodec;

impl Codec for NoneCodec {
    fn codec_id(&self) -> &str { NONE_ID }
    fn encode(&self, buf: Buffer) -> Result<Buffer, CodecError> { Ok(Buffer::Bytes(buf.into_bytes())) }
    fn decode(&self, buf: Buffer) -> Result<Buffer, CodecError> { Ok(Buffer::Bytes(buf.into_bytes())) }
    fn decode_into(&self, buf: Buffer, out: &mut ArrayBuf) -> Result<(), CodecError> {
        out.copy_from(buf.as_bytes())
    }
    fn get_config(&self) -> CodecConfig { CodecConfig::new(NONE_ID) }
}

// ── zstd ─────────────────────────────────────────────────────────────────────

/// Zstandard, balanced speed/ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    pub fn new(level: i32) -> Result<Self, CodecError> {
        if !zstd::compression_level_range().contains(&level) {
            return Err(CodecError::InvalidConfig(format!(
                "zstd level {level} outside {:?}", zstd::compression_level_range(),
            )));
        }
        Ok(Self { level })
    }

    pub fn level(&self) -> i32 { self.level }
}

impl Default for ZstdCodec {
    fn default() -> Self { Self { level: DEFAULT_ZSTD_LEVEL } }
}

impl Codec for ZstdCodec {
    fn codec_id(&self) -> &str { ZSTD_ID }

    fn encode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        zstd::encode_all(buf.as_bytes(), self.level)
            .map(Buffer::Bytes)
            .map_err(|e| CodecError::Compression(e.to_string()))
    }

    fn decode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        zstd::decode_all(buf.as_bytes())
            .map(Buffer::Bytes)
            .map_err(|e| CodecError::Decompression(e.to_string()))
    }

    fn decode_into(&self, buf: Buffer, out: &mut ArrayBuf) -> Result<(), CodecError> {
        let expected = out.nbytes();
        let content_size = zstd::zstd_safe::get_frame_content_size(buf.as_bytes())
            .map_err(|_| CodecError::Decompression("invalid zstd frame header".to_owned()))?;
        if let Some(size) = content_size {
            if size != expected as u64 {
                return Err(CodecError::ShapeMismatch { expected, actual: size as usize });
            }
        }
        let written = zstd::bulk::decompress_to_buffer(buf.as_bytes(), out.as_bytes_mut())
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        if written != expected {
            return Err(CodecError::ShapeMismatch { expected, actual: written });
        }
        Ok(())
    }

    fn get_config(&self) -> CodecConfig {
        CodecConfig::new(ZSTD_ID).with("level", self.level)
    }
}

// ── lz4 ──────────────────────────────────────────────────────────────────────

/// LZ4 block with a 4-byte little-endian size prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn codec_id(&self) -> &str { LZ4_ID }

    fn encode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        Ok(Buffer::Bytes(lz4_flex::compress_prepend_size(buf.as_bytes())))
    }

    fn decode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        lz4_flex::decompress_size_prepended(buf.as_bytes())
            .map(Buffer::Bytes)
            .map_err(|e| CodecError::Decompression(e.to_string()))
    }

    fn decode_into(&self, buf: Buffer, out: &mut ArrayBuf) -> Result<(), CodecError> {
        let data = buf.as_bytes();
        if data.len() < 4 {
            return Err(CodecError::Decompression("lz4 payload shorter than its size prefix".into()));
        }
        let (prefix, block) = data.split_at(4);
        let size = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        let expected = out.nbytes();
        if size != expected {
            return Err(CodecError::ShapeMismatch { expected, actual: size });
        }
        if expected == 0 {
            return Ok(());
        }
        let written = lz4_flex::decompress_into(block, out.as_bytes_mut())
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        if written != expected {
            return Err(CodecError::ShapeMismatch { expected, actual: written });
        }
        Ok(())
    }

    fn get_config(&self) -> CodecConfig { CodecConfig::new(LZ4_ID) }
}

// ── brotli ───────────────────────────────────────────────────────────────────

/// Brotli, high ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrotliCodec {
    quality: u32,
    lgwin:   u32,
}

impl BrotliCodec {
    pub fn new(quality: u32, lgwin: u32) -> Result<Self, CodecError> {
        if quality > 11 {
            return Err(CodecError::InvalidConfig(format!("brotli quality {quality} outside 0..=11")));
        }
        if !(10..=24).contains(&lgwin) {
            return Err(CodecError::InvalidConfig(format!("brotli lgwin {lgwin} outside 10..=24")));
        }
        Ok(Self { quality, lgwin })
    }
}

impl Default for BrotliCodec {
    fn default() -> Self {
        Self { quality: DEFAULT_BROTLI_QUALITY, lgwin: DEFAULT_BROTLI_LGWIN }
    }
}

impl Codec for BrotliCodec {
    fn codec_id(&self) -> &str { BROTLI_ID }

    fn encode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        let mut out = Vec::new();
        {
            let mut w = brotli::CompressorWriter::new(&mut out, 4096, self.quality, self.lgwin);
            w.write_all(buf.as_bytes()).map_err(|e| CodecError::Compression(e.to_string()))?;
        }
        Ok(Buffer::Bytes(out))
    }

    fn decode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        let mut out = Vec::new();
        brotli::Decompressor::new(buf.as_bytes(), 4096)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(Buffer::Bytes(out))
    }

    fn get_config(&self) -> CodecConfig {
        CodecConfig::new(BROTLI_ID)
            .with("quality", self.quality)
            .with("lgwin", self.lgwin)
    }
}

// ── lzma ─────────────────────────────────────────────────────────────────────

/// LZMA-alone stream, highest ratio, slowest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LzmaCodec;

impl Codec for LzmaCodec {
    fn codec_id(&self) -> &str { LZMA_ID }

    fn encode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        let mut out = Vec::new();
        lzma_rs::lzma_compress(&mut std::io::Cursor::new(buf.as_bytes()), &mut out)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        Ok(Buffer::Bytes(out))
    }

    fn decode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        let mut out = Vec::new();
        lzma_rs::lzma_decompress(&mut std::io::Cursor::new(buf.as_bytes()), &mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(Buffer::Bytes(out))
    }

    fn get_config(&self) -> CodecConfig { CodecConfig::new(LZMA_ID) }
}

// ── crc32 ────────────────────────────────────────────────────────────────────

/// Prepends a little-endian CRC-32 of the payload; decode verifies and strips it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc32Codec;

impl Crc32Codec {
    fn verify(data: &[u8]) -> Result<&[u8], CodecError> {
        if data.len() < CRC32_LEN {
            return Err(CodecError::Decompression(format!(
                "crc32 payload of {} bytes is shorter than its checksum", data.len(),
            )));
        }
        let (stored, payload) = data.split_at(CRC32_LEN);
        let expected = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]);
        let actual = crc32fast::hash(payload);
        if expected != actual {
            return Err(CodecError::ChecksumMismatch { expected, actual });
        }
        Ok(payload)
    }
}

impl Codec for Crc32Codec {
    fn codec_id(&self) -> &str { CRC32_ID }

    fn encode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        let data = buf.as_bytes();
        let mut out = Vec::with_capacity(CRC32_LEN + data.len());
        out.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
        out.extend_from_slice(data);
        Ok(Buffer::Bytes(out))
    }

    fn decode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        Self::verify(buf.as_bytes()).map(|payload| Buffer::Bytes(payload.to_vec()))
    }

    fn decode_into(&self, buf: Buffer, out: &mut ArrayBuf) -> Result<(), CodecError> {
        out.copy_from(Self::verify(buf.as_bytes())?)
    }

    fn get_config(&self) -> CodecConfig { CodecConfig::new(CRC32_ID) }
}

// ── Factories ────────────────────────────────────────────────────────────────

pub(crate) fn create_none(config: &CodecConfig, _: &CodecRegistry) -> Result<AnyCodec, CodecError> {
    config.check_params(&[])?;
    Ok(AnyCodec::leaf(NoneCodec))
}

pub(crate) fn create_zstd(config: &CodecConfig, _: &CodecRegistry) -> Result<AnyCodec, CodecError> {
    config.check_params(&["level"])?;
    let level = match config.int_param("level")? {
        Some(l) => i32::try_from(l)
            .map_err(|_| CodecError::InvalidConfig(format!("zstd level {l} out of range")))?,
        None => DEFAULT_ZSTD_LEVEL,
    };
    Ok(AnyCodec::leaf(ZstdCodec::new(level)?))
}

pub(crate) fn create_lz4(config: &CodecConfig, _: &CodecRegistry) -> Result<AnyCodec, CodecError> {
    config.check_params(&[])?;
    Ok(AnyCodec::leaf(Lz4Codec))
}

pub(crate) fn create_brotli(config: &CodecConfig, _: &CodecRegistry) -> Result<AnyCodec, CodecError> {
    config.check_params(&["quality", "lgwin"])?;
    let quality = u32_param(config, "quality", DEFAULT_BROTLI_QUALITY)?;
    let lgwin = u32_param(config, "lgwin", DEFAULT_BROTLI_LGWIN)?;
    Ok(AnyCodec::leaf(BrotliCodec::new(quality, lgwin)?))
}

pub(crate) fn create_lzma(config: &CodecConfig, _: &CodecRegistry) -> Result<AnyCodec, CodecError> {
    config.check_params(&[])?;
    Ok(AnyCodec::leaf(LzmaCodec))
}

pub(crate) fn create_crc32(config: &CodecConfig, _: &CodecRegistry) -> Result<AnyCodec, CodecError> {
    config.check_params(&[])?;
    Ok(AnyCodec::leaf(Crc32Codec))
}

fn u32_param(config: &CodecConfig, key: &str, default: u32) -> Result<u32, CodecError> {
    match config.int_param(key)? {
        Some(v) => u32::try_from(v).map_err(|_| CodecError::InvalidConfig(format!(
            "codec '{}' parameter '{}' must be non-negative, got {}", config.id, key, v,
        ))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::DType;

    fn roundtrip(codec: &dyn Codec, data: &[u8]) {
        let encoded = codec.encode(Buffer::from(data)).unwrap();
        let decoded = codec.decode(encoded.clone()).unwrap();
        assert_eq!(decoded.as_bytes(), data, "{} decode", codec.codec_id());

        let mut out = ArrayBuf::zeros(DType::U8, vec![data.len()]);
        codec.decode_into(encoded, &mut out).unwrap();
        assert_eq!(out.as_bytes(), data, "{} decode_into", codec.codec_id());
    }

    #[test]
    fn all_builtins_roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog, again and again and again";
        let codecs: Vec<Box<dyn Codec>> = vec![
            Box::new(NoneCodec),
            Box::new(ZstdCodec::default()),
            Box::new(Lz4Codec),
            Box::new(BrotliCodec::default()),
            Box::new(LzmaCodec),
            Box::new(Crc32Codec),
        ];
        for codec in &codecs {
            roundtrip(codec.as_ref(), data);
            roundtrip(codec.as_ref(), b"");
        }
    }

    #[test]
    fn crc32_detects_corruption() {
        let mut encoded = Crc32Codec.encode(Buffer::from(b"abc")).unwrap().into_bytes();
        assert_eq!(encoded.len(), 7);
        encoded[5] ^= 0xff;
        assert!(matches!(
            Crc32Codec.decode(Buffer::Bytes(encoded)),
            Err(CodecError::ChecksumMismatch { .. })
        ));
        assert!(matches!(
            Crc32Codec.decode(Buffer::from(&[1u8, 2][..])),
            Err(CodecError::Decompression(_))
        ));
    }

    #[test]
    fn decode_into_rejects_wrong_output_size() {
        let encoded = Lz4Codec.encode(Buffer::from(b"abcdef")).unwrap();
        let mut out = ArrayBuf::zeros(DType::U8, vec![4]);
        assert!(matches!(
            Lz4Codec.decode_into(encoded, &mut out),
            Err(CodecError::ShapeMismatch { expected: 4, actual: 6 })
        ));

        let encoded = Crc32Codec.encode(Buffer::from(b"abcdef")).unwrap();
        let mut out = ArrayBuf::zeros(DType::U16, vec![2]);
        assert!(matches!(
            Crc32Codec.decode_into(encoded, &mut out),
            Err(CodecError::ShapeMismatch { expected: 4, actual: 6 })
        ));

        let encoded = ZstdCodec::default().encode(Buffer::from(b"abcdefgh")).unwrap();
        let mut short = ArrayBuf::zeros(DType::U8, vec![4]);
        assert!(matches!(
            ZstdCodec::default().decode_into(encoded.clone(), &mut short),
            Err(CodecError::ShapeMismatch { expected: 4, actual: 8 })
        ));
        let mut long = ArrayBuf::zeros(DType::U8, vec![12]);
        assert!(matches!(
            ZstdCodec::default().decode_into(encoded.clone(), &mut long),
            Err(CodecError::ShapeMismatch { expected: 12, actual: 8 })
        ));
        let mut exact = ArrayBuf::zeros(DType::U8, vec![8]);
        ZstdCodec::default().decode_into(encoded, &mut exact).unwrap();
        assert_eq!(exact.as_bytes(), b"abcdefgh");
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(ZstdCodec::new(1000).is_err());
        assert!(BrotliCodec::new(12, 22).is_err());
        assert!(BrotliCodec::new(5, 30).is_err());
        let registry = CodecRegistry::default();
        assert!(create_brotli(&CodecConfig::new(BROTLI_ID).with("quality", -1), &registry).is_err());
        assert!(create_lz4(&CodecConfig::new(LZ4_ID).with("level", 1), &registry).is_err());
    }

    #[test]
    fn config_reflects_parameters() {
        assert_eq!(ZstdCodec::new(9).unwrap().get_config(), CodecConfig::new("zstd").with("level", 9));
        assert_eq!(
            BrotliCodec::new(4, 20).unwrap().get_config().to_json().unwrap(),
            r#"{"id":"brotli","lgwin":20,"quality":4}"#,
        );
    }
}
