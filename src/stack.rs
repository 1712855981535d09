//! [`CodecStack`]: an ordered composition of codecs that is itself a codec.
//!
//! On encoding the members are applied left to right:
//!
//! ```text
//! CodecStack(a, b, c).encode(buf) == c.encode(b.encode(a.encode(buf)))
//! ```
//!
//! and on decoding right to left:
//!
//! ```text
//! CodecStack(a, b, c).decode(buf) == a.decode(b.decode(c.decode(buf)))
//! ```
//!
//! Every intermediate value is normalised to canonical array form before the
//! next member sees it.  The final encoded value is returned exactly as the
//! last member produced it.
//!
//! [`CodecStack::encode_decode`] computes `decode(encode(buf))` but records the
//! shape and dtype seen before each encode stage, so every decode stage writes
//! straight into a preallocated buffer of the right silhouette and the result
//! comes back with the input's shape, dtype and concrete buffer type.
//!
//! # Empty stacks
//! A stack with no members is the identity codec.  `encode` and `decode`
//! return their input untouched; `decode_into` copies it into `out`.

use serde_json::Value;
use std::fmt;
use std::ops::{Add, Mul};
use tracing::{debug, trace};

use crate::buffer::{ArrayBuf, Buffer, DType};
use crate::codec::{AnyCodec, Codec, CodecConfig, CodecError};
use crate::registry::CodecRegistry;

/// Registry id of the stack combinator.
pub const STACK_ID: &str = "combinators.stack";

// ── StackItem ────────────────────────────────────────────────────────────────

/// Construction input: a ready codec or a description to resolve.
#[derive(Debug, Clone)]
pub enum StackItem {
    Codec(AnyCodec),
    Config(CodecConfig),
}

impl From<AnyCodec> for StackItem {
    fn from(codec: AnyCodec) -> Self { StackItem::Codec(codec) }
}

impl From<CodecStack> for StackItem {
    fn from(stack: CodecStack) -> Self { StackItem::Codec(AnyCodec::Stack(stack)) }
}

impl From<CodecConfig> for StackItem {
    fn from(config: CodecConfig) -> Self { StackItem::Config(config) }
}

// ── Silhouette ───────────────────────────────────────────────────────────────

/// Shape and dtype of the value entering one encode stage.
#[derive(Debug)]
struct Silhouette {
    shape: Vec<usize>,
    dtype: DType,
}

impl Silhouette {
    fn of(array: &ArrayBuf) -> Self {
        Self { shape: array.shape().to_vec(), dtype: array.dtype() }
    }

    fn allocate(self) -> ArrayBuf {
        ArrayBuf::zeros(self.dtype, self.shape)
    }
}

// ── CodecStack ───────────────────────────────────────────────────────────────

/// Immutable, ordered sequence of codecs.
///
/// Equality is structural and order-sensitive: two stacks are equal iff they
/// have the same length and pairwise-equal members.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodecStack {
    codecs: Vec<AnyCodec>,
}

impl CodecStack {
    pub fn new(codecs: Vec<AnyCodec>) -> Self {
        Self { codecs }
    }

    /// Build a stack, resolving every description through `registry` now.
    ///
    /// Fails on the first description the registry cannot resolve; nothing is
    /// deferred to encode time.
    pub fn resolve<I>(items: I, registry: &CodecRegistry) -> Result<Self, CodecError>
    where
        I: IntoIterator,
        I::Item: Into<StackItem>,
    {
        let codecs = items
            .into_iter()
            .map(|item| match item.into() {
                StackItem::Codec(codec)   => Ok(codec),
                StackItem::Config(config) => registry.get_codec(&config),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { codecs })
    }

    /// Rebuild a stack from `{ "id": "combinators.stack", "codecs": [...] }`.
    pub fn from_config(config: &CodecConfig, registry: &CodecRegistry) -> Result<Self, CodecError> {
        config.check_params(&["codecs"])?;
        let members = match config.get("codecs") {
            Some(Value::Array(members)) => members,
            Some(other) => {
                return Err(CodecError::InvalidConfig(format!(
                    "stack 'codecs' must be a list, got {other}",
                )))
            }
            None => {
                return Err(CodecError::InvalidConfig(
                    "stack configuration has no 'codecs' list".to_owned(),
                ))
            }
        };
        let items = members
            .iter()
            .cloned()
            .map(CodecConfig::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        Self::resolve(items, registry)
    }

    #[inline] pub fn len(&self) -> usize { self.codecs.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.codecs.is_empty() }
    #[inline] pub fn codecs(&self) -> &[AnyCodec] { &self.codecs }

    pub fn get(&self, index: usize) -> Option<&AnyCodec> {
        self.codecs.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnyCodec> {
        self.codecs.iter()
    }

    /// Encode, then decode `buf`, restoring each stage's shape and dtype.
    ///
    /// The result has the same concrete type as `buf`.  A decode stage that
    /// produces more or fewer bytes than its encode stage consumed fails with
    /// [`CodecError::ShapeMismatch`].
    pub fn encode_decode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        let kind = buf.kind();
        let mut encoded = buf.into_array();
        let mut silhouettes = Vec::with_capacity(self.codecs.len());

        for (stage, codec) in self.codecs.iter().enumerate() {
            silhouettes.push(Silhouette::of(&encoded));
            debug!(stage, codec = codec.codec_id(), "encode_decode: encode");
            encoded = codec.encode(Buffer::Array(encoded))?.into_array();
            trace!(stage, nbytes = encoded.nbytes(), "encoded");
        }

        let mut decoded = encoded;

        for (stage, (codec, silhouette)) in self.codecs.iter().zip(silhouettes).enumerate().rev() {
            debug!(stage, codec = codec.codec_id(), "encode_decode: decode");
            let mut out = silhouette.allocate();
            codec.decode_into(Buffer::Array(decoded), &mut out)?;
            decoded = out;
        }

        Ok(Buffer::coerce(decoded, kind))
    }

    /// Apply `mapper` to each direct member, in order.
    ///
    /// Nested stacks are handed to `mapper` as they are; use
    /// [`map_codec`](crate::map::map_codec) for a recursive rewrite.
    pub fn map<F>(&self, mapper: F) -> CodecStack
    where
        F: FnMut(AnyCodec) -> AnyCodec,
    {
        self.codecs.iter().cloned().map(mapper).collect()
    }

    /// Fallible [`map`](Self::map); stops at the first error.
    pub fn try_map<F, E>(&self, mapper: F) -> Result<CodecStack, E>
    where
        F: FnMut(AnyCodec) -> Result<AnyCodec, E>,
    {
        self.codecs.iter().cloned().map(mapper).collect()
    }

    pub fn concat(&self, other: &CodecStack) -> CodecStack {
        self.codecs.iter().chain(other.codecs.iter()).cloned().collect()
    }

    pub fn repeat(&self, n: usize) -> CodecStack {
        std::iter::repeat(&self.codecs).take(n).flatten().cloned().collect()
    }
}

impl Codec for CodecStack {
    fn codec_id(&self) -> &str { STACK_ID }

    fn encode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        let mut encoded = buf;
        for (stage, codec) in self.codecs.iter().enumerate() {
            debug!(stage, codec = codec.codec_id(), "encode");
            encoded = codec.encode(Buffer::Array(encoded.into_array()))?;
        }
        Ok(encoded)
    }

    fn decode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        let mut decoded = buf;
        for (stage, codec) in self.codecs.iter().enumerate().rev() {
            debug!(stage, codec = codec.codec_id(), "decode");
            decoded = codec.decode(Buffer::Array(decoded.into_array()))?;
        }
        Ok(decoded)
    }

    /// Decode with the first member writing straight into `out`.
    fn decode_into(&self, buf: Buffer, out: &mut ArrayBuf) -> Result<(), CodecError> {
        let Some((first, rest)) = self.codecs.split_first() else {
            return out.copy_from(buf.as_bytes());
        };
        let mut decoded = buf;
        for (stage, codec) in rest.iter().enumerate().rev() {
            debug!(stage = stage + 1, codec = codec.codec_id(), "decode");
            decoded = codec.decode(Buffer::Array(decoded.into_array()))?;
        }
        debug!(stage = 0, codec = first.codec_id(), "decode into output buffer");
        first.decode_into(Buffer::Array(decoded.into_array()), out)
    }

    fn get_config(&self) -> CodecConfig {
        let members = self.codecs.iter().map(|c| Value::from(c.get_config())).collect();
        CodecConfig::new(STACK_ID).with("codecs", Value::Array(members))
    }

    fn as_stack(&self) -> Option<&CodecStack> {
        Some(self)
    }
}

pub(crate) fn create_stack(config: &CodecConfig, registry: &CodecRegistry) -> Result<AnyCodec, CodecError> {
    CodecStack::from_config(config, registry).map(AnyCodec::Stack)
}

// ── Sequence plumbing ────────────────────────────────────────────────────────

impl From<Vec<AnyCodec>> for CodecStack {
    fn from(codecs: Vec<AnyCodec>) -> Self { Self { codecs } }
}

impl FromIterator<AnyCodec> for CodecStack {
    fn from_iter<T: IntoIterator<Item = AnyCodec>>(iter: T) -> Self {
        Self { codecs: iter.into_iter().collect() }
    }
}

impl IntoIterator for CodecStack {
    type Item = AnyCodec;
    type IntoIter = std::vec::IntoIter<AnyCodec>;
    fn into_iter(self) -> Self::IntoIter { self.codecs.into_iter() }
}

impl<'a> IntoIterator for &'a CodecStack {
    type Item = &'a AnyCodec;
    type IntoIter = std::slice::Iter<'a, AnyCodec>;
    fn into_iter(self) -> Self::IntoIter { self.codecs.iter() }
}

impl Add for CodecStack {
    type Output = CodecStack;
    fn add(mut self, rhs: CodecStack) -> CodecStack {
        self.codecs.extend(rhs.codecs);
        self
    }
}

impl Add<&CodecStack> for &CodecStack {
    type Output = CodecStack;
    fn add(self, rhs: &CodecStack) -> CodecStack { self.concat(rhs) }
}

impl Mul<usize> for CodecStack {
    type Output = CodecStack;
    fn mul(self, n: usize) -> CodecStack { self.repeat(n) }
}

impl Mul<CodecStack> for usize {
    type Output = CodecStack;
    fn mul(self, stack: CodecStack) -> CodecStack { stack.repeat(self) }
}

impl fmt::Display for CodecStack {
    /// `CodecStack(zstd(level=3), crc32())`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CodecStack(")?;
        for (i, codec) in self.codecs.iter().enumerate() {
            if i > 0 { f.write_str(", ")?; }
            fmt::Display::fmt(codec, f)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::builtin::{Crc32Codec, ZstdCodec};

    fn zstd_crc() -> CodecStack {
        CodecStack::new(vec![AnyCodec::leaf(ZstdCodec::default()), AnyCodec::leaf(Crc32Codec)])
    }

    #[test]
    fn empty_stack_is_identity() {
        let stack = CodecStack::default();
        assert!(stack.is_empty());
        let input = Buffer::from(b"abc");
        assert_eq!(stack.encode(input.clone()).unwrap(), input);
        assert_eq!(stack.decode(input.clone()).unwrap(), input);
        assert_eq!(stack.encode_decode(input.clone()).unwrap(), input);

        let mut out = ArrayBuf::zeros(DType::U8, vec![3]);
        stack.decode_into(input, &mut out).unwrap();
        assert_eq!(out.as_bytes(), b"abc");
    }

    #[test]
    fn config_lists_member_configs_in_order() {
        let config = zstd_crc().get_config();
        assert_eq!(config.id, STACK_ID);
        assert_eq!(
            config.to_json().unwrap(),
            r#"{"id":"combinators.stack","codecs":[{"id":"zstd","level":3},{"id":"crc32"}]}"#,
        );
    }

    #[test]
    fn from_config_requires_codecs_list() {
        let registry = CodecRegistry::default();
        assert!(CodecStack::from_config(&CodecConfig::new(STACK_ID), &registry).is_err());
        let bad = CodecConfig::new(STACK_ID).with("codecs", "zstd");
        assert!(matches!(CodecStack::from_config(&bad, &registry), Err(CodecError::InvalidConfig(_))));
        let extra = CodecConfig::new(STACK_ID).with("codecs", Value::Array(vec![])).with("level", 1);
        assert!(CodecStack::from_config(&extra, &registry).is_err());
    }

    #[test]
    fn decode_into_writes_first_stage_output() {
        let stack = zstd_crc();
        let encoded = stack.encode(Buffer::from(b"abcdefgh")).unwrap();
        let mut out = ArrayBuf::zeros(DType::U32, vec![2]);
        stack.decode_into(encoded, &mut out).unwrap();
        assert_eq!(out.dtype(), DType::U32);
        assert_eq!(out.as_bytes(), b"abcdefgh");
    }

    #[test]
    fn display_nests() {
        let stack = CodecStack::new(vec![AnyCodec::Stack(zstd_crc()), AnyCodec::leaf(Crc32Codec)]);
        assert_eq!(
            stack.to_string(),
            "CodecStack(CodecStack(zstd(level=3), crc32()), crc32())",
        );
    }
}
