//! Codec capability contract.
//!
//! # Identity rules
//! Every codec is identified by a string id (`"zstd"`, `"crc32"`,
//! `"combinators.stack"`, ...).  Together with its parameters the id forms the
//! codec's declarative description, a [`CodecConfig`].  That description is
//! the authoritative identity: two codecs are equal iff their configs are
//! equal, and `registry.get_codec(&codec.get_config())` must rebuild an equal
//! codec.
//!
//! # Composition
//! [`AnyCodec`] is the unit a stack stores.  It is either a leaf (any
//! [`Codec`] implementation behind an `Arc`) or a nested [`CodecStack`].
//! Only the `Stack` variant is descended into by
//! [`map_codec`](crate::map::map_codec).

pub mod builtin;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

use crate::buffer::{ArrayBuf, Buffer};
use crate::stack::CodecStack;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    /// A description names a codec id that no registry entry provides.
    #[error("Unknown codec id '{id}'")]
    UnknownCodec { id: String },
    #[error("Invalid codec configuration: {0}")]
    InvalidConfig(String),
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("Checksum mismatch: stored {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    /// Decoded data does not fit the output buffer it is written into.
    #[error("Shape mismatch: output buffer holds {expected} bytes, decoded data has {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("DType error: {0}")]
    DType(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Declarative description ──────────────────────────────────────────────────

/// Serialisable description of a codec: `{ "id": ..., ...params }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecConfig {
    pub id: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl CodecConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), params: Map::new() }
    }

    /// Builder-style parameter insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn from_json(s: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_value(value: Value) -> Result<Self, CodecError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject any parameter not named in `allowed`.
    pub fn check_params(&self, allowed: &[&str]) -> Result<(), CodecError> {
        match self.params.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(key) => Err(CodecError::InvalidConfig(format!(
                "codec '{}' does not accept parameter '{}'", self.id, key,
            ))),
            None => Ok(()),
        }
    }

    /// Integer parameter; `Ok(None)` when absent.
    pub fn int_param(&self, key: &str) -> Result<Option<i64>, CodecError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(v) => v.as_i64().map(Some).ok_or_else(|| CodecError::InvalidConfig(format!(
                "codec '{}' parameter '{}' must be an integer, got {}", self.id, key, v,
            ))),
        }
    }
}

impl From<CodecConfig> for Value {
    fn from(config: CodecConfig) -> Self {
        let mut map = Map::with_capacity(config.params.len() + 1);
        map.insert("id".to_owned(), Value::String(config.id));
        map.extend(config.params);
        Value::Object(map)
    }
}

impl fmt::Display for CodecConfig {
    /// `zstd(level=3)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.id)?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            if i > 0 { f.write_str(", ")?; }
            write!(f, "{k}={v}")?;
        }
        f.write_str(")")
    }
}

// ── Codec trait ──────────────────────────────────────────────────────────────

/// A reversible transformation with a declarative configuration.
///
/// `decode` must invert `encode` on every value `encode` produces.  Both must
/// be pure functions of the configuration and the input.
pub trait Codec: fmt::Debug + Send + Sync {
    fn codec_id(&self) -> &str;

    fn encode(&self, buf: Buffer) -> Result<Buffer, CodecError>;

    fn decode(&self, buf: Buffer) -> Result<Buffer, CodecError>;

    /// Decode into a caller-supplied buffer of exactly the right byte size.
    ///
    /// The default decodes into a fresh allocation and copies; codecs that can
    /// write straight into `out` override it.
    fn decode_into(&self, buf: Buffer, out: &mut ArrayBuf) -> Result<(), CodecError> {
        let decoded = self.decode(buf)?;
        out.copy_from(decoded.as_bytes())
    }

    fn get_config(&self) -> CodecConfig;

    /// The stack behind this codec, if it is one.
    fn as_stack(&self) -> Option<&CodecStack> {
        None
    }
}

// ── AnyCodec ─────────────────────────────────────────────────────────────────

/// A member of a codec stack: a leaf codec or a nested stack.
#[derive(Debug, Clone)]
pub enum AnyCodec {
    Leaf(Arc<dyn Codec>),
    Stack(CodecStack),
}

impl AnyCodec {
    pub fn leaf<C: Codec + 'static>(codec: C) -> Self {
        AnyCodec::Leaf(Arc::new(codec))
    }

    /// The stack this codec is, whether held directly or behind a leaf.
    pub fn as_stack(&self) -> Option<&CodecStack> {
        match self {
            AnyCodec::Stack(s) => Some(s),
            AnyCodec::Leaf(c)  => c.as_stack(),
        }
    }

    pub fn is_stack(&self) -> bool {
        self.as_stack().is_some()
    }
}

impl Codec for AnyCodec {
    fn codec_id(&self) -> &str {
        match self {
            AnyCodec::Leaf(c)  => c.codec_id(),
            AnyCodec::Stack(s) => s.codec_id(),
        }
    }

    fn encode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        match self {
            AnyCodec::Leaf(c)  => c.encode(buf),
            AnyCodec::Stack(s) => s.encode(buf),
        }
    }

    fn decode(&self, buf: Buffer) -> Result<Buffer, CodecError> {
        match self {
            AnyCodec::Leaf(c)  => c.decode(buf),
            AnyCodec::Stack(s) => s.decode(buf),
        }
    }

    fn decode_into(&self, buf: Buffer, out: &mut ArrayBuf) -> Result<(), CodecError> {
        match self {
            AnyCodec::Leaf(c)  => c.decode_into(buf, out),
            AnyCodec::Stack(s) => s.decode_into(buf, out),
        }
    }

    fn get_config(&self) -> CodecConfig {
        match self {
            AnyCodec::Leaf(c)  => c.get_config(),
            AnyCodec::Stack(s) => s.get_config(),
        }
    }

    fn as_stack(&self) -> Option<&CodecStack> {
        AnyCodec::as_stack(self)
    }
}

impl PartialEq for AnyCodec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AnyCodec::Stack(a), AnyCodec::Stack(b)) => a == b,
            _ => self.get_config() == other.get_config(),
        }
    }
}

impl From<CodecStack> for AnyCodec {
    fn from(stack: CodecStack) -> Self {
        AnyCodec::Stack(stack)
    }
}

impl From<Arc<dyn Codec>> for AnyCodec {
    fn from(codec: Arc<dyn Codec>) -> Self {
        AnyCodec::Leaf(codec)
    }
}

impl fmt::Display for AnyCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyCodec::Leaf(c)  => fmt::Display::fmt(&c.get_config(), f),
            AnyCodec::Stack(s) => fmt::Display::fmt(s, f),
        }
    }
}
