//! Canonical array form shared by every codec in a stack.
//!
//! A [`Buffer`] is what flows between codecs: either raw bytes or a typed,
//! contiguous n-dimensional [`ArrayBuf`].  Before a stack hands a value to a
//! member it normalises it with [`Buffer::into_array`], so every codec sees the
//! same representation regardless of what the previous stage returned.
//!
//! # Endianness
//! Element storage is strictly little-endian.  Typed access goes through
//! `byteorder`; the raw byte view is what byte-level codecs compress.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::CodecError;

// ── DType ────────────────────────────────────────────────────────────────────

/// Element type of an [`ArrayBuf`].  Serialised with numpy-style short names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    #[serde(rename = "u1")] U8,
    #[serde(rename = "i1")] I8,
    #[serde(rename = "u2")] U16,
    #[serde(rename = "i2")] I16,
    #[serde(rename = "u4")] U32,
    #[serde(rename = "i4")] I32,
    #[serde(rename = "u8")] U64,
    #[serde(rename = "i8")] I64,
    #[serde(rename = "f4")] F32,
    #[serde(rename = "f8")] F64,
}

impl DType {
    /// Width of one element in bytes.
    #[inline]
    pub fn item_size(self) -> usize {
        match self {
            DType::U8  | DType::I8  => 1,
            DType::U16 | DType::I16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 | DType::I64 | DType::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::U8  => "u1",
            DType::I8  => "i1",
            DType::U16 => "u2",
            DType::I16 => "i2",
            DType::U32 => "u4",
            DType::I32 => "i4",
            DType::U64 => "u8",
            DType::I64 => "i8",
            DType::F32 => "f4",
            DType::F64 => "f8",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Element ──────────────────────────────────────────────────────────────────

/// A Rust scalar that can be stored in an [`ArrayBuf`].
pub trait Element: Copy + Default {
    const DTYPE: DType;
    fn write_le(src: &[Self], dst: &mut [u8]);
    fn read_le(src: &[u8], dst: &mut [Self]);
}

impl Element for u8 {
    const DTYPE: DType = DType::U8;
    fn write_le(src: &[Self], dst: &mut [u8]) { dst.copy_from_slice(src) }
    fn read_le(src: &[u8], dst: &mut [Self])  { dst.copy_from_slice(src) }
}

impl Element for i8 {
    const DTYPE: DType = DType::I8;
    fn write_le(src: &[Self], dst: &mut [u8]) {
        for (d, s) in dst.iter_mut().zip(src) { *d = *s as u8; }
    }
    fn read_le(src: &[u8], dst: &mut [Self]) {
        for (d, s) in dst.iter_mut().zip(src) { *d = *s as i8; }
    }
}

macro_rules! impl_element {
    ($ty:ty, $dtype:ident, $write:ident, $read:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;
            fn write_le(src: &[Self], dst: &mut [u8]) { LittleEndian::$write(src, dst) }
            fn read_le(src: &[u8], dst: &mut [Self])  { LittleEndian::$read(src, dst) }
        }
    };
}

impl_element!(u16, U16, write_u16_into, read_u16_into);
impl_element!(i16, I16, write_i16_into, read_i16_into);
impl_element!(u32, U32, write_u32_into, read_u32_into);
impl_element!(i32, I32, write_i32_into, read_i32_into);
impl_element!(u64, U64, write_u64_into, read_u64_into);
impl_element!(i64, I64, write_i64_into, read_i64_into);
impl_element!(f32, F32, write_f32_into, read_f32_into);
impl_element!(f64, F64, write_f64_into, read_f64_into);

// ── ArrayBuf ─────────────────────────────────────────────────────────────────

/// Contiguous, typed, n-dimensional buffer.
///
/// Invariant: `data.len() == shape.iter().product() * dtype.item_size()`.
/// An empty shape denotes a scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayBuf {
    dtype: DType,
    shape: Vec<usize>,
    data:  Vec<u8>,
}

impl ArrayBuf {
    /// Wrap raw little-endian bytes, validating them against `dtype` and `shape`.
    pub fn new(dtype: DType, shape: Vec<usize>, data: Vec<u8>) -> Result<Self, CodecError> {
        let expected = element_count(&shape) * dtype.item_size();
        if data.len() != expected {
            return Err(CodecError::ShapeMismatch { expected, actual: data.len() });
        }
        Ok(Self { dtype, shape, data })
    }

    /// 1-D `u8` view over raw bytes.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { dtype: DType::U8, shape: vec![data.len()], data }
    }

    pub fn from_elements<T: Element>(values: &[T], shape: Vec<usize>) -> Result<Self, CodecError> {
        if element_count(&shape) != values.len() {
            return Err(CodecError::DType(format!(
                "{} elements cannot fill shape {:?}", values.len(), shape,
            )));
        }
        let mut data = vec![0u8; values.len() * T::DTYPE.item_size()];
        T::write_le(values, &mut data);
        Ok(Self { dtype: T::DTYPE, shape, data })
    }

    /// Freshly allocated, zero-filled buffer.
    pub fn zeros(dtype: DType, shape: Vec<usize>) -> Self {
        let data = vec![0u8; element_count(&shape) * dtype.item_size()];
        Self { dtype, shape, data }
    }

    pub fn to_elements<T: Element>(&self) -> Result<Vec<T>, CodecError> {
        if T::DTYPE != self.dtype {
            return Err(CodecError::DType(format!(
                "requested {} elements from a {} array", T::DTYPE, self.dtype,
            )));
        }
        let mut out = vec![T::default(); self.len()];
        T::read_le(&self.data, &mut out);
        Ok(out)
    }

    #[inline] pub fn dtype(&self) -> DType { self.dtype }
    #[inline] pub fn shape(&self) -> &[usize] { &self.shape }
    #[inline] pub fn as_bytes(&self) -> &[u8] { &self.data }
    #[inline] pub fn as_bytes_mut(&mut self) -> &mut [u8] { &mut self.data }
    #[inline] pub fn into_bytes(self) -> Vec<u8> { self.data }
    #[inline] pub fn nbytes(&self) -> usize { self.data.len() }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize { element_count(&self.shape) }

    #[inline]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Reinterpret the bytes as a flat array of `dtype`.
    pub fn view(self, dtype: DType) -> Result<Self, CodecError> {
        if self.data.len() % dtype.item_size() != 0 {
            return Err(CodecError::DType(format!(
                "{} bytes cannot be viewed as {}", self.data.len(), dtype,
            )));
        }
        let n = self.data.len() / dtype.item_size();
        Ok(Self { dtype, shape: vec![n], data: self.data })
    }

    pub fn reshape(self, shape: Vec<usize>) -> Result<Self, CodecError> {
        if element_count(&shape) != self.len() {
            return Err(CodecError::DType(format!(
                "cannot reshape {:?} into {:?}", self.shape, shape,
            )));
        }
        Ok(Self { shape, ..self })
    }

    /// Copy the raw bytes of `src` into `self`, keeping `self`'s dtype and shape.
    ///
    /// Fails with [`CodecError::ShapeMismatch`] if the byte lengths differ.
    pub fn copy_from(&mut self, src: &[u8]) -> Result<(), CodecError> {
        if src.len() != self.data.len() {
            return Err(CodecError::ShapeMismatch {
                expected: self.data.len(),
                actual:   src.len(),
            });
        }
        self.data.copy_from_slice(src);
        Ok(())
    }
}

fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

// ── Buffer ───────────────────────────────────────────────────────────────────

/// Concrete representation of a [`Buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Bytes,
    Array,
}

/// Value threaded through a codec pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Buffer {
    Bytes(Vec<u8>),
    Array(ArrayBuf),
}

impl Buffer {
    pub fn kind(&self) -> BufferKind {
        match self {
            Buffer::Bytes(_) => BufferKind::Bytes,
            Buffer::Array(_) => BufferKind::Array,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Buffer::Bytes(b) => b,
            Buffer::Array(a) => a.as_bytes(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Buffer::Bytes(b) => b,
            Buffer::Array(a) => a.into_bytes(),
        }
    }

    /// Normalise to canonical array form.  Raw bytes become a 1-D `u8` array.
    pub fn into_array(self) -> ArrayBuf {
        match self {
            Buffer::Bytes(b) => ArrayBuf::from_bytes(b),
            Buffer::Array(a) => a,
        }
    }

    /// Build a value of concrete type `kind` from `array`.
    pub fn coerce(array: ArrayBuf, kind: BufferKind) -> Self {
        match kind {
            BufferKind::Bytes => Buffer::Bytes(array.into_bytes()),
            BufferKind::Array => Buffer::Array(array),
        }
    }

    /// Byte-wise content equality, ignoring representation.
    pub fn content_eq(&self, other: &Buffer) -> bool {
        self.as_bytes() == other.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(v: Vec<u8>) -> Self { Buffer::Bytes(v) }
}

impl From<&[u8]> for Buffer {
    fn from(v: &[u8]) -> Self { Buffer::Bytes(v.to_vec()) }
}

impl<const N: usize> From<&[u8; N]> for Buffer {
    fn from(v: &[u8; N]) -> Self { Buffer::Bytes(v.to_vec()) }
}

impl From<ArrayBuf> for Buffer {
    fn from(a: ArrayBuf) -> Self { Buffer::Array(a) }
}
