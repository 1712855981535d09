//! Per-chunk round-trips over a larger array.
//!
//! The array is split along its leading axis into chunks of at most
//! `chunk_len` rows.  Each chunk goes through
//! [`CodecStack::encode_decode`] on its own and the results are stitched back
//! together in order.
//!
//! Since each chunk is encoded *independently*, this may cause chunk boundary
//! artifacts.  Do not use it with codecs that need the whole array at once or
//! a neighbourhood of points across a chunk boundary; call
//! `stack.encode_decode` on the whole array instead.

use tracing::debug;

use crate::buffer::{ArrayBuf, Buffer};
use crate::codec::CodecError;
use crate::stack::CodecStack;

/// Round-trip `array` through `stack` chunk by chunk.
///
/// Returns an array with the input's shape and dtype.  Zero-sized arrays are
/// returned as a copy without touching the stack.
pub fn encode_decode_chunked(
    stack:     &CodecStack,
    array:     &ArrayBuf,
    chunk_len: usize,
) -> Result<ArrayBuf, CodecError> {
    if chunk_len == 0 {
        return Err(CodecError::InvalidConfig("chunk length must be at least 1".to_owned()));
    }
    if array.is_empty() {
        return Ok(array.clone());
    }

    let shape = array.shape();
    let Some((&rows, inner)) = shape.split_first() else {
        // A scalar is a single chunk.
        return stack.encode_decode(Buffer::Array(array.clone())).map(Buffer::into_array);
    };
    let row_bytes = inner.iter().product::<usize>() * array.dtype().item_size();

    let mut out = Vec::with_capacity(array.nbytes());
    for (index, start) in (0..rows).step_by(chunk_len).enumerate() {
        let n = chunk_len.min(rows - start);
        let mut chunk_shape = Vec::with_capacity(shape.len());
        chunk_shape.push(n);
        chunk_shape.extend_from_slice(inner);

        let bytes = array.as_bytes()[start * row_bytes..(start + n) * row_bytes].to_vec();
        let chunk = ArrayBuf::new(array.dtype(), chunk_shape, bytes)?;

        debug!(chunk = index, rows = n, "encode_decode chunk");
        let decoded = stack.encode_decode(Buffer::Array(chunk))?.into_array();
        out.extend_from_slice(decoded.as_bytes());
    }

    ArrayBuf::new(array.dtype(), shape.to_vec(), out)
}
