//! Composable, reversible codec stacks.
//!
//! ```
//! use codecstack::{Buffer, Codec, CodecConfig, CodecRegistry, CodecStack};
//!
//! let registry = CodecRegistry::default();
//! let stack = CodecStack::resolve(
//!     [CodecConfig::new("zstd").with("level", 9), CodecConfig::new("crc32")],
//!     &registry,
//! )?;
//!
//! let encoded = stack.encode(Buffer::from(b"abc"))?;
//! assert_eq!(stack.decode(encoded)?, Buffer::from(b"abc"));
//! assert_eq!(stack.encode_decode(Buffer::from(b"abc"))?, Buffer::from(b"abc"));
//!
//! let restored = registry.get_codec(&stack.get_config())?;
//! assert_eq!(restored.as_stack(), Some(&stack));
//! # Ok::<(), codecstack::CodecError>(())
//! ```

pub mod buffer;
pub mod codec;
pub mod registry;
pub mod stack;
pub mod map;
pub mod chunked;
pub mod logging;

pub use buffer::{ArrayBuf, Buffer, BufferKind, DType, Element};
pub use codec::{AnyCodec, Codec, CodecConfig, CodecError};
pub use registry::{CodecFactory, CodecRegistry};
pub use stack::{CodecStack, StackItem, STACK_ID};
pub use map::{map_codec, try_map_codec};
pub use chunked::encode_decode_chunked;
