//! Codec registry: resolves declarative descriptions to codec instances.
//!
//! A registry maps codec ids to factory functions.  Resolution is strict: an
//! unknown id or a parameter the factory rejects fails immediately with a
//! [`CodecError`].  The caller MUST NOT fall back to another codec.
//!
//! Export needs no registry: every codec describes itself through
//! [`Codec::get_config`](crate::codec::Codec::get_config).

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, trace, warn};

use crate::codec::builtin;
use crate::codec::{AnyCodec, CodecConfig, CodecError};
use crate::stack::{self, CodecStack, STACK_ID};

/// Builds a codec from its description.  The registry is passed along so
/// composite codecs can resolve their members.
pub type CodecFactory = fn(&CodecConfig, &CodecRegistry) -> Result<AnyCodec, CodecError>;

/// Id-keyed table of codec factories.
#[derive(Clone)]
pub struct CodecRegistry {
    factories: HashMap<String, CodecFactory>,
}

impl CodecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    /// Create a registry holding the built-in codecs and the stack combinator.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(builtin::NONE_ID,   builtin::create_none);
        registry.register(builtin::ZSTD_ID,   builtin::create_zstd);
        registry.register(builtin::LZ4_ID,    builtin::create_lz4);
        registry.register(builtin::BROTLI_ID, builtin::create_brotli);
        registry.register(builtin::LZMA_ID,   builtin::create_lzma);
        registry.register(builtin::CRC32_ID,  builtin::create_crc32);
        registry.register(STACK_ID,           stack::create_stack);
        registry
    }

    /// Register `factory` under `id`, returning the factory it replaced.
    pub fn register(&mut self, id: impl Into<String>, factory: CodecFactory) -> Option<CodecFactory> {
        let id = id.into();
        let previous = self.factories.insert(id.clone(), factory);
        if previous.is_some() {
            warn!(codec = %id, "replacing registered codec factory");
        }
        previous
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Resolve a description to a codec.
    ///
    /// Returns `Err(CodecError::UnknownCodec)` if no factory is registered for
    /// the id, or whatever error the factory raises for invalid parameters.
    pub fn get_codec(&self, config: &CodecConfig) -> Result<AnyCodec, CodecError> {
        let factory = self.factories.get(&config.id).ok_or_else(|| CodecError::UnknownCodec {
            id: config.id.clone(),
        })?;
        trace!(codec = %config, "resolving codec");
        factory(config, self)
    }

    pub fn get_codec_value(&self, value: Value) -> Result<AnyCodec, CodecError> {
        self.get_codec(&CodecConfig::from_value(value)?)
    }

    pub fn get_codec_json(&self, json: &str) -> Result<AnyCodec, CodecError> {
        self.get_codec(&CodecConfig::from_json(json)?)
    }

    /// Parse a stack from JSON.
    ///
    /// Accepts a full stack description, a single codec description (wrapped
    /// in a one-member stack), or a bare list of member descriptions.
    pub fn parse_stack(&self, json: &str) -> Result<CodecStack, CodecError> {
        match serde_json::from_str::<Value>(json)? {
            Value::Array(members) => {
                let items = members
                    .into_iter()
                    .map(CodecConfig::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                CodecStack::resolve(items, self)
            }
            value => match self.get_codec_value(value)? {
                AnyCodec::Stack(stack) => Ok(stack),
                leaf => Ok(CodecStack::new(vec![leaf])),
            },
        }
    }

    /// [`parse_stack`](Self::parse_stack) on the contents of a file.
    pub fn load_stack<P: AsRef<Path>>(&self, path: P) -> Result<CodecStack, CodecError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading stack configuration");
        self.parse_stack(&std::fs::read_to_string(path)?)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry").field("ids", &self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;

    #[test]
    fn builtins_are_registered() {
        let registry = CodecRegistry::default();
        assert_eq!(
            registry.ids(),
            vec!["brotli", "combinators.stack", "crc32", "lz4", "lzma", "none", "zstd"],
        );
        assert!(CodecRegistry::new().ids().is_empty());
    }

    #[test]
    fn unknown_id_fails_hard() {
        let err = CodecRegistry::default()
            .get_codec(&CodecConfig::new("zlib"))
            .unwrap_err();
        assert!(matches!(err, CodecError::UnknownCodec { ref id } if id == "zlib"));
    }

    #[test]
    fn resolves_from_json() {
        let codec = CodecRegistry::default().get_codec_json(r#"{"id":"zstd","level":7}"#).unwrap();
        assert_eq!(codec.codec_id(), "zstd");
        assert_eq!(codec.get_config().int_param("level").unwrap(), Some(7));
    }

    #[test]
    fn register_replaces_factory() {
        fn always_none(_: &CodecConfig, _: &CodecRegistry) -> Result<AnyCodec, CodecError> {
            Ok(AnyCodec::leaf(builtin::NoneCodec))
        }
        let mut registry = CodecRegistry::default();
        assert!(registry.register("zstd", always_none).is_some());
        assert!(registry.register("custom", always_none).is_none());
        let codec = registry.get_codec(&CodecConfig::new("zstd")).unwrap();
        assert_eq!(codec.codec_id(), "none");
        assert!(registry.contains("custom"));
    }

    #[test]
    fn parse_stack_accepts_three_shapes() {
        let registry = CodecRegistry::default();
        let full = registry
            .parse_stack(r#"{"id":"combinators.stack","codecs":[{"id":"lz4"},{"id":"crc32"}]}"#)
            .unwrap();
        let list = registry.parse_stack(r#"[{"id":"lz4"},{"id":"crc32"}]"#).unwrap();
        assert_eq!(full, list);

        let single = registry.parse_stack(r#"{"id":"lz4"}"#).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single.codecs()[0].codec_id(), "lz4");

        assert!(registry.parse_stack(r#"[{"id":"nope"}]"#).is_err());
        assert!(registry.parse_stack("not json").is_err());
    }
}
