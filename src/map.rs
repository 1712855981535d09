//! Bottom-up rewriting of codec trees.

use crate::codec::{AnyCodec, Codec};

/// Apply `mapper` to every codec in the tree rooted at `codec`, post-order.
///
/// If `codec` is a stack, its members are rewritten first (recursively), then
/// `mapper` is applied to the rebuilt stack itself.  A stack held behind
/// [`AnyCodec::Leaf`] is descended into the same way and comes back as
/// [`AnyCodec::Stack`].  Any other leaf is passed to `mapper` directly.
pub fn map_codec<F>(codec: AnyCodec, mapper: &mut F) -> AnyCodec
where
    F: FnMut(AnyCodec) -> AnyCodec,
{
    let codec = match codec {
        AnyCodec::Stack(stack) => AnyCodec::Stack(stack.map(|child| map_codec(child, mapper))),
        AnyCodec::Leaf(leaf) => match leaf.as_stack() {
            Some(stack) => AnyCodec::Stack(stack.map(|child| map_codec(child, mapper))),
            None        => AnyCodec::Leaf(leaf),
        },
    };
    mapper(codec)
}

/// Fallible [`map_codec`]; the first error aborts the rewrite.
pub fn try_map_codec<F, E>(codec: AnyCodec, mapper: &mut F) -> Result<AnyCodec, E>
where
    F: FnMut(AnyCodec) -> Result<AnyCodec, E>,
{
    let codec = match codec {
        AnyCodec::Stack(stack) => AnyCodec::Stack(stack.try_map(|child| try_map_codec(child, mapper))?),
        AnyCodec::Leaf(leaf) => match leaf.as_stack() {
            Some(stack) => AnyCodec::Stack(stack.try_map(|child| try_map_codec(child, mapper))?),
            None        => AnyCodec::Leaf(leaf),
        },
    };
    mapper(codec)
}
