use codecstack::codec::builtin::{Crc32Codec, Lz4Codec, ZstdCodec};
use codecstack::{map_codec, AnyCodec, Buffer, Codec, CodecRegistry, CodecStack};

/// `(codec id, stack nesting depth)` for every leaf, in order.
fn leaf_depths(codec: &AnyCodec, depth: usize, out: &mut Vec<(String, usize)>) {
    match codec {
        AnyCodec::Stack(stack) => {
            for child in stack {
                leaf_depths(child, depth + 1, out);
            }
        }
        leaf => out.push((leaf.codec_id().to_owned(), depth)),
    }
}

fn depths(codec: &AnyCodec) -> Vec<(String, usize)> {
    let mut out = Vec::new();
    leaf_depths(codec, 0, &mut out);
    out
}

fn d(id: &str, depth: usize) -> (String, usize) {
    (id.to_owned(), depth)
}

fn wrap_leaves(codec: AnyCodec) -> AnyCodec {
    if codec.is_stack() {
        codec
    } else {
        AnyCodec::Stack(CodecStack::new(vec![codec]))
    }
}

/// `Stack[zstd, Stack[lz4, crc32]]`
fn two_level() -> AnyCodec {
    AnyCodec::Stack(CodecStack::new(vec![
        AnyCodec::leaf(ZstdCodec::default()),
        AnyCodec::Stack(CodecStack::new(vec![AnyCodec::leaf(Lz4Codec), AnyCodec::leaf(Crc32Codec)])),
    ]))
}

#[test]
fn test_map_codec_wraps_every_leaf_one_level_deeper() {
    let original = two_level();
    let mapped = map_codec(original.clone(), &mut wrap_leaves);

    let before = depths(&original);
    let after = depths(&mapped);
    assert_eq!(before, vec![d("zstd", 1), d("lz4", 2), d("crc32", 2)]);
    assert_eq!(after.len(), before.len());
    for ((id_before, d_before), (id_after, d_after)) in before.iter().zip(&after) {
        assert_eq!(id_before, id_after);
        assert_eq!(*d_after, d_before + 1);
    }

    // Behaviour is unchanged: singleton stacks are transparent.
    let x = Buffer::from(b"mapped stacks encode the same bytes");
    assert_eq!(mapped.encode(x.clone()).unwrap(), original.encode(x).unwrap());
}

#[test]
fn test_stack_map_only_touches_direct_members() {
    let original = two_level();
    let shallow = original.as_stack().unwrap().map(wrap_leaves);
    let after = depths(&AnyCodec::Stack(shallow));
    assert_eq!(after, vec![d("zstd", 2), d("lz4", 2), d("crc32", 2)]);
}

#[test]
fn test_identity_mapper_preserves_tree() {
    let original = two_level();
    let mapped = map_codec(original.clone(), &mut |codec: AnyCodec| codec);
    assert_eq!(mapped, original);
}

#[test]
fn test_mapped_tree_config_roundtrips() {
    let registry = CodecRegistry::default();
    let mapped = map_codec(two_level(), &mut wrap_leaves);
    let rebuilt = registry.get_codec(&mapped.get_config()).unwrap();
    assert_eq!(rebuilt, mapped);
}

#[test]
fn test_mapper_can_replace_leaves() {
    let mapped = map_codec(two_level(), &mut |codec: AnyCodec| {
        if codec.codec_id() == "lz4" {
            AnyCodec::leaf(ZstdCodec::new(1).unwrap())
        } else {
            codec
        }
    });
    let ids: Vec<String> = depths(&mapped).into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec!["zstd", "zstd", "crc32"]);
}

#[test]
fn test_map_codec_wrapping_everything_wraps_the_root() {
    let original = two_level();
    let mapped = map_codec(original.clone(), &mut |codec: AnyCodec| {
        AnyCodec::Stack(CodecStack::new(vec![codec]))
    });

    // The root comes back as a singleton stack around the rebuilt original.
    let root = mapped.as_stack().unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root.codecs()[0].as_stack().unwrap().len(), 2);

    // Every enclosing stack and every leaf gained one level.
    assert_eq!(depths(&mapped), vec![d("zstd", 3), d("lz4", 5), d("crc32", 5)]);

    let x = Buffer::from(b"wrapped roots are transparent too");
    assert_eq!(mapped.encode(x.clone()).unwrap(), original.encode(x).unwrap());
}

#[test]
fn test_map_codec_reaches_stack_held_as_leaf() {
    let inner = CodecStack::new(vec![AnyCodec::leaf(Crc32Codec)]);
    let as_leaf = AnyCodec::leaf(inner.clone());
    assert_eq!(as_leaf, AnyCodec::Stack(inner));

    let mapped = map_codec(as_leaf, &mut wrap_leaves);
    assert_eq!(depths(&mapped), vec![d("crc32", 2)]);
    assert_eq!(mapped.to_string(), "CodecStack(CodecStack(crc32()))");
}
