//! Structural hashing of values.

use sha2::{Digest, Sha256};

use super::Value;

/// Computes a 64-bit structural digest of `value`.
///
/// Every node feeds its variant name before its content, so values of
/// different variants never collide merely because their children do.
/// Maps are fed in key order and sets in digest order, so the result does
/// not depend on how the container was built.
///
/// The digest is SHA-256 truncated to 64 bits. It keys set membership and
/// is not meant to resist deliberate collisions.
pub fn hash_value(value: &Value) -> u64 {
    let mut hasher = Sha256::new();
    feed(&mut hasher, value);
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

fn feed_tag(h: &mut Sha256, tag: &str) {
    h.update((tag.len() as u32).to_le_bytes());
    h.update(tag.as_bytes());
}

fn feed_bytes(h: &mut Sha256, bytes: &[u8]) {
    h.update((bytes.len() as u64).to_le_bytes());
    h.update(bytes);
}

fn feed(h: &mut Sha256, value: &Value) {
    match value {
        Value::Tuple(items) => {
            feed_tag(h, "tuple");
            h.update((items.len() as u64).to_le_bytes());
            items.iter().for_each(|v| feed(h, v));
        }
        Value::List(items) => {
            feed_tag(h, "list");
            h.update((items.len() as u64).to_le_bytes());
            items.iter().for_each(|v| feed(h, v));
        }
        Value::Set(items) => {
            feed_tag(h, "set");
            h.update((items.len() as u64).to_le_bytes());
            for key in items.keys() {
                h.update(key.to_le_bytes());
            }
        }
        Value::Struct(fields) => {
            feed_tag(h, "struct");
            h.update((fields.len() as u64).to_le_bytes());
            for (k, v) in fields.iter() {
                feed_bytes(h, k.as_bytes());
                feed(h, v);
            }
        }
        Value::Map(entries) => {
            feed_tag(h, "map");
            h.update((entries.len() as u64).to_le_bytes());
            for (k, v) in entries.iter() {
                feed_bytes(h, k.as_bytes());
                feed(h, v);
            }
        }
        Value::Union(case, inner) => {
            feed_tag(h, "union");
            feed_bytes(h, case.as_bytes());
            feed(h, inner);
        }
        Value::Raw(bytes) => {
            feed_tag(h, "raw");
            feed_bytes(h, bytes);
        }
        Value::Symbol(s) => {
            feed_tag(h, "symbol");
            feed_bytes(h, s.as_bytes());
        }
        Value::String(s) => {
            feed_tag(h, "string");
            feed_bytes(h, s.as_bytes());
        }
        Value::Float(x) => {
            feed_tag(h, "float");
            // -0.0 == 0.0, so both must hash alike.
            let x = if *x == 0.0 { 0.0f64 } else { *x };
            h.update(x.to_bits().to_le_bytes());
        }
        Value::Bool(b) => {
            feed_tag(h, "bool");
            h.update([*b as u8]);
        }
        Value::DateTime(dt) => {
            feed_tag(h, "dateTime");
            h.update(dt.epoch_us.to_le_bytes());
            h.update(dt.offset_min.to_le_bytes());
        }
        Value::Null => feed_tag(h, "null"),
        Value::Ref(r) => {
            feed_tag(h, "ref");
            feed_bytes(h, r.model.as_bytes());
            feed_bytes(h, r.id.as_bytes());
        }
        Value::Int8(n) => {
            feed_tag(h, "int8");
            h.update(n.to_le_bytes());
        }
        Value::Int16(n) => {
            feed_tag(h, "int16");
            h.update(n.to_le_bytes());
        }
        Value::Int32(n) => {
            feed_tag(h, "int32");
            h.update(n.to_le_bytes());
        }
        Value::Int64(n) => {
            feed_tag(h, "int64");
            h.update(n.to_le_bytes());
        }
        Value::Uint8(n) => {
            feed_tag(h, "uint8");
            h.update(n.to_le_bytes());
        }
        Value::Uint16(n) => {
            feed_tag(h, "uint16");
            h.update(n.to_le_bytes());
        }
        Value::Uint32(n) => {
            feed_tag(h, "uint32");
            h.update(n.to_le_bytes());
        }
        Value::Uint64(n) => {
            feed_tag(h, "uint64");
            h.update(n.to_le_bytes());
        }
        Value::Meta(meta) => {
            feed_tag(h, "meta");
            feed_bytes(h, meta.id.as_bytes());
            feed_bytes(h, meta.model.as_bytes());
            h.update(meta.created.epoch_us.to_le_bytes());
            h.update(meta.created.offset_min.to_le_bytes());
            h.update(meta.updated.epoch_us.to_le_bytes());
            h.update(meta.updated.offset_min.to_le_bytes());
            feed(h, &meta.value);
        }
    }
}
