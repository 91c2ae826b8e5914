//! Dynamically typed values.
//!
//! [`Value`] is the closed set of data a document can hold. Models describe
//! shapes of values, and encoded models are themselves values.

mod hash;
mod set;
mod sorted_map;

use std::fmt;

use bitflags::bitflags;

pub use hash::hash_value;
pub use set::ValueSet;
pub use sorted_map::SortedMap;

use crate::util::DateTime;

bitflags! {
    /// One flag per [`Value`] variant.
    ///
    /// A single value reports exactly one flag; models report the set of
    /// flags they accept.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ValueType: u32 {
        const TUPLE = 1 << 0;
        const LIST = 1 << 1;
        const SET = 1 << 2;
        const STRUCT = 1 << 3;
        const MAP = 1 << 4;
        const UNION = 1 << 5;
        const RAW = 1 << 6;
        const SYMBOL = 1 << 7;
        const STRING = 1 << 8;
        const FLOAT = 1 << 9;
        const BOOL = 1 << 10;
        const DATE_TIME = 1 << 11;
        const NULL = 1 << 12;
        const REF = 1 << 13;
        const INT8 = 1 << 14;
        const INT16 = 1 << 15;
        const INT32 = 1 << 16;
        const INT64 = 1 << 17;
        const UINT8 = 1 << 18;
        const UINT16 = 1 << 19;
        const UINT32 = 1 << 20;
        const UINT64 = 1 << 21;
        const META = 1 << 22;
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        if *self == ValueType::all() {
            return f.write_str("any");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                f.write_str("|")?;
            }
            first = false;
            f.write_str(&name.to_ascii_lowercase())?;
        }
        Ok(())
    }
}

/// Locates a persisted record: the model (collection) it belongs to and its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefValue {
    pub model: String,
    pub id: String,
}

impl RefValue {
    pub fn new(model: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            id: id.into(),
        }
    }
}

/// Envelope of a persisted record.
///
/// Only the wrapped `value` is ever serialized; see [`Value::unwrap_meta`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetaValue {
    pub id: String,
    pub model: String,
    pub created: DateTime,
    pub updated: DateTime,
    pub value: Value,
}

/// A dynamically typed datum.
///
/// `Clone` is a deep copy: values never share interior state.
#[derive(Debug, Clone)]
pub enum Value {
    /// Fixed-arity ordered sequence.
    Tuple(Vec<Value>),
    /// Variable-length ordered sequence.
    List(Vec<Value>),
    /// Collection deduplicated by structural hash.
    Set(ValueSet),
    /// Record with named fields.
    Struct(SortedMap<Value>),
    /// Homogeneous string-keyed dictionary.
    Map(SortedMap<Value>),
    /// A named alternative.
    Union(String, Box<Value>),
    /// Opaque bytes.
    Raw(Vec<u8>),
    /// Interned tag, the value of an enum model.
    Symbol(String),
    String(String),
    Float(f64),
    Bool(bool),
    DateTime(DateTime),
    Null,
    Ref(RefValue),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Meta(Box<MetaValue>),
}

impl Value {
    /// Builds a `Union` value.
    pub fn union(case: impl Into<String>, value: Value) -> Self {
        Value::Union(case.into(), Box::new(value))
    }

    /// Builds a `Struct` value from `(field, value)` pairs.
    pub fn structure<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Struct(fields.into_iter().collect())
    }

    /// Builds a `Map` value from `(key, value)` pairs.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(entries.into_iter().collect())
    }

    /// Builds a `Set` value, dropping duplicates.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(items.into_iter().collect())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn symbol(s: impl Into<String>) -> Self {
        Value::Symbol(s.into())
    }

    /// Returns the type flag of this variant.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Tuple(_) => ValueType::TUPLE,
            Value::List(_) => ValueType::LIST,
            Value::Set(_) => ValueType::SET,
            Value::Struct(_) => ValueType::STRUCT,
            Value::Map(_) => ValueType::MAP,
            Value::Union(..) => ValueType::UNION,
            Value::Raw(_) => ValueType::RAW,
            Value::Symbol(_) => ValueType::SYMBOL,
            Value::String(_) => ValueType::STRING,
            Value::Float(_) => ValueType::FLOAT,
            Value::Bool(_) => ValueType::BOOL,
            Value::DateTime(_) => ValueType::DATE_TIME,
            Value::Null => ValueType::NULL,
            Value::Ref(_) => ValueType::REF,
            Value::Int8(_) => ValueType::INT8,
            Value::Int16(_) => ValueType::INT16,
            Value::Int32(_) => ValueType::INT32,
            Value::Int64(_) => ValueType::INT64,
            Value::Uint8(_) => ValueType::UINT8,
            Value::Uint16(_) => ValueType::UINT16,
            Value::Uint32(_) => ValueType::UINT32,
            Value::Uint64(_) => ValueType::UINT64,
            Value::Meta(_) => ValueType::META,
        }
    }

    /// Returns true if this variant has no child values.
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            Value::Tuple(_)
                | Value::List(_)
                | Value::Set(_)
                | Value::Struct(_)
                | Value::Map(_)
                | Value::Union(..)
                | Value::Meta(_)
        )
    }

    /// Rewrites the tree bottom-up.
    ///
    /// Children are transformed first, then `f` is applied to the rebuilt
    /// node. Set elements are rehashed after their transformation, so two
    /// elements rewritten to equal values collapse into one.
    pub fn transform<F>(self, f: &mut F) -> Value
    where
        F: FnMut(Value) -> Value,
    {
        let rebuilt = match self {
            Value::Tuple(items) => Value::Tuple(items.into_iter().map(|v| v.transform(f)).collect()),
            Value::List(items) => Value::List(items.into_iter().map(|v| v.transform(f)).collect()),
            Value::Set(items) => Value::Set(items.into_iter().map(|v| v.transform(f)).collect()),
            Value::Struct(fields) => Value::Struct(fields.map_values(|v| v.transform(f))),
            Value::Map(entries) => Value::Map(entries.map_values(|v| v.transform(f))),
            Value::Union(case, inner) => Value::Union(case, Box::new(inner.transform(f))),
            Value::Meta(mut meta) => {
                meta.value = meta.value.transform(f);
                Value::Meta(meta)
            }
            leaf => leaf,
        };
        f(rebuilt)
    }

    /// Returns the record value inside a `Meta` envelope, or `self`.
    pub fn unwrap_meta(&self) -> &Value {
        let mut v = self;
        while let Value::Meta(meta) = v {
            v = &meta.value;
        }
        v
    }

    /// Structural 64-bit digest; see [`hash_value`].
    pub fn hash64(&self) -> u64 {
        hash_value(self)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Union(ca, va), Value::Union(cb, vb)) => ca == cb && va == vb,
            (Value::Raw(a), Value::Raw(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::Int8(a), Value::Int8(b)) => a == b,
            (Value::Int16(a), Value::Int16(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Uint8(a), Value::Uint8(b)) => a == b,
            (Value::Uint16(a), Value::Uint16(b)) => a == b,
            (Value::Uint32(a), Value::Uint32(b)) => a == b,
            (Value::Uint64(a), Value::Uint64(b)) => a == b,
            (Value::Meta(a), Value::Meta(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
            f.write_str(open)?;
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{v}")?;
            }
            f.write_str(close)
        }
        fn entries(f: &mut fmt::Formatter<'_>, open: &str, m: &SortedMap<Value>, close: &str) -> fmt::Result {
            f.write_str(open)?;
            for (i, (k, v)) in m.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{k:?}: {v}")?;
            }
            f.write_str(close)
        }

        match self {
            Value::Tuple(items) => seq(f, "(", items, ")"),
            Value::List(items) => seq(f, "[", items, "]"),
            Value::Set(items) => {
                f.write_str("#{")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("}")
            }
            Value::Struct(fields) => entries(f, "{", fields, "}"),
            Value::Map(m) => entries(f, "map{", m, "}"),
            Value::Union(case, v) => write!(f, "{case}:{v}"),
            Value::Raw(bytes) => write!(f, "raw({} bytes)", bytes.len()),
            Value::Symbol(s) => write!(f, "'{s}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::DateTime(dt) => write!(f, "{dt}"),
            Value::Null => f.write_str("null"),
            Value::Ref(r) => write!(f, "ref({}, {})", r.model, r.id),
            Value::Int8(n) => write!(f, "{n}i8"),
            Value::Int16(n) => write!(f, "{n}i16"),
            Value::Int32(n) => write!(f, "{n}i32"),
            Value::Int64(n) => write!(f, "{n}"),
            Value::Uint8(n) => write!(f, "{n}u8"),
            Value::Uint16(n) => write!(f, "{n}u16"),
            Value::Uint32(n) => write!(f, "{n}u32"),
            Value::Uint64(n) => write!(f, "{n}u64"),
            Value::Meta(meta) => write!(f, "{}", meta.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Value::structure([
            ("name", Value::string("Ada")),
            ("age", Value::Uint8(36)),
            ("tags", Value::set([Value::symbol("admin"), Value::symbol("ops")])),
            (
                "history",
                Value::List(vec![Value::union("login", Value::DateTime(DateTime::UNIX_EPOCH))]),
            ),
        ])
    }

    #[test]
    fn test_value_type_single_flag() {
        assert_eq!(Value::Null.value_type(), ValueType::NULL);
        assert_eq!(sample().value_type(), ValueType::STRUCT);
        assert_eq!(Value::Uint64(1).value_type().bits().count_ones(), 1);
    }

    #[test]
    fn test_mismatched_variants_never_equal() {
        assert_ne!(Value::Int32(1), Value::Int64(1));
        assert_ne!(Value::string("a"), Value::symbol("a"));
        assert_ne!(Value::List(vec![]), Value::Tuple(vec![]));
        assert_ne!(Value::Struct(SortedMap::new()), Value::Map(SortedMap::new()));
    }

    #[test]
    fn test_clone_is_deep_and_equal() {
        let original = sample();
        let mut copy = original.clone();
        assert_eq!(copy, original);
        if let Value::Struct(fields) = &mut copy {
            fields.set("name", Value::string("Grace"));
        }
        assert_ne!(copy, original);
    }

    #[test]
    fn test_primitive() {
        assert!(Value::Null.is_primitive());
        assert!(Value::Raw(vec![1, 2]).is_primitive());
        assert!(Value::Ref(RefValue::new("m", "o")).is_primitive());
        assert!(!Value::List(vec![]).is_primitive());
        assert!(!Value::union("a", Value::Null).is_primitive());
    }

    #[test]
    fn test_transform_bottom_up() {
        let v = Value::List(vec![Value::Int64(1), Value::List(vec![Value::Int64(2)])]);
        let mut order = Vec::new();
        let doubled = v.transform(&mut |v| {
            order.push(v.value_type());
            match v {
                Value::Int64(n) => Value::Int64(n * 2),
                other => other,
            }
        });
        assert_eq!(
            doubled,
            Value::List(vec![Value::Int64(2), Value::List(vec![Value::Int64(4)])])
        );
        assert_eq!(
            order,
            vec![ValueType::INT64, ValueType::INT64, ValueType::LIST, ValueType::LIST]
        );
    }

    #[test]
    fn test_transform_collapses_set_members() {
        let v = Value::set([Value::Int64(1), Value::Int64(2)]);
        let out = v.transform(&mut |v| match v {
            Value::Int64(_) => Value::Int64(0),
            other => other,
        });
        match out {
            Value::Set(s) => assert_eq!(s.len(), 1),
            other => panic!("expected set, got {other}"),
        }
    }

    #[test]
    fn test_unwrap_meta() {
        let inner = sample();
        let meta = Value::Meta(Box::new(MetaValue {
            id: "o1".into(),
            model: "m1".into(),
            created: DateTime::UNIX_EPOCH,
            updated: DateTime::from_epoch_us(5),
            value: inner.clone(),
        }));
        assert_eq!(meta.unwrap_meta(), &inner);
        assert!(!meta.is_primitive());
        assert_eq!(meta.to_string(), inner.to_string());
    }

    #[test]
    fn test_value_type_display() {
        assert_eq!((ValueType::STRING | ValueType::NULL).to_string(), "string|null");
        assert_eq!(ValueType::all().to_string(), "any");
    }
}
