//! Models: structural descriptions of values.
//!
//! A [`Model`] describes the legal shapes of a [`Value`]. Models are
//! immutable trees, except that [`Recursion`] nodes are shared and may be
//! referenced from inside their own inner model.
//!
//! - [`either`] merges two models into one accepting both.
//! - [`Model::traverse_value`] walks a value in lock-step with its model.
//! - [`builder`] provides fluent construction of struct and union models.

pub mod builder;
mod either;
mod recursion;
mod traverse;

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::util::DateTime;
use crate::value::{SortedMap, Value, ValueSet, ValueType};

pub use builder::{StructBuilder, UnionBuilder};
pub use either::{either, roll_or, union_of, unroll_or};
pub use recursion::Recursion;
pub(crate) use recursion::reaches_itself;

/// A schema describing the legal shapes of values.
#[derive(Debug, Clone)]
pub enum Model {
    Null,
    Bool,
    Float,
    String,
    DateTime,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    /// Matches every value.
    Any,
    /// A reference to a record of the model with this id.
    ///
    /// An empty id means the target is unknown.
    Ref(String),
    List(Box<Model>),
    Set(Box<Model>),
    Map(Box<Model>),
    Tuple(Vec<Model>),
    Struct(SortedMap<Model>),
    Union(SortedMap<Model>),
    Enum(BTreeSet<String>),
    /// Either the left or the right model.
    Or(Box<Model>, Box<Model>),
    /// Sibling values under this model must be pairwise distinct.
    Unique(Box<Model>),
    /// A label with no effect on which values match.
    Annotation(String, Box<Model>),
    Recursion(Rc<Recursion>),
}

impl Model {
    pub fn list(element: Model) -> Self {
        Model::List(Box::new(element))
    }

    pub fn set(element: Model) -> Self {
        Model::Set(Box::new(element))
    }

    pub fn map(element: Model) -> Self {
        Model::Map(Box::new(element))
    }

    pub fn tuple(elements: impl IntoIterator<Item = Model>) -> Self {
        Model::Tuple(elements.into_iter().collect())
    }

    pub fn structure<K: Into<String>>(fields: impl IntoIterator<Item = (K, Model)>) -> Self {
        Model::Struct(fields.into_iter().collect())
    }

    pub fn union<K: Into<String>>(cases: impl IntoIterator<Item = (K, Model)>) -> Self {
        Model::Union(cases.into_iter().collect())
    }

    pub fn enumeration<S: Into<String>>(symbols: impl IntoIterator<Item = S>) -> Self {
        Model::Enum(symbols.into_iter().map(Into::into).collect())
    }

    pub fn or(left: Model, right: Model) -> Self {
        Model::Or(Box::new(left), Box::new(right))
    }

    /// `inner` or null.
    pub fn optional(inner: Model) -> Self {
        Model::or(inner, Model::Null)
    }

    pub fn unique(inner: Model) -> Self {
        Model::Unique(Box::new(inner))
    }

    pub fn annotation(tag: impl Into<String>, inner: Model) -> Self {
        Model::Annotation(tag.into(), Box::new(inner))
    }

    pub fn reference(target: impl Into<String>) -> Self {
        Model::Ref(target.into())
    }

    /// The case name this model is encoded under.
    pub fn case_name(&self) -> &'static str {
        match self {
            Model::Null => "null",
            Model::Bool => "bool",
            Model::Float => "float",
            Model::String => "string",
            Model::DateTime => "dateTime",
            Model::Int8 => "int8",
            Model::Int16 => "int16",
            Model::Int32 => "int32",
            Model::Int64 => "int64",
            Model::Uint8 => "uint8",
            Model::Uint16 => "uint16",
            Model::Uint32 => "uint32",
            Model::Uint64 => "uint64",
            Model::Any => "any",
            Model::Ref(_) => "ref",
            Model::List(_) => "list",
            Model::Set(_) => "set",
            Model::Map(_) => "map",
            Model::Tuple(_) => "tuple",
            Model::Struct(_) => "struct",
            Model::Union(_) => "union",
            Model::Enum(_) => "enum",
            Model::Or(..) => "or",
            Model::Unique(_) => "unique",
            Model::Annotation(..) => "annotation",
            Model::Recursion(_) => "recursion",
        }
    }

    /// Strips `Annotation` and `Unique` wrappers.
    pub fn concrete(&self) -> &Model {
        let mut m = self;
        loop {
            match m {
                Model::Annotation(_, inner) | Model::Unique(inner) => m = inner,
                other => return other,
            }
        }
    }

    /// Returns true if this model, ignoring annotations, is `Unique`.
    pub fn is_unique(&self) -> bool {
        let mut m = self;
        loop {
            match m {
                Model::Unique(_) => return true,
                Model::Annotation(_, inner) => m = inner,
                _ => return false,
            }
        }
    }

    /// The set of value variants this model accepts.
    pub fn value_type(&self) -> ValueType {
        self.value_type_in(&mut FxHashSet::default())
    }

    fn value_type_in(&self, seen: &mut FxHashSet<usize>) -> ValueType {
        match self {
            Model::Null => ValueType::NULL,
            Model::Bool => ValueType::BOOL,
            Model::Float => ValueType::FLOAT,
            Model::String => ValueType::STRING,
            Model::DateTime => ValueType::DATE_TIME,
            Model::Int8 => ValueType::INT8,
            Model::Int16 => ValueType::INT16,
            Model::Int32 => ValueType::INT32,
            Model::Int64 => ValueType::INT64,
            Model::Uint8 => ValueType::UINT8,
            Model::Uint16 => ValueType::UINT16,
            Model::Uint32 => ValueType::UINT32,
            Model::Uint64 => ValueType::UINT64,
            Model::Any => ValueType::all(),
            Model::Ref(_) => ValueType::REF,
            Model::List(_) => ValueType::LIST,
            Model::Set(_) => ValueType::SET,
            Model::Map(_) => ValueType::MAP,
            Model::Tuple(_) => ValueType::TUPLE,
            Model::Struct(_) => ValueType::STRUCT,
            Model::Union(_) => ValueType::UNION,
            Model::Enum(_) => ValueType::SYMBOL,
            Model::Or(l, r) => l.value_type_in(seen) | r.value_type_in(seen),
            Model::Unique(inner) | Model::Annotation(_, inner) => inner.value_type_in(seen),
            Model::Recursion(node) => {
                if !seen.insert(node.id()) {
                    return ValueType::empty();
                }
                node.try_inner()
                    .map_or(ValueType::empty(), |inner| inner.value_type_in(seen))
            }
        }
    }

    /// Returns true if the model accepts null.
    pub fn nullable(&self) -> bool {
        self.value_type().contains(ValueType::NULL)
    }

    /// Returns true if [`Model::zero`] can produce a default value.
    pub fn zeroable(&self) -> bool {
        self.zeroable_in(&mut FxHashSet::default())
    }

    fn zeroable_in(&self, path: &mut FxHashSet<usize>) -> bool {
        match self {
            Model::Any | Model::Ref(_) | Model::Union(_) | Model::Enum(_) => false,
            Model::Tuple(elements) => elements.iter().all(|m| m.zeroable_in(path)),
            Model::Struct(fields) => fields.iter().all(|(_, m)| m.zeroable_in(path)),
            Model::Or(l, r) => l.zeroable_in(path) || r.zeroable_in(path),
            Model::Unique(inner) | Model::Annotation(_, inner) => inner.zeroable_in(path),
            Model::Recursion(node) => {
                let Some(inner) = node.try_inner() else {
                    return false;
                };
                if !path.insert(node.id()) {
                    return false;
                }
                let zeroable = inner.zeroable_in(path);
                path.remove(&node.id());
                zeroable
            }
            _ => true,
        }
    }

    /// Returns the default value of this model, if it has one.
    pub fn try_zero(&self) -> Option<Value> {
        self.zero_in(&mut FxHashSet::default())
    }

    /// Returns the default value of this model.
    ///
    /// # Panics
    ///
    /// Panics if the model is not [`zeroable`](Model::zeroable). Callers
    /// must check first; asking for the zero of `Any` or `Ref` is a bug.
    pub fn zero(&self) -> Value {
        match self.try_zero() {
            Some(v) => v,
            None => panic!("zero() called on non-zeroable model {self}"),
        }
    }

    fn zero_in(&self, path: &mut FxHashSet<usize>) -> Option<Value> {
        let v = match self {
            Model::Null => Value::Null,
            Model::Bool => Value::Bool(false),
            Model::Float => Value::Float(0.0),
            Model::String => Value::String(String::new()),
            Model::DateTime => Value::DateTime(DateTime::UNIX_EPOCH),
            Model::Int8 => Value::Int8(0),
            Model::Int16 => Value::Int16(0),
            Model::Int32 => Value::Int32(0),
            Model::Int64 => Value::Int64(0),
            Model::Uint8 => Value::Uint8(0),
            Model::Uint16 => Value::Uint16(0),
            Model::Uint32 => Value::Uint32(0),
            Model::Uint64 => Value::Uint64(0),
            Model::Any | Model::Ref(_) | Model::Union(_) | Model::Enum(_) => return None,
            Model::List(_) => Value::List(Vec::new()),
            Model::Set(_) => Value::Set(ValueSet::new()),
            Model::Map(_) => Value::Map(SortedMap::new()),
            Model::Tuple(elements) => Value::Tuple(
                elements
                    .iter()
                    .map(|m| m.zero_in(path))
                    .collect::<Option<Vec<_>>>()?,
            ),
            Model::Struct(fields) => {
                let mut out = SortedMap::with_capacity(fields.len());
                for (name, m) in fields.iter() {
                    out.set(name, m.zero_in(path)?);
                }
                Value::Struct(out)
            }
            Model::Or(l, r) => return l.zero_in(path).or_else(|| r.zero_in(path)),
            Model::Unique(inner) | Model::Annotation(_, inner) => return inner.zero_in(path),
            Model::Recursion(node) => {
                let inner = node.try_inner()?;
                if !path.insert(node.id()) {
                    return None;
                }
                let zero = inner.zero_in(path);
                path.remove(&node.id());
                return zero;
            }
        };
        Some(v)
    }

    fn eq_in(&self, other: &Model, assumed: &mut FxHashSet<(usize, usize)>) -> bool {
        match (self, other) {
            (Model::Null, Model::Null)
            | (Model::Bool, Model::Bool)
            | (Model::Float, Model::Float)
            | (Model::String, Model::String)
            | (Model::DateTime, Model::DateTime)
            | (Model::Int8, Model::Int8)
            | (Model::Int16, Model::Int16)
            | (Model::Int32, Model::Int32)
            | (Model::Int64, Model::Int64)
            | (Model::Uint8, Model::Uint8)
            | (Model::Uint16, Model::Uint16)
            | (Model::Uint32, Model::Uint32)
            | (Model::Uint64, Model::Uint64)
            | (Model::Any, Model::Any) => true,
            (Model::Ref(a), Model::Ref(b)) => a == b,
            (Model::List(a), Model::List(b))
            | (Model::Set(a), Model::Set(b))
            | (Model::Map(a), Model::Map(b))
            | (Model::Unique(a), Model::Unique(b)) => a.eq_in(b, assumed),
            (Model::Tuple(a), Model::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_in(y, assumed))
            }
            (Model::Struct(a), Model::Struct(b)) | (Model::Union(a), Model::Union(b)) => {
                a.same_keys(b)
                    && a.iter()
                        .zip(b.iter())
                        .all(|((_, x), (_, y))| x.eq_in(y, assumed))
            }
            (Model::Enum(a), Model::Enum(b)) => a == b,
            (Model::Or(al, ar), Model::Or(bl, br)) => al.eq_in(bl, assumed) && ar.eq_in(br, assumed),
            (Model::Annotation(ta, a), Model::Annotation(tb, b)) => ta == tb && a.eq_in(b, assumed),
            (Model::Recursion(a), Model::Recursion(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                // Pairs already under comparison are assumed equal; any
                // actual difference still surfaces elsewhere in the walk.
                if !assumed.insert((a.id(), b.id())) {
                    return true;
                }
                // Labels only name a node for encoding and display.
                match (a.try_inner(), b.try_inner()) {
                    (Some(x), Some(y)) => x.eq_in(y, assumed),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn fmt_in(&self, f: &mut fmt::Formatter<'_>, open: &mut FxHashSet<usize>) -> fmt::Result {
        match self {
            Model::Ref(target) if target.is_empty() => f.write_str("ref"),
            Model::Ref(target) => write!(f, "ref<{target}>"),
            Model::List(e) | Model::Set(e) | Model::Map(e) | Model::Unique(e) => {
                write!(f, "{}<", self.case_name())?;
                e.fmt_in(f, open)?;
                f.write_str(">")
            }
            Model::Tuple(elements) => {
                f.write_str("tuple(")?;
                for (i, m) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    m.fmt_in(f, open)?;
                }
                f.write_str(")")
            }
            Model::Struct(fields) | Model::Union(fields) => {
                write!(f, "{}{{", self.case_name())?;
                for (i, (name, m)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: ")?;
                    m.fmt_in(f, open)?;
                }
                f.write_str("}")
            }
            Model::Enum(symbols) => {
                f.write_str("enum{")?;
                for (i, s) in symbols.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(s)?;
                }
                f.write_str("}")
            }
            Model::Or(..) => {
                for (i, m) in unroll_or(self).into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    m.fmt_in(f, open)?;
                }
                Ok(())
            }
            Model::Annotation(tag, inner) => {
                write!(f, "@{tag:?} ")?;
                inner.fmt_in(f, open)
            }
            Model::Recursion(node) => {
                if !open.insert(node.id()) {
                    return write!(f, "^{}", node.label());
                }
                write!(f, "rec {} = ", node.label())?;
                match node.try_inner() {
                    Some(inner) => inner.fmt_in(f, open),
                    None => f.write_str("?"),
                }
            }
            leaf => f.write_str(leaf.case_name()),
        }
    }
}

impl PartialEq for Model {
    /// Structural equality. Recursion nodes are matched coinductively and
    /// without regard to their labels, so independently built but
    /// identically shaped cyclic models compare equal.
    fn eq(&self, other: &Self) -> bool {
        self.eq_in(other, &mut FxHashSet::default())
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_in(f, &mut FxHashSet::default())
    }
}

impl From<Rc<Recursion>> for Model {
    fn from(node: Rc<Recursion>) -> Self {
        Model::Recursion(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked_list(label: &str) -> Rc<Recursion> {
        Recursion::build(label, |this| {
            Model::optional(Model::structure([
                ("head", Model::Int64),
                ("tail", Model::Recursion(this.clone())),
            ]))
        })
    }

    #[test]
    fn test_value_type_of_or_is_union_of_branches() {
        let m = Model::or(Model::String, Model::or(Model::Int64, Model::Null));
        assert_eq!(
            m.value_type(),
            ValueType::STRING | ValueType::INT64 | ValueType::NULL
        );
        assert!(m.nullable());
        assert_eq!(Model::Any.value_type(), ValueType::all());
        assert_eq!(Model::enumeration(["a"]).value_type(), ValueType::SYMBOL);
    }

    #[test]
    fn test_value_type_through_recursion() {
        let m = Model::Recursion(linked_list("node"));
        assert_eq!(m.value_type(), ValueType::STRUCT | ValueType::NULL);
    }

    #[test]
    fn test_concrete_strips_wrappers() {
        let m = Model::annotation("doc", Model::unique(Model::annotation("x", Model::String)));
        assert!(matches!(m.concrete(), Model::String));
        assert!(m.is_unique());
        assert!(matches!(Model::list(Model::Null).concrete(), Model::List(_)));
    }

    #[test]
    fn test_zero_values() {
        let m = Model::structure([
            ("name", Model::String),
            ("count", Model::Uint32),
            ("tags", Model::set(Model::String)),
            ("pair", Model::tuple([Model::Bool, Model::Float])),
        ]);
        assert!(m.zeroable());
        assert_eq!(
            m.zero(),
            Value::structure([
                ("name", Value::string("")),
                ("count", Value::Uint32(0)),
                ("tags", Value::Set(ValueSet::new())),
                ("pair", Value::Tuple(vec![Value::Bool(false), Value::Float(0.0)])),
            ])
        );
    }

    #[test]
    fn test_not_zeroable() {
        assert!(!Model::Any.zeroable());
        assert!(!Model::reference("users").zeroable());
        assert!(!Model::structure([("owner", Model::reference("users"))]).zeroable());
        assert!(Model::optional(Model::reference("users")).zeroable());
        assert_eq!(Model::optional(Model::Any).zero(), Value::Null);
    }

    #[test]
    #[should_panic(expected = "non-zeroable")]
    fn test_zero_of_any_panics() {
        Model::Any.zero();
    }

    #[test]
    fn test_recursive_zero() {
        // The struct branch needs a tail, so only the null branch terminates.
        let list = Model::Recursion(linked_list("node"));
        assert!(list.zeroable());
        assert_eq!(list.zero(), Value::Null);

        // A struct that always contains itself has no finite default.
        let endless = Recursion::build("endless", |this| {
            Model::structure([("next", Model::Recursion(this.clone()))])
        });
        assert!(!Model::Recursion(endless).zeroable());
    }

    #[test]
    fn test_structural_equality_of_cycles() {
        let a = Model::Recursion(linked_list("node"));
        let b = Model::Recursion(linked_list("node"));
        let renamed = Model::Recursion(linked_list("other"));
        let c = Model::Recursion(Recursion::build("node", |this| {
            Model::optional(Model::structure([
                ("head", Model::String),
                ("tail", Model::Recursion(this.clone())),
            ]))
        }));
        assert_eq!(a, b);
        assert_eq!(a, renamed);
        assert_ne!(a, c);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_display() {
        let m = Model::structure([
            ("name", Model::String),
            ("tags", Model::set(Model::String)),
        ]);
        assert_eq!(m.to_string(), "struct{name: string, tags: set<string>}");

        let rec = Model::Recursion(Recursion::build("t", |this| {
            Model::list(Model::Recursion(this.clone()))
        }));
        assert_eq!(rec.to_string(), "rec t = list<^t>");
        assert_eq!(
            Model::or(Model::String, Model::or(Model::Null, Model::Bool)).to_string(),
            "string | null | bool"
        );
    }
}
