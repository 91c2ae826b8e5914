//! Error types for model decoding and value validation.

use std::fmt;

use thiserror::Error;

use crate::value::{Value, ValueType};

/// One step of a structural location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// The payload of a union case.
    UnionCase(String),
    /// A named struct field.
    StructField(String),
    /// An entry of a map.
    MapKey(String),
    /// A position in a list, tuple or set.
    ListIndex(usize),
}

impl PathElement {
    /// Encodes this step as a `Union` value.
    pub fn to_value(&self) -> Value {
        match self {
            PathElement::UnionCase(case) => Value::union("unionCase", Value::string(case.clone())),
            PathElement::StructField(field) => {
                Value::union("structField", Value::string(field.clone()))
            }
            PathElement::MapKey(key) => Value::union("mapKey", Value::string(key.clone())),
            PathElement::ListIndex(i) => Value::union("listIndex", Value::Int64(*i as i64)),
        }
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::UnionCase(case) => write!(f, "<{case}>"),
            PathElement::StructField(field) => write!(f, ".{field}"),
            PathElement::MapKey(key) => write!(f, "[{key:?}]"),
            PathElement::ListIndex(i) => write!(f, "[{i}]"),
        }
    }
}

/// A location inside a value, outermost step first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path(Vec<PathElement>);

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds an enclosing step. Errors grow their path while unwinding, so
    /// the newest step is the outermost one.
    pub fn prepend(&mut self, element: PathElement) {
        self.0.insert(0, element);
    }

    /// Encodes the path as a `List` of `Union` values.
    pub fn to_value(&self) -> Value {
        Value::List(self.0.iter().map(PathElement::to_value).collect())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for element in &self.0 {
            write!(f, "{element}")?;
        }
        Ok(())
    }
}

impl FromIterator<PathElement> for Path {
    fn from_iter<I: IntoIterator<Item = PathElement>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

/// Reason an encoded model was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("[M001] expected {expected}, found {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: ValueType,
    },

    #[error("[M002] unknown model case {case:?}")]
    UnknownCase { case: String },

    #[error("[M003] enum has no symbols")]
    EmptyEnum,

    #[error("[M004] or has no alternatives")]
    EmptyOr,

    #[error("[M005] unique cannot wrap another unique")]
    NestedUnique,

    #[error("[M006] undefined recursion label {label:?}")]
    UndefinedRecursionLabel { label: String },

    #[error("[M007] recursion label {label:?} is already defined")]
    DuplicateRecursionLabel { label: String },

    #[error("[M008] top label {label:?} is not among the recursive models")]
    UndefinedTopLabel { label: String },

    #[error("[M009] recursion {label:?} never reaches a value")]
    InfiniteRecursion { label: String },

    #[error("[M010] ref resolves against model {found:?}, expected {expected:?}")]
    ForeignRef { expected: String, found: String },

    #[error("[M011] model nesting exceeds depth limit {max}")]
    DepthLimitExceeded { max: usize },

    #[error("[M012] missing field {field:?}")]
    MissingField { field: &'static str },

    #[error("[M013] legacy case {case:?} is not accepted")]
    LegacyAlias { case: String },

    #[error("[M014] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

impl ParseErrorKind {
    /// Returns the stable error code (e.g. "M003").
    pub fn code(&self) -> &'static str {
        match self {
            ParseErrorKind::UnexpectedValue { .. } => "M001",
            ParseErrorKind::UnknownCase { .. } => "M002",
            ParseErrorKind::EmptyEnum => "M003",
            ParseErrorKind::EmptyOr => "M004",
            ParseErrorKind::NestedUnique => "M005",
            ParseErrorKind::UndefinedRecursionLabel { .. } => "M006",
            ParseErrorKind::DuplicateRecursionLabel { .. } => "M007",
            ParseErrorKind::UndefinedTopLabel { .. } => "M008",
            ParseErrorKind::InfiniteRecursion { .. } => "M009",
            ParseErrorKind::ForeignRef { .. } => "M010",
            ParseErrorKind::DepthLimitExceeded { .. } => "M011",
            ParseErrorKind::MissingField { .. } => "M012",
            ParseErrorKind::LegacyAlias { .. } => "M013",
            ParseErrorKind::LengthExceedsLimit { .. } => "M014",
        }
    }
}

/// Failure to decode a model from its value encoding.
///
/// Carries the location inside the encoded model and the offending
/// (sub)value.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {path}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub path: Path,
    pub value: Value,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, value: &Value) -> Self {
        Self {
            kind,
            path: Path::new(),
            value: value.clone(),
        }
    }

    /// Shorthand for [`ParseErrorKind::UnexpectedValue`].
    pub fn unexpected(expected: &'static str, value: &Value) -> Self {
        Self::new(
            ParseErrorKind::UnexpectedValue {
                expected,
                found: value.value_type(),
            },
            value,
        )
    }

    /// Records an enclosing location.
    pub fn append_path(mut self, element: PathElement) -> Self {
        self.path.prepend(element);
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// Reason a value does not conform to a model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationErrorKind {
    #[error("[V001] expected {expected}, found {found}")]
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
    },

    #[error("[V002] symbol {symbol:?} is not a member of the enum")]
    UnknownSymbol { symbol: String },

    #[error("[V003] missing field {field:?}")]
    MissingField { field: String },

    #[error("[V004] unexpected field {field:?}")]
    UnexpectedField { field: String },

    #[error("[V005] unknown union case {case:?}")]
    UnknownCase { case: String },

    #[error("[V006] tuple has {found} elements, expected {expected}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("[V007] ref points into model {found:?}, expected {expected:?}")]
    RefTargetMismatch { expected: String, found: String },

    #[error("[V008] value matches none of the alternatives")]
    NoAlternative,

    #[error("[V009] value is not unique among its siblings")]
    DuplicateValue,

    #[error("[V010] recursion {label:?} reaches itself without consuming the value")]
    UnproductiveRecursion { label: String },
}

impl ValidationErrorKind {
    /// Returns the stable error code (e.g. "V003").
    pub fn code(&self) -> &'static str {
        match self {
            ValidationErrorKind::TypeMismatch { .. } => "V001",
            ValidationErrorKind::UnknownSymbol { .. } => "V002",
            ValidationErrorKind::MissingField { .. } => "V003",
            ValidationErrorKind::UnexpectedField { .. } => "V004",
            ValidationErrorKind::UnknownCase { .. } => "V005",
            ValidationErrorKind::ArityMismatch { .. } => "V006",
            ValidationErrorKind::RefTargetMismatch { .. } => "V007",
            ValidationErrorKind::NoAlternative => "V008",
            ValidationErrorKind::DuplicateValue => "V009",
            ValidationErrorKind::UnproductiveRecursion { .. } => "V010",
        }
    }
}

/// A value that does not conform to a model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {path}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub path: Path,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind) -> Self {
        Self {
            kind,
            path: Path::new(),
        }
    }

    pub fn append_path(mut self, element: PathElement) -> Self {
        self.path.prepend(element);
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}
