//! Conformance of values to models.
//!
//! Decoding guarantees that a model is well formed; this module checks
//! that a value actually has the shape a model describes.
//!
//! Struct fields whose model is [`zeroable`](Model::zeroable) may be
//! omitted: storage fills them with their zero value on read. Every other
//! field must be present, and fields the model does not name are rejected.

use rustc_hash::FxHashSet;

use crate::error::{PathElement, ValidationError, ValidationErrorKind};
use crate::model::{Model, unroll_or};
use crate::value::{SortedMap, Value};

/// Checks that `value` conforms to `model`.
///
/// `Meta` envelopes are unwrapped. The first violation found is returned
/// with the path leading to it.
pub fn validate_value(model: &Model, value: &Value) -> Result<(), ValidationError> {
    Validator::default().check(model, value)
}

impl Model {
    /// Checks that `value` conforms to this model; see [`validate_value`].
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        validate_value(self, value)
    }
}

#[derive(Default)]
struct Validator {
    /// Recursion nodes currently being checked against a given value.
    active: FxHashSet<(usize, usize)>,
}

impl Validator {
    fn check(&mut self, model: &Model, value: &Value) -> Result<(), ValidationError> {
        let value = value.unwrap_meta();
        match (model, value) {
            (Model::Any, _) => Ok(()),
            (Model::Annotation(_, inner), _) => self.check(inner, value),
            // Distinctness is a property of siblings, checked by the container.
            (Model::Unique(inner), _) => self.check(inner, value),
            (Model::Recursion(node), _) => {
                let key = (node.id(), value as *const Value as usize);
                if !self.active.insert(key) {
                    return Err(ValidationError::new(
                        ValidationErrorKind::UnproductiveRecursion {
                            label: node.label().to_string(),
                        },
                    ));
                }
                let result = self.check(node.inner(), value);
                self.active.remove(&key);
                result
            }
            (Model::Or(..), _) => {
                for branch in unroll_or(model) {
                    if self.check(branch, value).is_ok() {
                        return Ok(());
                    }
                }
                Err(ValidationError::new(ValidationErrorKind::NoAlternative))
            }

            (Model::Null, Value::Null)
            | (Model::Bool, Value::Bool(_))
            | (Model::Float, Value::Float(_))
            | (Model::String, Value::String(_))
            | (Model::DateTime, Value::DateTime(_))
            | (Model::Int8, Value::Int8(_))
            | (Model::Int16, Value::Int16(_))
            | (Model::Int32, Value::Int32(_))
            | (Model::Int64, Value::Int64(_))
            | (Model::Uint8, Value::Uint8(_))
            | (Model::Uint16, Value::Uint16(_))
            | (Model::Uint32, Value::Uint32(_))
            | (Model::Uint64, Value::Uint64(_)) => Ok(()),

            (Model::Ref(target), Value::Ref(r)) => {
                if target.is_empty() || &r.model == target {
                    Ok(())
                } else {
                    Err(ValidationError::new(ValidationErrorKind::RefTargetMismatch {
                        expected: target.clone(),
                        found: r.model.clone(),
                    }))
                }
            }
            (Model::Enum(symbols), Value::Symbol(s)) => {
                if symbols.contains(s) {
                    Ok(())
                } else {
                    Err(ValidationError::new(ValidationErrorKind::UnknownSymbol {
                        symbol: s.clone(),
                    }))
                }
            }

            (Model::List(element), Value::List(items)) => self.check_elements(
                element,
                items.iter().enumerate().map(|(i, v)| (PathElement::ListIndex(i), v)),
            ),
            // Set members are already distinct by hash.
            (Model::Set(element), Value::Set(items)) => {
                for (i, item) in items.iter().enumerate() {
                    self.check(element, item)
                        .map_err(|e| e.append_path(PathElement::ListIndex(i)))?;
                }
                Ok(())
            }
            (Model::Map(element), Value::Map(entries)) => self.check_elements(
                element,
                entries
                    .iter()
                    .map(|(k, v)| (PathElement::MapKey(k.to_string()), v)),
            ),
            (Model::Tuple(elements), Value::Tuple(items)) => {
                if elements.len() != items.len() {
                    return Err(ValidationError::new(ValidationErrorKind::ArityMismatch {
                        expected: elements.len(),
                        found: items.len(),
                    }));
                }
                for (i, (m, item)) in elements.iter().zip(items).enumerate() {
                    self.check(m, item)
                        .map_err(|e| e.append_path(PathElement::ListIndex(i)))?;
                }
                Ok(())
            }
            (Model::Struct(fields), Value::Struct(values)) => self.check_fields(fields, values),
            (Model::Union(cases), Value::Union(case, payload)) => match cases.get(case) {
                Some(m) => self
                    .check(m, payload)
                    .map_err(|e| e.append_path(PathElement::UnionCase(case.clone()))),
                None => Err(ValidationError::new(ValidationErrorKind::UnknownCase {
                    case: case.clone(),
                })),
            },

            _ => Err(ValidationError::new(ValidationErrorKind::TypeMismatch {
                expected: model.value_type(),
                found: value.value_type(),
            })),
        }
    }

    /// Checks list or map members, and their distinctness when the element
    /// model is unique.
    fn check_elements<'v, I>(&mut self, element: &Model, items: I) -> Result<(), ValidationError>
    where
        I: Iterator<Item = (PathElement, &'v Value)>,
    {
        let unique = element.is_unique();
        let mut seen = FxHashSet::default();
        for (at, item) in items {
            if let Err(e) = self.check(element, item) {
                return Err(e.append_path(at));
            }
            if unique && !seen.insert(item.unwrap_meta().hash64()) {
                return Err(ValidationError::new(ValidationErrorKind::DuplicateValue).append_path(at));
            }
        }
        Ok(())
    }

    fn check_fields(
        &mut self,
        fields: &SortedMap<Model>,
        values: &SortedMap<Value>,
    ) -> Result<(), ValidationError> {
        for (name, m) in fields.iter() {
            match values.get(name) {
                Some(v) => self
                    .check(m, v)
                    .map_err(|e| e.append_path(PathElement::StructField(name.to_string())))?,
                None if m.zeroable() => {}
                None => {
                    return Err(ValidationError::new(ValidationErrorKind::MissingField {
                        field: name.to_string(),
                    }));
                }
            }
        }
        for name in values.keys() {
            if !fields.contains_key(&name) {
                return Err(ValidationError::new(ValidationErrorKind::UnexpectedField {
                    field: name,
                }));
            }
        }
        Ok(())
    }
}
