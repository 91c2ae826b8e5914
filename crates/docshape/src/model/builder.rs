//! Builder API for struct and union models.
//!
//! # Example
//!
//! ```rust
//! use docshape::model::builder::StructBuilder;
//! use docshape::Model;
//!
//! let person = StructBuilder::new()
//!     .field("name", Model::String)
//!     .optional("email", Model::String)
//!     .unique("handle", Model::String)
//!     .list("tags", Model::String)
//!     .build();
//!
//! assert_eq!(person.to_string(), "struct{email: string | null, handle: unique<string>, name: string, tags: list<string>}");
//! ```

use crate::model::Model;
use crate::value::SortedMap;

/// Builder for `Model::Struct`.
///
/// Fields are kept in name order; adding a field twice replaces it.
#[derive(Debug, Clone, Default)]
pub struct StructBuilder {
    fields: SortedMap<Model>,
}

impl StructBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    pub fn field(mut self, name: impl Into<String>, model: Model) -> Self {
        self.fields.set(name, model);
        self
    }

    /// Adds a field that may also be null.
    pub fn optional(self, name: impl Into<String>, model: Model) -> Self {
        self.field(name, Model::optional(model))
    }

    /// Adds a field whose values must be distinct among siblings.
    pub fn unique(self, name: impl Into<String>, model: Model) -> Self {
        self.field(name, Model::unique(model))
    }

    /// Adds a field holding a list of `element`.
    pub fn list(self, name: impl Into<String>, element: Model) -> Self {
        self.field(name, Model::list(element))
    }

    /// Adds a reference field pointing at records of `target`.
    pub fn reference(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.field(name, Model::reference(target))
    }

    /// Adds a nested struct field using a builder function.
    pub fn nested<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(StructBuilder) -> StructBuilder,
    {
        let inner = f(StructBuilder::new()).build();
        self.field(name, inner)
    }

    /// Returns the number of fields added so far.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn build(self) -> Model {
        Model::Struct(self.fields)
    }
}

/// Builder for `Model::Union`.
#[derive(Debug, Clone, Default)]
pub struct UnionBuilder {
    cases: SortedMap<Model>,
}

impl UnionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a case carrying a payload of `model`.
    pub fn case(mut self, name: impl Into<String>, model: Model) -> Self {
        self.cases.set(name, model);
        self
    }

    /// Adds a case without payload, encoded with a null payload.
    pub fn tag(self, name: impl Into<String>) -> Self {
        self.case(name, Model::Null)
    }

    /// Adds a case whose payload is a struct, using a builder function.
    pub fn struct_case<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(StructBuilder) -> StructBuilder,
    {
        let payload = f(StructBuilder::new()).build();
        self.case(name, payload)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn build(self) -> Model {
        Model::Union(self.cases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_struct_builder() {
        let model = StructBuilder::new()
            .field("id", Model::Uint64)
            .optional("nickname", Model::String)
            .reference("owner", "users")
            .nested("address", |a| a.field("city", Model::String).field("zip", Model::String))
            .build();

        assert_eq!(
            model,
            Model::structure([
                ("address", Model::structure([("city", Model::String), ("zip", Model::String)])),
                ("id", Model::Uint64),
                ("nickname", Model::or(Model::String, Model::Null)),
                ("owner", Model::reference("users")),
            ])
        );
    }

    #[test]
    fn test_struct_builder_replaces_field() {
        let builder = StructBuilder::new()
            .field("a", Model::Bool)
            .field("a", Model::Float);
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.build(), Model::structure([("a", Model::Float)]));
        assert!(StructBuilder::new().is_empty());
    }

    #[test]
    fn test_union_builder() {
        let event = UnionBuilder::new()
            .tag("logout")
            .case("login", Model::DateTime)
            .struct_case("rename", |s| s.field("from", Model::String).field("to", Model::String))
            .build();

        assert!(event.validate(&Value::union("logout", Value::Null)).is_ok());
        assert!(
            event
                .validate(&Value::union(
                    "rename",
                    Value::structure([("from", Value::string("a")), ("to", Value::string("b"))])
                ))
                .is_ok()
        );
        assert!(event.validate(&Value::union("delete", Value::Null)).is_err());
    }
}
