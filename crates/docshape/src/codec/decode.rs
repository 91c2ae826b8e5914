//! Value to model decoding.

use std::collections::BTreeSet;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{ParseError, ParseErrorKind, PathElement};
use crate::limits::{MAX_DECODE_DEPTH, MAX_NAME_LEN};
use crate::model::{Model, Recursion, reaches_itself, roll_or};
use crate::value::{SortedMap, Value};

/// Options for decoding encoded models.
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Maximum nesting of model cases.
    pub max_depth: usize,

    /// Maximum length of labels, field names, case names, enum symbols and
    /// annotation tags.
    pub max_name_len: usize,

    /// Accept the legacy `int` and `uint` cases as `int64` and `uint64`.
    ///
    /// Models written before sized integers existed use these cases. New
    /// writers never emit them.
    pub legacy_aliases: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: MAX_DECODE_DEPTH,
            max_name_len: MAX_NAME_LEN,
            legacy_aliases: true,
        }
    }
}

impl DecodeOptions {
    /// Creates default decoding options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options that reject legacy case aliases.
    pub fn strict() -> Self {
        Self {
            legacy_aliases: false,
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Recursion labels visible to `recurse` cases.
///
/// The decoder adds a label while decoding the body of the `recursion` or
/// `recursive` case defining it and removes it afterwards. Callers may
/// pre-register nodes so that an encoded model can refer to them.
#[derive(Debug, Clone, Default)]
pub struct RecursionLabels {
    nodes: FxHashMap<String, Rc<Recursion>>,
}

impl RecursionLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `node` under its label. Returns false, leaving the
    /// registry unchanged, if the label is already taken.
    pub fn define(&mut self, node: Rc<Recursion>) -> bool {
        if self.nodes.contains_key(node.label()) {
            return false;
        }
        self.nodes.insert(node.label().to_string(), node);
        true
    }

    pub fn get(&self, label: &str) -> Option<&Rc<Recursion>> {
        self.nodes.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.nodes.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn remove(&mut self, label: &str) {
        self.nodes.remove(label);
    }
}

/// Decodes a model from its `Union` encoding.
///
/// `root_model_id` must match the collection every `ref` case points into.
///
/// ```
/// use docshape::{Model, model_from_value, value_from_model, DecodeOptions};
///
/// let model = Model::list(Model::optional(Model::String));
/// let encoded = value_from_model("models", &model);
/// let decoded = model_from_value("models", &encoded, &DecodeOptions::default()).unwrap();
/// assert_eq!(decoded, model);
/// ```
pub fn model_from_value(
    root_model_id: &str,
    value: &Value,
    options: &DecodeOptions,
) -> Result<Model, ParseError> {
    model_from_value_with_labels(root_model_id, value, &mut RecursionLabels::new(), options)
}

/// Decodes a model, resolving `recurse` cases against `labels` as well as
/// the labels the encoding defines itself.
///
/// `labels` is left as it was passed in, on success and on failure.
pub fn model_from_value_with_labels(
    root_model_id: &str,
    value: &Value,
    labels: &mut RecursionLabels,
    options: &DecodeOptions,
) -> Result<Model, ParseError> {
    let mut decoder = Decoder {
        root: root_model_id,
        labels,
        options,
        depth: 0,
    };
    decoder.decode(value).inspect_err(|e| {
        debug!(code = e.code(), path = %e.path, "rejected encoded model: {}", e.kind);
    })
}

struct Decoder<'a> {
    root: &'a str,
    labels: &'a mut RecursionLabels,
    options: &'a DecodeOptions,
    depth: usize,
}

impl Decoder<'_> {
    fn decode(&mut self, value: &Value) -> Result<Model, ParseError> {
        let Value::Union(case, payload) = value.unwrap_meta() else {
            return Err(ParseError::unexpected("a union", value));
        };
        if self.depth >= self.options.max_depth {
            return Err(ParseError::new(
                ParseErrorKind::DepthLimitExceeded {
                    max: self.options.max_depth,
                },
                value,
            ));
        }

        self.depth += 1;
        let result = self.decode_case(case, payload);
        self.depth -= 1;
        result.map_err(|e| e.append_path(PathElement::UnionCase(case.clone())))
    }

    fn decode_case(&mut self, case: &str, payload: &Value) -> Result<Model, ParseError> {
        let model = match case {
            // Leaf payloads carry nothing and are not inspected.
            "null" => Model::Null,
            "bool" => Model::Bool,
            "float" => Model::Float,
            "string" => Model::String,
            "dateTime" => Model::DateTime,
            "int8" => Model::Int8,
            "int16" => Model::Int16,
            "int32" => Model::Int32,
            "int64" => Model::Int64,
            "uint8" => Model::Uint8,
            "uint16" => Model::Uint16,
            "uint32" => Model::Uint32,
            "uint64" => Model::Uint64,
            "any" => Model::Any,
            "int" | "uint" => {
                if !self.options.legacy_aliases {
                    return Err(ParseError::new(
                        ParseErrorKind::LegacyAlias {
                            case: case.to_string(),
                        },
                        payload,
                    ));
                }
                if case == "int" { Model::Int64 } else { Model::Uint64 }
            }
            "ref" => self.decode_ref(payload)?,
            "list" => Model::list(self.decode(payload)?),
            "set" => Model::set(self.decode(payload)?),
            "map" => Model::map(self.decode(payload)?),
            "optional" => Model::optional(self.decode(payload)?),
            "unique" => {
                let inner = self.decode(payload)?;
                if inner.is_unique() {
                    return Err(ParseError::new(ParseErrorKind::NestedUnique, payload));
                }
                Model::unique(inner)
            }
            "tuple" => Model::Tuple(self.decode_list(payload)?),
            "struct" => Model::Struct(self.decode_named(payload)?),
            "union" => Model::Union(self.decode_named(payload)?),
            "enum" => self.decode_enum(payload)?,
            "annotation" => {
                let fields = expect_struct(payload)?;
                let tag = self.name_field(fields, "value", payload)?;
                let inner = self.decode_field(fields, "model", payload)?;
                Model::annotation(tag, inner)
            }
            "or" => {
                let alternatives = self.decode_list(payload)?;
                match roll_or(alternatives) {
                    Some(m) => m,
                    None => return Err(ParseError::new(ParseErrorKind::EmptyOr, payload)),
                }
            }
            "recursion" => self.decode_recursion(payload)?,
            "recursive" => self.decode_recursive(payload)?,
            "recurse" => {
                let label = payload
                    .as_str()
                    .ok_or_else(|| ParseError::unexpected("a string", payload))?;
                match self.labels.get(label) {
                    Some(node) => Model::Recursion(node.clone()),
                    None => {
                        return Err(ParseError::new(
                            ParseErrorKind::UndefinedRecursionLabel {
                                label: label.to_string(),
                            },
                            payload,
                        ));
                    }
                }
            }
            other => {
                return Err(ParseError::new(
                    ParseErrorKind::UnknownCase {
                        case: other.to_string(),
                    },
                    payload,
                ));
            }
        };
        Ok(model)
    }

    fn decode_ref(&self, payload: &Value) -> Result<Model, ParseError> {
        let Value::Ref(r) = payload else {
            return Err(ParseError::unexpected("a ref", payload));
        };
        if r.model != self.root {
            return Err(ParseError::new(
                ParseErrorKind::ForeignRef {
                    expected: self.root.to_string(),
                    found: r.model.clone(),
                },
                payload,
            ));
        }
        Ok(Model::Ref(r.id.clone()))
    }

    fn decode_list(&mut self, payload: &Value) -> Result<Vec<Model>, ParseError> {
        let Value::List(items) = payload else {
            return Err(ParseError::unexpected("a list", payload));
        };
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let m = self
                .decode(item)
                .map_err(|e| e.append_path(PathElement::ListIndex(i)))?;
            out.push(m);
        }
        Ok(out)
    }

    fn decode_named(&mut self, payload: &Value) -> Result<SortedMap<Model>, ParseError> {
        let Value::Map(entries) = payload else {
            return Err(ParseError::unexpected("a map", payload));
        };
        let mut out = SortedMap::with_capacity(entries.len());
        for (name, item) in entries.iter() {
            self.check_name("name", name, payload)
                .map_err(|e| e.append_path(PathElement::MapKey(name.to_string())))?;
            let m = self
                .decode(item)
                .map_err(|e| e.append_path(PathElement::MapKey(name.to_string())))?;
            out.set(name, m);
        }
        Ok(out)
    }

    fn decode_enum(&self, payload: &Value) -> Result<Model, ParseError> {
        let Value::Set(items) = payload else {
            return Err(ParseError::unexpected("a set", payload));
        };
        let mut symbols = BTreeSet::new();
        for (i, item) in items.iter().enumerate() {
            let symbol = item.as_str().ok_or_else(|| {
                ParseError::unexpected("a string", item).append_path(PathElement::ListIndex(i))
            })?;
            self.check_name("symbol", symbol, item)?;
            symbols.insert(symbol.to_string());
        }
        if symbols.is_empty() {
            return Err(ParseError::new(ParseErrorKind::EmptyEnum, payload));
        }
        Ok(Model::Enum(symbols))
    }

    fn decode_recursion(&mut self, payload: &Value) -> Result<Model, ParseError> {
        let fields = expect_struct(payload)?;
        let label = self.name_field(fields, "label", payload)?;
        let body = fields.get("model").ok_or_else(|| {
            ParseError::new(ParseErrorKind::MissingField { field: "model" }, payload)
        })?;

        let node = self.define(&label, payload)?;
        let result = self.decode(body);
        self.labels.remove(&label);
        let inner = result.map_err(|e| e.append_path(PathElement::StructField("model".into())))?;

        node.close(inner);
        debug!(label = %label, "closed recursion");
        if reaches_itself(&node) {
            return Err(ParseError::new(ParseErrorKind::InfiniteRecursion { label }, payload));
        }
        Ok(Model::Recursion(node))
    }

    fn decode_recursive(&mut self, payload: &Value) -> Result<Model, ParseError> {
        let fields = expect_struct(payload)?;
        let top = self.name_field(fields, "top", payload)?;
        let bodies = match fields.get("models") {
            Some(Value::Map(bodies)) => bodies,
            Some(other) => {
                return Err(ParseError::unexpected("a map", other)
                    .append_path(PathElement::StructField("models".into())));
            }
            None => {
                return Err(ParseError::new(
                    ParseErrorKind::MissingField { field: "models" },
                    payload,
                ));
            }
        };
        if !bodies.contains_key(&top) {
            return Err(ParseError::new(
                ParseErrorKind::UndefinedTopLabel { label: top },
                payload,
            ));
        }

        let mut nodes = Vec::with_capacity(bodies.len());
        for (label, _) in bodies.iter() {
            match self.define(label, payload) {
                Ok(node) => nodes.push(node),
                Err(e) => {
                    self.forget(&nodes);
                    return Err(e.append_path(PathElement::StructField("models".into())));
                }
            }
        }

        let mut inners = Vec::with_capacity(nodes.len());
        for (label, body) in bodies.iter() {
            match self.decode(body) {
                Ok(m) => inners.push(m),
                Err(e) => {
                    self.forget(&nodes);
                    return Err(e
                        .append_path(PathElement::MapKey(label.to_string()))
                        .append_path(PathElement::StructField("models".into())));
                }
            }
        }
        self.forget(&nodes);

        for (node, inner) in nodes.iter().zip(inners) {
            node.close(inner);
            debug!(label = node.label(), "closed recursion");
        }
        for node in &nodes {
            if reaches_itself(node) {
                return Err(ParseError::new(
                    ParseErrorKind::InfiniteRecursion {
                        label: node.label().to_string(),
                    },
                    payload,
                ));
            }
        }

        match nodes.into_iter().find(|n| n.label() == top) {
            Some(node) => Ok(Model::Recursion(node)),
            None => Err(ParseError::new(ParseErrorKind::UndefinedTopLabel { label: top }, payload)),
        }
    }

    /// Registers a placeholder node for `label`.
    fn define(&mut self, label: &str, at: &Value) -> Result<Rc<Recursion>, ParseError> {
        self.check_name("label", label, at)?;
        let node = Recursion::placeholder(label);
        if !self.labels.define(node.clone()) {
            return Err(ParseError::new(
                ParseErrorKind::DuplicateRecursionLabel {
                    label: label.to_string(),
                },
                at,
            ));
        }
        Ok(node)
    }

    fn forget(&mut self, nodes: &[Rc<Recursion>]) {
        for node in nodes {
            self.labels.remove(node.label());
        }
    }

    fn decode_field(
        &mut self,
        fields: &SortedMap<Value>,
        field: &'static str,
        payload: &Value,
    ) -> Result<Model, ParseError> {
        let value = fields
            .get(field)
            .ok_or_else(|| ParseError::new(ParseErrorKind::MissingField { field }, payload))?;
        self.decode(value)
            .map_err(|e| e.append_path(PathElement::StructField(field.into())))
    }

    fn name_field(
        &self,
        fields: &SortedMap<Value>,
        field: &'static str,
        payload: &Value,
    ) -> Result<String, ParseError> {
        let value = fields
            .get(field)
            .ok_or_else(|| ParseError::new(ParseErrorKind::MissingField { field }, payload))?;
        let name = value.as_str().ok_or_else(|| {
            ParseError::unexpected("a string", value)
                .append_path(PathElement::StructField(field.into()))
        })?;
        self.check_name(field, name, value)
            .map_err(|e| e.append_path(PathElement::StructField(field.into())))?;
        Ok(name.to_string())
    }

    fn check_name(&self, field: &'static str, name: &str, at: &Value) -> Result<(), ParseError> {
        if name.len() > self.options.max_name_len {
            return Err(ParseError::new(
                ParseErrorKind::LengthExceedsLimit {
                    field,
                    len: name.len(),
                    max: self.options.max_name_len,
                },
                at,
            ));
        }
        Ok(())
    }
}

fn expect_struct(payload: &Value) -> Result<&SortedMap<Value>, ParseError> {
    match payload {
        Value::Struct(fields) => Ok(fields),
        other => Err(ParseError::unexpected("a struct", other)),
    }
}
