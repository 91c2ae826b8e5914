//! Model to value encoding.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{Model, Recursion, unroll_or};
use crate::value::{RefValue, SortedMap, Value};

/// Encodes a model as a `Union` value.
///
/// `root_model_id` is the id of the collection models are stored in; `ref`
/// targets are written as references into it.
///
/// A recursion node that reaches no other recursion node is written as a
/// `recursion` case. One that does is written as a `recursive` group
/// defining every node it reaches, so that mutually recursive models keep
/// their sharing. Distinct nodes with the same label inside one group get a
/// numeric suffix.
///
/// # Panics
///
/// Panics on a recursion node that was never closed. Such nodes only exist
/// inside this crate while a model is being built.
pub fn value_from_model(root_model_id: &str, model: &Model) -> Value {
    Encoder {
        root: root_model_id,
        scope: FxHashMap::default(),
    }
    .encode(model)
}

struct Encoder<'a> {
    root: &'a str,
    /// Labels of the recursion nodes whose definition encloses the current
    /// position.
    scope: FxHashMap<usize, String>,
}

impl Encoder<'_> {
    fn encode(&mut self, model: &Model) -> Value {
        let payload = match model {
            Model::Null
            | Model::Bool
            | Model::Float
            | Model::String
            | Model::DateTime
            | Model::Int8
            | Model::Int16
            | Model::Int32
            | Model::Int64
            | Model::Uint8
            | Model::Uint16
            | Model::Uint32
            | Model::Uint64
            | Model::Any => Value::Struct(SortedMap::new()),
            Model::Ref(target) => Value::Ref(RefValue::new(self.root, target.clone())),
            Model::List(inner) | Model::Set(inner) | Model::Map(inner) | Model::Unique(inner) => {
                self.encode(inner)
            }
            Model::Tuple(elements) => {
                Value::List(elements.iter().map(|m| self.encode(m)).collect())
            }
            Model::Struct(fields) | Model::Union(fields) => {
                let mut out = SortedMap::with_capacity(fields.len());
                for (name, m) in fields.iter() {
                    out.set(name, self.encode(m));
                }
                Value::Map(out)
            }
            Model::Enum(symbols) => Value::set(symbols.iter().map(|s| Value::string(s.clone()))),
            Model::Annotation(tag, inner) => Value::structure([
                ("value", Value::string(tag.clone())),
                ("model", self.encode(inner)),
            ]),
            Model::Or(..) => Value::List(
                unroll_or(model)
                    .into_iter()
                    .map(|m| self.encode(m))
                    .collect(),
            ),
            Model::Recursion(node) => return self.encode_recursion(node),
        };
        Value::union(model.case_name(), payload)
    }

    fn encode_recursion(&mut self, node: &Rc<Recursion>) -> Value {
        if let Some(label) = self.scope.get(&node.id()) {
            return Value::union("recurse", Value::string(label.clone()));
        }

        let group = reachable_nodes(node, &self.scope);
        let mut used: FxHashSet<String> = self.scope.values().cloned().collect();
        let mut labels = Vec::with_capacity(group.len());
        for n in &group {
            let label = unique_label(n.label(), &used);
            used.insert(label.clone());
            self.scope.insert(n.id(), label.clone());
            labels.push(label);
        }

        let encoded = if group.len() == 1 {
            let inner = self.encode(node.inner());
            Value::union(
                "recursion",
                Value::structure([
                    ("label", Value::string(labels[0].clone())),
                    ("model", inner),
                ]),
            )
        } else {
            let mut models = SortedMap::with_capacity(group.len());
            for (n, label) in group.iter().zip(&labels) {
                let inner = self.encode(n.inner());
                models.set(label.clone(), inner);
            }
            Value::union(
                "recursive",
                Value::structure([
                    ("top", Value::string(labels[0].clone())),
                    ("models", Value::Map(models)),
                ]),
            )
        };

        for n in &group {
            self.scope.remove(&n.id());
        }
        encoded
    }
}

/// `start` followed by every other recursion node reachable from its inner
/// model that is not already in scope, in discovery order.
fn reachable_nodes(start: &Rc<Recursion>, scope: &FxHashMap<usize, String>) -> Vec<Rc<Recursion>> {
    let mut seen = FxHashSet::default();
    seen.insert(start.id());
    let mut found = vec![start.clone()];
    let mut next = 0;
    while next < found.len() {
        if let Some(inner) = found[next].try_inner() {
            let mut discovered = Vec::new();
            collect_nodes(inner, scope, &mut seen, &mut discovered);
            found.extend(discovered);
        }
        next += 1;
    }
    found
}

fn collect_nodes(
    model: &Model,
    scope: &FxHashMap<usize, String>,
    seen: &mut FxHashSet<usize>,
    out: &mut Vec<Rc<Recursion>>,
) {
    match model {
        Model::Recursion(node) => {
            if !scope.contains_key(&node.id()) && seen.insert(node.id()) {
                out.push(node.clone());
            }
        }
        Model::List(inner) | Model::Set(inner) | Model::Map(inner) | Model::Unique(inner) => {
            collect_nodes(inner, scope, seen, out)
        }
        Model::Annotation(_, inner) => collect_nodes(inner, scope, seen, out),
        Model::Or(l, r) => {
            collect_nodes(l, scope, seen, out);
            collect_nodes(r, scope, seen, out);
        }
        Model::Tuple(elements) => {
            for m in elements {
                collect_nodes(m, scope, seen, out);
            }
        }
        Model::Struct(fields) | Model::Union(fields) => {
            for (_, m) in fields.iter() {
                collect_nodes(m, scope, seen, out);
            }
        }
        _ => {}
    }
}

/// `base` if unused, otherwise `base` with the smallest free suffix from 2.
fn unique_label(base: &str, used: &FxHashSet<String>) -> String {
    if !used.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}
