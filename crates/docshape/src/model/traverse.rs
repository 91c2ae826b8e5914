//! Lock-step walk of a value and the model describing it.

use rustc_hash::FxHashSet;

use crate::model::{Model, unroll_or};
use crate::value::Value;

impl Model {
    /// Calls `visit` for every aligned `(value, model)` pair.
    ///
    /// The pair itself is visited first, then:
    /// - `Annotation`, `Unique` and `Recursion` pass the same value to their
    ///   inner model;
    /// - `Or` descends into every branch whose [`value_type`](Model::value_type)
    ///   admits the value;
    /// - composites descend into the children present on both sides.
    ///
    /// `Meta` envelopes are unwrapped before visiting. A subtree whose shape
    /// does not match its model is not descended into. A recursion node met
    /// again on the same value is skipped.
    pub fn traverse_value<F>(&self, value: &Value, visit: &mut F)
    where
        F: FnMut(&Value, &Model),
    {
        walk(self, value, visit, &mut FxHashSet::default());
    }
}

fn walk<F>(model: &Model, value: &Value, visit: &mut F, active: &mut FxHashSet<(usize, usize)>)
where
    F: FnMut(&Value, &Model),
{
    let value = value.unwrap_meta();
    visit(value, model);

    match (model, value) {
        (Model::Annotation(_, inner) | Model::Unique(inner), _) => walk(inner, value, visit, active),
        (Model::Or(..), _) => {
            let found = value.value_type();
            for branch in unroll_or(model) {
                if branch.value_type().contains(found) {
                    walk(branch, value, visit, active);
                }
            }
        }
        (Model::Recursion(node), _) => {
            let Some(inner) = node.try_inner() else {
                return;
            };
            let key = (node.id(), value as *const Value as usize);
            if !active.insert(key) {
                return;
            }
            walk(inner, value, visit, active);
            active.remove(&key);
        }
        (Model::List(element), Value::List(items)) => {
            for item in items {
                walk(element, item, visit, active);
            }
        }
        (Model::Set(element), Value::Set(items)) => {
            for item in items.iter() {
                walk(element, item, visit, active);
            }
        }
        (Model::Map(element), Value::Map(entries)) => {
            for (_, item) in entries.iter() {
                walk(element, item, visit, active);
            }
        }
        (Model::Tuple(elements), Value::Tuple(items)) if elements.len() == items.len() => {
            for (m, item) in elements.iter().zip(items) {
                walk(m, item, visit, active);
            }
        }
        (Model::Struct(fields), Value::Struct(values)) => {
            for (name, m) in fields.iter() {
                if let Some(item) = values.get(name) {
                    walk(m, item, visit, active);
                }
            }
        }
        (Model::Union(cases), Value::Union(case, payload)) => {
            if let Some(m) = cases.get(case) {
                walk(m, payload, visit, active);
            }
        }
        _ => {}
    }
}
