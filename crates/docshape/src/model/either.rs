//! The model merge operator.
//!
//! [`either`] computes a model accepting every value either operand
//! accepts. It prefers structural merges (two lists become a list of the
//! merged element) over adding alternatives, keeps `Or` chains minimal, and
//! terminates on cyclic models.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::model::{Model, Recursion};
use crate::value::SortedMap;

/// Merges two models into one that accepts the values of both.
///
/// - `Any` absorbs everything.
/// - Matching composites merge their children; mismatched shapes become
///   alternatives of an `Or`.
/// - An `Or` operand is flattened and the other side's alternatives are
///   folded into the first compatible branch, or appended.
/// - `Annotation` and `Unique` are transparent and survive the merge.
/// - Recursive operands are unwrapped; a merge that reaches itself again
///   closes a new `Recursion` node instead of unrolling forever.
///
/// Merging whole models by structural equality first would shortcut some
/// cases, but comparing large recursive schemas is as costly as merging
/// them, so the operator does not do it.
///
/// ```
/// use docshape::{Model, either};
///
/// let merged = either(
///     &Model::structure([("id", Model::Int64)]),
///     &Model::structure([("id", Model::Int64), ("name", Model::String)]),
/// );
/// assert_eq!(merged, Model::structure([("id", Model::Int64), ("name", Model::String)]));
/// ```
pub fn either(l: &Model, r: &Model) -> Model {
    Merger::default().either(l, r)
}

/// Builds a right-leaning `Or` chain: `[a, b, c]` becomes `Or(a, Or(b, c))`.
///
/// A single model is returned unchanged; an empty list yields `None`.
pub fn roll_or(models: Vec<Model>) -> Option<Model> {
    let mut rev = models.into_iter().rev();
    let last = rev.next()?;
    Some(rev.fold(last, |acc, m| Model::or(m, acc)))
}

/// Flattens nested `Or` nodes into their alternatives, left to right.
///
/// Non-`Or` models yield themselves. Inverse of [`roll_or`] on chains
/// whose alternatives are not themselves `Or`.
pub fn unroll_or(model: &Model) -> Vec<&Model> {
    let mut out = Vec::new();
    let mut stack = vec![model];
    while let Some(m) = stack.pop() {
        match m {
            Model::Or(l, r) => {
                stack.push(r);
                stack.push(l);
            }
            other => out.push(other),
        }
    }
    out
}

/// Merges any number of models with [`either`], left to right.
pub fn union_of(models: impl IntoIterator<Item = Model>) -> Option<Model> {
    models
        .into_iter()
        .reduce(|acc, m| either(&acc, &m))
}

/// Identity of a merge operand: recursion nodes by node, anything else by
/// its address, which is stable for the duration of one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Operand {
    Node(usize),
    Tree(usize),
}

impl Operand {
    fn of(m: &Model) -> Self {
        match m {
            Model::Recursion(node) => Operand::Node(node.id()),
            other => Operand::Tree(other as *const Model as usize),
        }
    }
}

struct Pending {
    node: Rc<Recursion>,
    referenced: bool,
}

/// State of one top-level merge: the recursive merges still in progress.
#[derive(Default)]
struct Merger {
    pending: FxHashMap<(Operand, Operand), Pending>,
}

impl Merger {
    fn either(&mut self, l: &Model, r: &Model) -> Model {
        match (l, r) {
            (Model::Any, _) | (_, Model::Any) => return Model::Any,
            (Model::Recursion(_), _) | (_, Model::Recursion(_)) => {
                return self.merge_recursion(l, r);
            }
            (Model::Or(..), _) | (_, Model::Or(..)) => return self.merge_alternatives(l, r),
            _ => {}
        }

        match (l, r) {
            (Model::Annotation(lt, li), Model::Annotation(rt, ri)) => {
                let inner = self.either(li, ri);
                // Equal tags collapse instead of nesting.
                if lt == rt {
                    Model::annotation(lt.clone(), inner)
                } else {
                    Model::annotation(lt.clone(), Model::annotation(rt.clone(), inner))
                }
            }
            (Model::Annotation(tag, li), _) => Model::annotation(tag.clone(), self.either(li, r)),
            (_, Model::Annotation(tag, ri)) => Model::annotation(tag.clone(), self.either(l, ri)),
            (Model::Unique(li), Model::Unique(ri)) => Model::unique(self.either(li, ri)),
            (Model::Unique(li), _) => Model::unique(self.either(li, r)),
            (_, Model::Unique(ri)) => Model::unique(self.either(l, ri)),
            _ => self.merge_structure(l, r),
        }
    }

    fn merge_recursion(&mut self, l: &Model, r: &Model) -> Model {
        let ln = as_node(l);
        let rn = as_node(r);

        if let (Some(a), Some(b)) = (ln, rn) {
            if Rc::ptr_eq(a, b) {
                return l.clone();
            }
        }
        // An unclosed node is a result still being built further up; it
        // can only be compared by identity.
        if ln.is_some_and(|n| !n.is_closed()) || rn.is_some_and(|n| !n.is_closed()) {
            return Model::or(l.clone(), r.clone());
        }

        let key = (Operand::of(l), Operand::of(r));
        if let Some(pending) = self.pending.get_mut(&key) {
            pending.referenced = true;
            trace!(label = pending.node.label(), "merge reached itself, closing cycle");
            return Model::Recursion(pending.node.clone());
        }

        let label = match (ln, rn) {
            (Some(n), _) | (None, Some(n)) => n.label().to_string(),
            (None, None) => String::new(),
        };
        let node = Recursion::placeholder(label);
        self.pending.insert(
            key,
            Pending {
                node: node.clone(),
                referenced: false,
            },
        );

        let li = ln.map_or(l, |n| n.inner());
        let ri = rn.map_or(r, |n| n.inner());
        let inner = self.either(li, ri);

        let referenced = self.pending.remove(&key).is_some_and(|p| p.referenced);
        if referenced {
            trace!(label = node.label(), "closed merged recursion");
            node.close(inner);
            Model::Recursion(node)
        } else {
            inner
        }
    }

    fn merge_alternatives(&mut self, l: &Model, r: &Model) -> Model {
        let mut alternatives: Vec<Model> = unroll_or(l).into_iter().cloned().collect();
        for candidate in unroll_or(r) {
            self.insert_alternative(&mut alternatives, candidate);
        }
        roll_or(alternatives).unwrap_or_else(|| l.clone())
    }

    /// Merges `candidate` into the first alternative it combines with
    /// without producing a top-level `Or`, or appends it.
    fn insert_alternative(&mut self, alternatives: &mut Vec<Model>, candidate: &Model) {
        for alternative in alternatives.iter_mut() {
            let merged = self.either(alternative, candidate);
            if !matches!(merged, Model::Or(..)) {
                *alternative = merged;
                return;
            }
        }
        alternatives.push(candidate.clone());
    }

    fn merge_structure(&mut self, l: &Model, r: &Model) -> Model {
        match (l, r) {
            (Model::List(a), Model::List(b)) => Model::list(self.either(a, b)),
            (Model::Set(a), Model::Set(b)) => Model::set(self.either(a, b)),
            (Model::Map(a), Model::Map(b)) => Model::map(self.either(a, b)),
            (Model::Tuple(a), Model::Tuple(b)) if a.len() == b.len() => {
                Model::Tuple(a.iter().zip(b).map(|(x, y)| self.either(x, y)).collect())
            }
            (Model::Struct(a), Model::Struct(b)) => Model::Struct(self.merge_fields(a, b)),
            (Model::Union(a), Model::Union(b)) => Model::Union(self.merge_fields(a, b)),
            (Model::Enum(a), Model::Enum(b)) => Model::Enum(a.union(b).cloned().collect()),
            (Model::Ref(a), Model::Ref(b)) => {
                if a == b {
                    Model::Ref(a.clone())
                } else if a.is_empty() || b.is_empty() {
                    Model::Ref(String::new())
                } else {
                    Model::or(l.clone(), r.clone())
                }
            }
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
            | (Model::Uint64, Model::Uint64) => l.clone(),
            _ => Model::or(l.clone(), r.clone()),
        }
    }

    /// Merges keys present on both sides; one-sided keys are kept as is.
    fn merge_fields(&mut self, a: &SortedMap<Model>, b: &SortedMap<Model>) -> SortedMap<Model> {
        let mut out = SortedMap::with_capacity(a.len().max(b.len()));
        for (name, m) in a.iter() {
            let merged = match b.get(name) {
                Some(other) => self.either(m, other),
                None => m.clone(),
            };
            out.set(name, merged);
        }
        for (name, m) in b.iter() {
            if !a.contains_key(name) {
                out.set(name, m.clone());
            }
        }
        out
    }
}

fn as_node(m: &Model) -> Option<&Rc<Recursion>> {
    match m {
        Model::Recursion(node) => Some(node),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate_value;
    use crate::value::Value;

    fn leaves() -> Vec<Model> {
        vec![
            Model::Null,
            Model::Bool,
            Model::Float,
            Model::String,
            Model::DateTime,
            Model::Int8,
            Model::Int16,
            Model::Int32,
            Model::Int64,
            Model::Uint8,
            Model::Uint16,
            Model::Uint32,
            Model::Uint64,
            Model::Any,
            Model::reference("users"),
        ]
    }

    fn self_list(label: &str) -> Rc<Recursion> {
        Recursion::build(label, |this| Model::list(Model::Recursion(this.clone())))
    }

    fn accepts(m: &Model, v: &Value) -> bool {
        validate_value(m, v).is_ok()
    }

    #[test]
    fn test_any_absorbs() {
        let samples = [
            Model::String,
            Model::list(Model::Int64),
            Model::or(Model::Bool, Model::Null),
            Model::annotation("x", Model::Float),
            Model::Recursion(self_list("l")),
        ];
        for m in &samples {
            assert_eq!(either(&Model::Any, m), Model::Any);
            assert_eq!(either(m, &Model::Any), Model::Any);
        }
    }

    #[test]
    fn test_leaf_idempotence() {
        for leaf in leaves() {
            assert_eq!(either(&leaf, &leaf), leaf, "either({leaf}, {leaf})");
        }
    }

    #[test]
    fn test_distinct_leaves_become_or() {
        assert_eq!(
            either(&Model::String, &Model::Int64),
            Model::or(Model::String, Model::Int64)
        );
    }

    #[test]
    fn test_or_appends_unmergeable() {
        let l = Model::or(Model::String, Model::Float);
        assert_eq!(
            either(&l, &Model::Int64),
            Model::or(Model::String, Model::or(Model::Float, Model::Int64))
        );
    }

    #[test]
    fn test_or_collapses_duplicates() {
        let r = Model::or(Model::String, Model::String);
        assert_eq!(either(&Model::String, &r), Model::String);
    }

    #[test]
    fn test_identical_or_trees_do_not_grow() {
        let m = Model::or(
            Model::String,
            Model::or(Model::list(Model::Int64), Model::structure([("a", Model::Bool)])),
        );
        let merged = either(&m, &m);
        assert_eq!(unroll_or(&merged).len(), 3);
        assert_eq!(merged, m);
    }

    #[test]
    fn test_or_branch_merges_structurally() {
        let l = Model::or(Model::String, Model::list(Model::Int64));
        let merged = either(&l, &Model::list(Model::Float));
        assert_eq!(
            merged,
            Model::or(
                Model::String,
                Model::list(Model::or(Model::Int64, Model::Float))
            )
        );
    }

    #[test]
    fn test_recursive_merge_shares_node() {
        let l = Model::Recursion(self_list("l"));
        let r = Model::Recursion(self_list("r"));
        let merged = either(&l, &r);

        let Model::Recursion(node) = &merged else {
            panic!("expected recursion, got {merged}");
        };
        assert_eq!(node.label(), "l");
        let Model::List(element) = node.inner() else {
            panic!("expected list inside {merged}");
        };
        let Model::Recursion(back) = element.as_ref() else {
            panic!("expected back edge inside {merged}");
        };
        assert!(Rc::ptr_eq(node, back));
    }

    #[test]
    fn test_same_recursion_is_idempotent() {
        let node = self_list("l");
        let m = Model::Recursion(node.clone());
        let merged = either(&m, &m);
        match merged {
            Model::Recursion(out) => assert!(Rc::ptr_eq(&out, &node)),
            other => panic!("expected recursion, got {other}"),
        }
    }

    #[test]
    fn test_recursion_against_plain_model() {
        let l = Model::Recursion(self_list("l"));
        let r = Model::list(Model::String);
        let merged = either(&l, &r);

        let nested = Value::List(vec![Value::List(vec![]), Value::List(vec![])]);
        let strings = Value::List(vec![Value::string("a")]);
        assert!(accepts(&merged, &Value::List(vec![])));
        assert!(accepts(&merged, &nested));
        assert!(accepts(&merged, &strings));
        assert!(!accepts(&merged, &Value::List(vec![Value::Int64(1)])));
    }

    #[test]
    fn test_recursive_alternatives_keep_other_side() {
        let nested = Model::Recursion(Recursion::build("a", |this| {
            Model::or(Model::String, Model::list(Model::Recursion(this.clone())))
        }));
        let deep = Value::List(vec![Value::string("x"), Value::List(vec![Value::string("y")])]);
        for merged in [either(&nested, &Model::Int64), either(&Model::Int64, &nested)] {
            assert!(accepts(&merged, &Value::Int64(1)), "{merged}");
            assert!(accepts(&merged, &Value::string("s")), "{merged}");
            assert!(accepts(&merged, &deep), "{merged}");
            assert!(!accepts(&merged, &Value::Bool(true)), "{merged}");
        }
    }

    #[test]
    fn test_mutual_recursion_merge_terminates() {
        let a = Recursion::build_group(&["a", "b"], |n| {
            vec![
                Model::list(Model::Recursion(n[1].clone())),
                Model::optional(Model::Recursion(n[0].clone())),
            ]
        });
        let b = self_list("c");
        let merged = either(&Model::Recursion(a[0].clone()), &Model::Recursion(b));
        assert!(matches!(merged, Model::Recursion(_)));
        assert!(accepts(&merged, &Value::List(vec![Value::Null])));
        assert!(accepts(&merged, &Value::List(vec![Value::List(vec![])])));
    }

    #[test]
    fn test_struct_merge_keeps_one_sided_fields() {
        let l = Model::structure([("id", Model::Int64), ("name", Model::String)]);
        let r = Model::structure([("id", Model::Float), ("age", Model::Uint8)]);
        assert_eq!(
            either(&l, &r),
            Model::structure([
                ("id", Model::or(Model::Int64, Model::Float)),
                ("name", Model::String),
                ("age", Model::Uint8),
            ])
        );
    }

    #[test]
    fn test_union_merge() {
        let l = Model::union([("a", Model::Null)]);
        let r = Model::union([("b", Model::Bool)]);
        assert_eq!(
            either(&l, &r),
            Model::union([("a", Model::Null), ("b", Model::Bool)])
        );
    }

    #[test]
    fn test_tuple_arity() {
        let two = Model::tuple([Model::Int8, Model::Bool]);
        let two_b = Model::tuple([Model::Int16, Model::Bool]);
        let three = Model::tuple([Model::Int8, Model::Bool, Model::Null]);
        assert_eq!(
            either(&two, &two_b),
            Model::tuple([Model::or(Model::Int8, Model::Int16), Model::Bool])
        );
        assert_eq!(either(&two, &three), Model::or(two.clone(), three.clone()));
    }

    #[test]
    fn test_enum_union() {
        let l = Model::enumeration(["red", "green"]);
        let r = Model::enumeration(["green", "blue"]);
        assert_eq!(either(&l, &r), Model::enumeration(["blue", "green", "red"]));
    }

    #[test]
    fn test_ref_targets() {
        let users = Model::reference("users");
        let groups = Model::reference("groups");
        let unknown = Model::reference("");
        assert_eq!(either(&users, &users), users);
        assert_eq!(either(&users, &groups), Model::or(users.clone(), groups.clone()));
        assert_eq!(either(&users, &unknown), unknown);
        assert_eq!(either(&unknown, &groups), unknown);
    }

    #[test]
    fn test_wrappers_survive() {
        let l = Model::annotation("doc", Model::list(Model::Int64));
        let r = Model::list(Model::String);
        assert_eq!(
            either(&l, &r),
            Model::annotation("doc", Model::list(Model::or(Model::Int64, Model::String)))
        );

        let u = Model::unique(Model::String);
        assert_eq!(either(&u, &Model::String), Model::unique(Model::String));
        assert_eq!(either(&u, &u), u);

        let a = Model::annotation("a", Model::Int64);
        let b = Model::annotation("b", Model::Int64);
        assert_eq!(
            either(&a, &b),
            Model::annotation("a", Model::annotation("b", Model::Int64))
        );
        assert_eq!(either(&a, &a), a);
    }

    #[test]
    fn test_commutative_up_to_branch_order() {
        let models = [
            Model::String,
            Model::list(Model::Int64),
            Model::structure([("x", Model::Bool)]),
            Model::or(Model::Null, Model::Float),
            Model::Recursion(self_list("l")),
            Model::tuple([Model::String, Model::Int64]),
        ];
        let values = [
            Value::string("s"),
            Value::Null,
            Value::Float(1.5),
            Value::List(vec![Value::Int64(3)]),
            Value::List(vec![Value::List(vec![])]),
            Value::structure([("x", Value::Bool(true))]),
            Value::Tuple(vec![Value::string("t"), Value::Int64(1)]),
            Value::Bool(false),
        ];
        for a in &models {
            for b in &models {
                let ab = either(a, b);
                let ba = either(b, a);
                for v in &values {
                    assert_eq!(
                        accepts(&ab, v),
                        accepts(&ba, v),
                        "either({a}, {b}) = {ab} vs {ba} on {v}"
                    );
                    if accepts(a, v) || accepts(b, v) {
                        assert!(accepts(&ab, v), "{ab} should accept {v}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_roll_unroll_inverse() {
        let parts = vec![Model::String, Model::Null, Model::list(Model::Bool)];
        let rolled = roll_or(parts.clone()).unwrap();
        assert_eq!(
            rolled,
            Model::or(Model::String, Model::or(Model::Null, Model::list(Model::Bool)))
        );
        let unrolled: Vec<Model> = unroll_or(&rolled).into_iter().cloned().collect();
        assert_eq!(unrolled, parts);
        assert!(roll_or(Vec::new()).is_none());
        assert_eq!(roll_or(vec![Model::Bool]), Some(Model::Bool));
    }

    #[test]
    fn test_union_of() {
        let m = union_of([Model::String, Model::Int64, Model::String]).unwrap();
        assert_eq!(m, Model::or(Model::String, Model::Int64));
        assert!(union_of(Vec::new()).is_none());
    }
}
