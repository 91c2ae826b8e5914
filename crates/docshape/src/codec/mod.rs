//! Models encoded as values.
//!
//! Models are persisted like any other document: as a [`Value`]. Every
//! encoded model is a `Union` whose case names the model kind:
//!
//! | case | payload |
//! |------|---------|
//! | `null`, `bool`, `float`, `string`, `dateTime`, `any`, `int8` .. `uint64` | empty struct |
//! | `ref` | ref into the root model collection, id = target model |
//! | `list`, `set`, `map`, `unique`, `optional` | encoded inner model |
//! | `tuple`, `or` | list of encoded models |
//! | `struct`, `union` | map from name to encoded model |
//! | `enum` | set of strings |
//! | `annotation` | struct `{value, model}` |
//! | `recursion` | struct `{label, model}` |
//! | `recursive` | struct `{top, models}`, `models` mapping label to encoded model |
//! | `recurse` | label string |
//!
//! `optional` and the legacy `int`/`uint` cases are only read, never
//! written.
//!
//! [`Value`]: crate::value::Value

mod decode;
mod encode;

pub use decode::{DecodeOptions, RecursionLabels, model_from_value, model_from_value_with_labels};
pub use encode::value_from_model;

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::error::ParseErrorKind;
    use crate::model::{Model, Recursion};
    use crate::value::{RefValue, SortedMap, Value, ValueSet, ValueType};

    const ROOT: &str = "models";

    fn roundtrip(model: &Model) -> Model {
        let encoded = value_from_model(ROOT, model);
        model_from_value(ROOT, &encoded, &DecodeOptions::default()).unwrap()
    }

    fn decode(value: &Value) -> Result<Model, crate::error::ParseError> {
        model_from_value(ROOT, value, &DecodeOptions::default())
    }

    fn empty() -> Value {
        Value::Struct(SortedMap::new())
    }

    fn linked_list() -> Rc<Recursion> {
        Recursion::build("node", |this| {
            Model::optional(Model::structure([
                ("head", Model::Int64),
                ("tail", Model::Recursion(this.clone())),
            ]))
        })
    }

    #[test]
    fn test_leaf_encoding() {
        assert_eq!(value_from_model(ROOT, &Model::String), Value::union("string", empty()));
        assert_eq!(
            value_from_model(ROOT, &Model::DateTime),
            Value::union("dateTime", empty())
        );
        assert_eq!(
            value_from_model(ROOT, &Model::reference("users")),
            Value::union("ref", Value::Ref(RefValue::new(ROOT, "users")))
        );
    }

    #[test]
    fn test_composite_roundtrip() {
        let models = [
            Model::list(Model::set(Model::Float)),
            Model::map(Model::unique(Model::String)),
            Model::tuple([Model::Int8, Model::Uint16, Model::Any]),
            Model::union([("a", Model::Null), ("b", Model::reference("users"))]),
            Model::enumeration(["x", "y"]),
            Model::annotation("note", Model::Bool),
            Model::or(Model::String, Model::or(Model::Int32, Model::Null)),
        ];
        for m in &models {
            assert_eq!(&roundtrip(m), m, "roundtrip of {m}");
        }
    }

    #[test]
    fn test_or_is_flat() {
        let m = Model::or(Model::String, Model::or(Model::Int32, Model::Null));
        match value_from_model(ROOT, &m) {
            Value::Union(case, payload) => {
                assert_eq!(case, "or");
                assert!(matches!(*payload, Value::List(ref items) if items.len() == 3));
            }
            other => panic!("expected union, got {other}"),
        }
    }

    #[test]
    fn test_end_to_end_struct() {
        let m = Model::structure([
            ("name", Model::String),
            ("tags", Model::set(Model::String)),
        ]);
        let decoded = roundtrip(&m);
        assert_eq!(decoded, m);
        assert_eq!(decoded.value_type(), ValueType::STRUCT);
    }

    #[test]
    fn test_recursion_roundtrip() {
        let list = Model::Recursion(linked_list());
        let encoded = value_from_model(ROOT, &list);
        match &encoded {
            Value::Union(case, _) => assert_eq!(case, "recursion"),
            other => panic!("expected union, got {other}"),
        }
        let decoded = model_from_value(ROOT, &encoded, &DecodeOptions::default()).unwrap();
        assert_eq!(decoded, list);

        // The decoded back edge points at the decoded node itself.
        let Model::Recursion(node) = &decoded else {
            panic!("expected recursion, got {decoded}");
        };
        let Model::Or(branch, _) = node.inner() else {
            panic!("expected or, got {decoded}");
        };
        let Model::Struct(fields) = branch.as_ref() else {
            panic!("expected struct, got {decoded}");
        };
        match fields.get("tail") {
            Some(Model::Recursion(back)) => assert!(Rc::ptr_eq(back, node)),
            other => panic!("expected back edge, got {other:?}"),
        }
    }

    #[test]
    fn test_mutual_recursion_roundtrip() {
        let nodes = Recursion::build_group(&["expr", "term"], |n| {
            vec![
                Model::union([
                    ("term", Model::Recursion(n[1].clone())),
                    ("sum", Model::list(Model::Recursion(n[0].clone()))),
                ]),
                Model::union([
                    ("number", Model::Float),
                    ("paren", Model::Recursion(n[0].clone())),
                ]),
            ]
        });
        let expr = Model::Recursion(nodes[0].clone());
        let encoded = value_from_model(ROOT, &expr);
        match &encoded {
            Value::Union(case, payload) => {
                assert_eq!(case, "recursive");
                let Value::Struct(fields) = payload.as_ref() else {
                    panic!("expected struct payload");
                };
                assert_eq!(fields.get("top"), Some(&Value::string("expr")));
            }
            other => panic!("expected union, got {other}"),
        }
        assert_eq!(roundtrip(&expr), expr);
    }

    #[test]
    fn test_colliding_labels_are_renamed() {
        let inner = Recursion::build("t", |this| Model::list(Model::Recursion(this.clone())));
        let outer = Recursion::build("t", |this| {
            Model::structure([
                ("self", Model::Recursion(this.clone())),
                ("other", Model::Recursion(inner.clone())),
            ])
        });
        let outer = Model::Recursion(outer);
        let encoded = value_from_model(ROOT, &outer);
        let Value::Union(_, payload) = &encoded else {
            panic!("expected union");
        };
        let Value::Struct(fields) = payload.as_ref() else {
            panic!("expected struct payload");
        };
        let Some(Value::Map(models)) = fields.get("models") else {
            panic!("expected models map");
        };
        assert_eq!(models.keys(), vec!["t".to_string(), "t2".to_string()]);

        let decoded = decode(&encoded).unwrap();
        let text = decoded.to_string();
        assert!(text.contains("rec t2 = list<^t2>"), "{text}");
        assert_eq!(decoded, outer);
    }

    #[test]
    fn test_nested_same_label_roundtrip() {
        let m = Model::Recursion(Recursion::build("node", |outer| {
            Model::structure([
                ("parent", Model::optional(Model::Recursion(outer.clone()))),
                (
                    "items",
                    Model::Recursion(Recursion::build("node", |inner| {
                        Model::map(Model::Recursion(inner.clone()))
                    })),
                ),
            ])
        }));
        assert_eq!(roundtrip(&m), m);
    }

    #[test]
    fn test_shared_subtree_roundtrip() {
        let shared = Model::Recursion(linked_list());
        let m = Model::structure([("a", shared.clone()), ("b", shared)]);
        assert_eq!(roundtrip(&m), m);
    }

    #[test]
    fn test_optional_and_legacy_cases() {
        let optional = Value::union("optional", Value::union("string", empty()));
        assert_eq!(decode(&optional).unwrap(), Model::optional(Model::String));

        let legacy = Value::union("int", empty());
        assert_eq!(decode(&legacy).unwrap(), Model::Int64);
        let err = model_from_value(ROOT, &legacy, &DecodeOptions::strict()).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::LegacyAlias { case: "int".into() });
    }

    #[test]
    fn test_reject_empty_enum_and_or() {
        let err = decode(&Value::union("enum", Value::Set(ValueSet::new()))).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::EmptyEnum);
        let err = decode(&Value::union("or", Value::List(vec![]))).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::EmptyOr);
    }

    #[test]
    fn test_reject_self_recurse() {
        let v = Value::union(
            "recursion",
            Value::structure([
                ("label", Value::string("x")),
                ("model", Value::union("recurse", Value::string("x"))),
            ]),
        );
        let err = decode(&v).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InfiniteRecursion { label: "x".into() });
        assert_eq!(err.code(), "M009");
    }

    #[test]
    fn test_reject_recursion_through_wrappers() {
        let v = Value::union(
            "recursion",
            Value::structure([
                ("label", Value::string("x")),
                (
                    "model",
                    Value::union(
                        "or",
                        Value::List(vec![
                            Value::union("string", empty()),
                            Value::union("unique", Value::union("recurse", Value::string("x"))),
                        ]),
                    ),
                ),
            ]),
        );
        assert!(matches!(
            decode(&v).unwrap_err().kind,
            ParseErrorKind::InfiniteRecursion { .. }
        ));
    }

    #[test]
    fn test_reject_duplicate_label() {
        let v = Value::union(
            "recursion",
            Value::structure([
                ("label", Value::string("x")),
                (
                    "model",
                    Value::union(
                        "list",
                        Value::union(
                            "recursion",
                            Value::structure([
                                ("label", Value::string("x")),
                                ("model", Value::union("null", empty())),
                            ]),
                        ),
                    ),
                ),
            ]),
        );
        let err = decode(&v).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::DuplicateRecursionLabel { label: "x".into() });
        assert_eq!(err.path.to_string(), "$<recursion>.model<list><recursion>");
    }

    #[test]
    fn test_reject_undefined_labels() {
        let err = decode(&Value::union("recurse", Value::string("nope"))).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UndefinedRecursionLabel { label: "nope".into() }
        );

        let v = Value::union(
            "recursive",
            Value::structure([
                ("top", Value::string("missing")),
                ("models", Value::map([("a", Value::union("null", empty()))])),
            ]),
        );
        assert_eq!(
            decode(&v).unwrap_err().kind,
            ParseErrorKind::UndefinedTopLabel { label: "missing".into() }
        );
    }

    #[test]
    fn test_reject_nested_unique() {
        let v = Value::union("unique", Value::union("unique", Value::union("bool", empty())));
        assert_eq!(decode(&v).unwrap_err().kind, ParseErrorKind::NestedUnique);
    }

    #[test]
    fn test_reject_foreign_ref() {
        let v = Value::union("ref", Value::Ref(RefValue::new("elsewhere", "users")));
        assert_eq!(
            decode(&v).unwrap_err().kind,
            ParseErrorKind::ForeignRef {
                expected: ROOT.into(),
                found: "elsewhere".into(),
            }
        );
    }

    #[test]
    fn test_error_path_and_value() {
        let v = Value::union(
            "struct",
            Value::map([(
                "color",
                Value::union("enum", Value::set([Value::Int64(1)])),
            )]),
        );
        let err = decode(&v).unwrap_err();
        assert_eq!(err.path.to_string(), "$<struct>[\"color\"]<enum>[0]");
        assert_eq!(err.value, Value::Int64(1));
        assert_eq!(
            err.kind,
            ParseErrorKind::UnexpectedValue {
                expected: "a string",
                found: ValueType::INT64,
            }
        );
    }

    #[test]
    fn test_long_name_path_points_at_key() {
        let v = Value::union("struct", Value::map([("colour", Value::union("string", empty()))]));
        let options = DecodeOptions {
            max_name_len: 4,
            ..DecodeOptions::default()
        };
        let err = model_from_value(ROOT, &v, &options).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::LengthExceedsLimit {
                field: "name",
                len: 6,
                max: 4,
            }
        );
        assert_eq!(err.path.to_string(), "$<struct>[\"colour\"]");
    }

    #[test]
    fn test_unknown_case_and_depth_limit() {
        let err = decode(&Value::union("decimal", empty())).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownCase { case: "decimal".into() });

        let mut deep = Value::union("null", empty());
        for _ in 0..10 {
            deep = Value::union("list", deep);
        }
        let options = DecodeOptions::default().with_max_depth(5);
        let err = model_from_value(ROOT, &deep, &options).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::DepthLimitExceeded { max: 5 });
    }

    #[test]
    fn test_caller_supplied_labels() {
        let node = linked_list();
        let mut labels = RecursionLabels::new();
        assert!(labels.define(node.clone()));
        assert!(!labels.define(node.clone()));

        let v = Value::union("list", Value::union("recurse", Value::string("node")));
        let m = model_from_value_with_labels(ROOT, &v, &mut labels, &DecodeOptions::default())
            .unwrap();
        match m {
            Model::List(inner) => match *inner {
                Model::Recursion(back) => assert!(Rc::ptr_eq(&back, &node)),
                other => panic!("expected recursion, got {other}"),
            },
            other => panic!("expected list, got {other}"),
        }
        assert_eq!(labels.len(), 1);
    }
}
