//! docshape: dynamic values and a recursive schema algebra for document databases.
//!
//! This crate provides the value representation a document store persists,
//! and the models (schemas) that describe those values.
//!
//! # Overview
//!
//! - **Values**: a closed set of dynamically typed data ([`Value`]) with
//!   key-sorted structs and maps, hash-deduplicated sets and a stable
//!   structural hash.
//! - **Models**: recursive descriptions of legal value shapes ([`Model`]).
//!   Cycles are expressed with shared [`Recursion`] nodes.
//! - **Merging**: [`either`] combines two models into one that accepts
//!   both, which is how a schema is inferred from sample documents.
//! - **Persistence**: models are stored as values themselves, see
//!   [`codec`].
//!
//! # Quick Start
//!
//! ```rust
//! use docshape::{DecodeOptions, Model, Value, either, model_from_value, value_from_model};
//!
//! // Models inferred from two documents.
//! let a = Model::structure([("name", Model::String)]);
//! let b = Model::structure([("name", Model::String), ("tags", Model::set(Model::String))]);
//! let merged = either(&a, &b);
//!
//! let doc = Value::structure([("name", Value::string("Ada"))]);
//! assert!(merged.validate(&doc).is_ok());
//!
//! // Persist and reload the schema.
//! let encoded = value_from_model("models", &merged);
//! let decoded = model_from_value("models", &encoded, &DecodeOptions::default()).unwrap();
//! assert_eq!(decoded, merged);
//! ```
//!
//! # Modules
//!
//! - [`value`]: Values, sorted maps, sets and structural hashing
//! - [`model`]: Models, the merge operator and value traversal
//! - [`codec`]: Model to value encoding and decoding
//! - [`validate`]: Value conformance checks
//! - [`error`]: Error types
//! - [`limits`]: Default decoding bounds
//!
//! # Threading
//!
//! Models share recursion nodes through `Rc`, so they are neither `Send`
//! nor `Sync`. Cyclic models are never freed; they are meant to live as
//! long as the schema registry holding them.

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod util;
pub mod validate;
pub mod value;

// Re-export commonly used types at crate root
pub use codec::{
    DecodeOptions, RecursionLabels, model_from_value, model_from_value_with_labels,
    value_from_model,
};
pub use error::{ParseError, ParseErrorKind, Path, PathElement, ValidationError, ValidationErrorKind};
pub use model::{Model, Recursion, either, roll_or, union_of, unroll_or};
pub use util::DateTime;
pub use validate::validate_value;
pub use value::{MetaValue, RefValue, SortedMap, Value, ValueSet, ValueType, hash_value};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
