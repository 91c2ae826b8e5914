//! Benchmark for schema inference over JSON documents.
//!
//! Infers a model per document, merges them into one schema, then
//! round-trips the schema through its value encoding and validates every
//! document against it. Without an input file a synthetic dataset is used.

use std::fs;
use std::path::Path;
use std::time::Instant;

use docshape::{
    DateTime, DecodeOptions, Model, RefValue, Value, model_from_value, union_of, unroll_or,
    value_from_model,
};
use serde::Deserialize;
use uuid::Uuid;

/// Collection id the encoded schema is stored under.
const MODELS_COLLECTION: &str = "models";

const SYNTHETIC_RECORDS: usize = 50_000;

// =============================================================================
// INPUT
// =============================================================================

/// Either a bare array of documents or a named dataset.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Input {
    Records(Vec<serde_json::Value>),
    Dataset {
        name: String,
        records: Vec<serde_json::Value>,
    },
}

fn value_from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int64(i)
            } else if let Some(u) = n.as_u64() {
                Value::Uint64(u)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => match DateTime::parse_rfc3339(&s) {
            Ok(dt) => Value::DateTime(dt),
            Err(_) => Value::String(s),
        },
        serde_json::Value::Array(items) => {
            Value::List(items.into_iter().map(value_from_json).collect())
        }
        serde_json::Value::Object(fields) => Value::structure(
            fields
                .into_iter()
                .map(|(k, v)| (k, value_from_json(v))),
        ),
    }
}

// =============================================================================
// SYNTHETIC DATA
// =============================================================================

fn synthetic_records(count: usize) -> Vec<Value> {
    let owners: Vec<String> = (0..64).map(|_| Uuid::new_v4().to_string()).collect();
    (0..count)
        .map(|i| {
            let mut fields = vec![
                ("id", Value::string(Uuid::now_v7().to_string())),
                ("name", Value::string(format!("record-{i}"))),
                (
                    "owner",
                    Value::Ref(RefValue::new("users", owners[i % owners.len()].clone())),
                ),
                (
                    "created",
                    Value::DateTime(DateTime::from_epoch_us(1_704_067_200_000_000 + i as i64)),
                ),
                (
                    "tags",
                    Value::List((0..i % 4).map(|t| Value::symbol(format!("tag{t}"))).collect()),
                ),
            ];
            // Every third record stores a float score, the rest an integer one.
            if i % 3 == 0 {
                fields.push(("score", Value::Float(i as f64 / 7.0)));
            } else {
                fields.push(("score", Value::Int64(i as i64)));
            }
            if i % 5 == 0 {
                fields.push(("parent", Value::Null));
            }
            Value::structure(fields)
        })
        .collect()
}

// =============================================================================
// INFERENCE
// =============================================================================

/// The narrowest model accepting `value`.
///
/// Empty collections contribute a null element model.
fn infer(value: &Value) -> Model {
    fn elements<'a>(items: impl Iterator<Item = &'a Value>) -> Model {
        union_of(items.map(infer)).unwrap_or(Model::Null)
    }

    match value.unwrap_meta() {
        Value::Tuple(items) => Model::tuple(items.iter().map(infer)),
        Value::List(items) => Model::list(elements(items.iter())),
        Value::Set(items) => Model::set(elements(items.iter())),
        Value::Map(entries) => Model::map(elements(entries.iter().map(|(_, v)| v))),
        Value::Struct(fields) => Model::structure(fields.iter().map(|(k, v)| (k, infer(v)))),
        Value::Union(case, payload) => Model::union([(case.as_str(), infer(payload))]),
        Value::Symbol(s) => Model::enumeration([s.as_str()]),
        Value::Ref(r) => Model::reference(r.model.as_str()),
        Value::Raw(_) | Value::Meta(_) => Model::Any,
        Value::String(_) => Model::String,
        Value::Float(_) => Model::Float,
        Value::Bool(_) => Model::Bool,
        Value::DateTime(_) => Model::DateTime,
        Value::Null => Model::Null,
        Value::Int8(_) => Model::Int8,
        Value::Int16(_) => Model::Int16,
        Value::Int32(_) => Model::Int32,
        Value::Int64(_) => Model::Int64,
        Value::Uint8(_) => Model::Uint8,
        Value::Uint16(_) => Model::Uint16,
        Value::Uint32(_) => Model::Uint32,
        Value::Uint64(_) => Model::Uint64,
    }
}

fn main() {
    let data_path = std::env::args().nth(1);

    let (dataset, records, json_len) = match &data_path {
        Some(path) if Path::new(path).exists() => {
            println!("Loading documents from: {}", path);
            let json_data = fs::read_to_string(path).expect("Failed to read input file");

            let parse_start = Instant::now();
            let input: Input = serde_json::from_str(&json_data).expect("Failed to parse JSON");
            let (name, raw) = match input {
                Input::Records(records) => (path.clone(), records),
                Input::Dataset { name, records } => (name, records),
            };
            let records: Vec<Value> = raw.into_iter().map(value_from_json).collect();
            println!("Parsed {} documents in {:?}", records.len(), parse_start.elapsed());
            (name, records, json_data.len())
        }
        _ => {
            println!("No input file, generating {} synthetic documents", SYNTHETIC_RECORDS);
            ("synthetic".to_string(), synthetic_records(SYNTHETIC_RECORDS), 0)
        }
    };

    // Infer one model per document
    let infer_start = Instant::now();
    let models: Vec<Model> = records.iter().map(infer).collect();
    let infer_time = infer_start.elapsed();
    println!("\nInferred {} models in {:?}", models.len(), infer_time);

    // Merge into a single schema
    let merge_start = Instant::now();
    let schema = union_of(models).expect("No documents to infer from");
    let merge_time = merge_start.elapsed();
    println!("Merged schema in {:?}", merge_time);
    println!("  Top-level alternatives: {}", unroll_or(&schema).len());
    println!("  Schema: {}", schema);

    // Encode and decode the schema
    const CODEC_ITERS: u32 = 100;

    let encode_start = Instant::now();
    let mut encoded = Value::Null;
    for _ in 0..CODEC_ITERS {
        encoded = value_from_model(MODELS_COLLECTION, &schema);
    }
    let encode_time = encode_start.elapsed() / CODEC_ITERS;
    println!(
        "\nEncode: {:?} (avg of {} iterations), hash {:016x}",
        encode_time,
        CODEC_ITERS,
        encoded.hash64()
    );

    let options = DecodeOptions::default();
    let decode_start = Instant::now();
    let mut decoded = None;
    for _ in 0..CODEC_ITERS {
        decoded = Some(
            model_from_value(MODELS_COLLECTION, &encoded, &options).expect("Failed to decode"),
        );
    }
    let decode_time = decode_start.elapsed() / CODEC_ITERS;
    println!("Decode: {:?} (avg of {} iterations)", decode_time, CODEC_ITERS);
    assert_eq!(decoded.as_ref(), Some(&schema), "Schema should round-trip");

    // Every document must conform to the merged schema
    let validate_start = Instant::now();
    let mut rejected = 0usize;
    for record in &records {
        if let Err(e) = schema.validate(record) {
            if rejected == 0 {
                println!("  First rejection: {}", e);
            }
            rejected += 1;
        }
    }
    let validate_time = validate_start.elapsed();
    println!(
        "\nValidated {} documents in {:?} ({} rejected)",
        records.len(),
        validate_time,
        rejected
    );

    // Summary
    println!("\n=== Summary ===");
    println!("Dataset: {}", dataset);
    println!("Documents: {}", records.len());
    if json_len > 0 {
        println!(
            "JSON size: {} bytes ({:.1} MB)",
            json_len,
            json_len as f64 / 1_000_000.0
        );
    }
    println!(
        "Inference throughput: {:.0} documents/s",
        records.len() as f64 / (infer_time + merge_time).as_secs_f64()
    );
}
