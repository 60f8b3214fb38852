//! superjson-compatible lossless encoding.
//!
//! A document is `{"json": <plain JSON>, "meta": {"values": {<path>: [<type>]}}}`.
//! Each annotation names a node whose plain JSON form lost type information
//! (a date printed as a string, `undefined` printed as `null`, ...) so the
//! decoder can restore it. `meta` is omitted when nothing needs annotating.
//! When the root itself is annotated, `values` is the bare annotation.

use chrono::Utc;
use projfill_core::Wire;
use projfill_core::dates::{format_rfc3339, parse_offset_datetime};
use serde_json::{Map, Value, json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("superjson document must be an object with a json field")]
    NotADocument,
    #[error("unknown superjson annotation {annotation:?} at {path:?}")]
    UnknownAnnotation { annotation: String, path: String },
    #[error("annotation path {0:?} does not resolve to a value")]
    DanglingPath(String),
    #[error("value at {path:?} is not a valid {annotation}")]
    InvalidValue {
        annotation: &'static str,
        path: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Annotation {
    Date,
    Undefined,
    BigInt,
    Number,
}

impl Annotation {
    fn as_str(self) -> &'static str {
        match self {
            Annotation::Date => "Date",
            Annotation::Undefined => "undefined",
            Annotation::BigInt => "bigint",
            Annotation::Number => "number",
        }
    }

    fn parse(raw: &Value, path: &str) -> Result<Self, CodecError> {
        // Older writers emit a bare string, newer ones a one-element array.
        let name = match raw {
            Value::String(s) => Some(s.as_str()),
            Value::Array(items) => items.first().and_then(Value::as_str),
            _ => None,
        };
        match name {
            Some("Date") => Ok(Annotation::Date),
            Some("undefined") => Ok(Annotation::Undefined),
            Some("bigint") => Ok(Annotation::BigInt),
            Some("number") => Ok(Annotation::Number),
            _ => Err(CodecError::UnknownAnnotation {
                annotation: raw.to_string(),
                path: path.to_string(),
            }),
        }
    }
}

/// Encode a value tree as a superjson document.
pub fn serialize(wire: &Wire) -> Value {
    let mut annotations = Vec::new();
    let json = lower(wire, &mut Vec::new(), &mut annotations);

    let mut doc = Map::new();
    doc.insert("json".to_string(), json);
    if !annotations.is_empty() {
        let root_only = annotations.len() == 1 && annotations[0].0.is_empty();
        let values = if root_only {
            json!([annotations[0].1.as_str()])
        } else {
            Value::Object(
                annotations
                    .into_iter()
                    .map(|(path, annotation)| (join_path(&path), json!([annotation.as_str()])))
                    .collect(),
            )
        };
        doc.insert("meta".to_string(), json!({ "values": values }));
    }
    Value::Object(doc)
}

pub fn to_string(wire: &Wire) -> String {
    serialize(wire).to_string()
}

/// Decode a superjson document back into a value tree.
pub fn deserialize(doc: &Value) -> Result<Wire, CodecError> {
    let object = doc.as_object().ok_or(CodecError::NotADocument)?;
    let json = object.get("json").ok_or(CodecError::NotADocument)?;
    let mut wire = Wire::from_json(json.clone());

    let Some(values) = object.get("meta").and_then(|meta| meta.get("values")) else {
        return Ok(wire);
    };
    match values {
        Value::Object(paths) => {
            for (path, raw) in paths {
                let annotation = Annotation::parse(raw, path)?;
                let segments = split_path(path);
                let node = locate(&mut wire, &segments)
                    .ok_or_else(|| CodecError::DanglingPath(path.clone()))?;
                restore(node, annotation, path)?;
            }
        }
        root => {
            let annotation = Annotation::parse(root, "")?;
            restore(&mut wire, annotation, "")?;
        }
    }
    Ok(wire)
}

fn lower(wire: &Wire, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, Annotation)>) -> Value {
    match wire {
        Wire::Undefined => {
            out.push((path.clone(), Annotation::Undefined));
            Value::Null
        }
        Wire::Null => Value::Null,
        Wire::Bool(b) => Value::Bool(*b),
        Wire::Number(n) => Value::Number(n.clone()),
        Wire::NonFinite(f) => {
            out.push((path.clone(), Annotation::Number));
            Value::String(non_finite_label(*f).to_string())
        }
        Wire::BigInt(n) => {
            out.push((path.clone(), Annotation::BigInt));
            Value::String(n.to_string())
        }
        Wire::String(s) => Value::String(s.clone()),
        Wire::Date(dt) => {
            out.push((path.clone(), Annotation::Date));
            Value::String(format_rfc3339(dt))
        }
        Wire::Array(items) => {
            let mut lowered = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push(i.to_string());
                lowered.push(lower(item, path, out));
                path.pop();
            }
            Value::Array(lowered)
        }
        Wire::Object(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                path.push(key.clone());
                map.insert(key.clone(), lower(value, path, out));
                path.pop();
            }
            Value::Object(map)
        }
    }
}

fn restore(node: &mut Wire, annotation: Annotation, path: &str) -> Result<(), CodecError> {
    let invalid = || CodecError::InvalidValue {
        annotation: annotation.as_str(),
        path: path.to_string(),
    };
    *node = match (annotation, &*node) {
        (Annotation::Undefined, _) => Wire::Undefined,
        (Annotation::Date, Wire::String(s)) => Wire::Date(
            parse_offset_datetime(s)
                .ok_or_else(invalid)?
                .with_timezone(&Utc),
        ),
        (Annotation::BigInt, Wire::String(s)) => {
            Wire::BigInt(s.parse().map_err(|_| invalid())?)
        }
        (Annotation::Number, Wire::String(s)) => Wire::NonFinite(match s.as_str() {
            "NaN" => f64::NAN,
            "Infinity" => f64::INFINITY,
            "-Infinity" => f64::NEG_INFINITY,
            _ => return Err(invalid()),
        }),
        _ => return Err(invalid()),
    };
    Ok(())
}

fn locate<'a>(wire: &'a mut Wire, path: &[String]) -> Option<&'a mut Wire> {
    let Some((head, rest)) = path.split_first() else {
        return Some(wire);
    };
    let child = match wire {
        Wire::Object(entries) => entries
            .iter_mut()
            .find(|entry| entry.0 == *head)
            .map(|entry| &mut entry.1)?,
        Wire::Array(items) => items.get_mut(head.parse::<usize>().ok()?)?,
        _ => return None,
    };
    locate(child, rest)
}

fn non_finite_label(f: f64) -> &'static str {
    if f.is_nan() {
        "NaN"
    } else if f > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn join_path(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| s.replace('\\', "\\\\").replace('.', "\\."))
        .collect::<Vec<_>>()
        .join(".")
}

fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '.' => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};

    fn date(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn plain_values_have_no_meta() {
        let doc = serialize(&Wire::object([("name", Wire::String("Acme".into()))]));
        assert_eq!(doc, json!({"json": {"name": "Acme"}}));
    }

    #[test]
    fn dates_are_annotated_by_path() {
        let wire = Wire::object([
            ("dateFounded", Wire::Date(date("2021-03-01T00:00:00Z"))),
            (
                "history",
                Wire::Array(vec![Wire::Null, Wire::Date(date("2022-01-01T12:30:00Z"))]),
            ),
        ]);
        let doc = serialize(&wire);
        assert_eq!(doc["json"]["dateFounded"], "2021-03-01T00:00:00Z");
        assert_eq!(doc["meta"]["values"]["dateFounded"], json!(["Date"]));
        assert_eq!(doc["meta"]["values"]["history.1"], json!(["Date"]));
    }

    #[test]
    fn dates_survive_round_trip_exactly() {
        let precise = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let wire = Wire::object([
            ("at", Wire::Date(precise)),
            ("midnight", Wire::Date(date("2024-02-29T00:00:00Z"))),
        ]);
        let text = to_string(&wire);
        let decoded = deserialize(&serde_json::from_str(&text).unwrap()).unwrap();
        assert_eq!(decoded.get("at"), Some(&Wire::Date(precise)));
        assert_eq!(
            decoded.get("midnight"),
            Some(&Wire::Date(date("2024-02-29T00:00:00Z")))
        );
    }

    #[test]
    fn offset_dates_decode_to_the_same_instant() {
        let doc = json!({
            "json": {"at": "2024-01-01T09:00:00+09:00"},
            "meta": {"values": {"at": ["Date"]}}
        });
        let wire = deserialize(&doc).unwrap();
        assert_eq!(wire.get("at"), Some(&Wire::Date(date("2024-01-01T00:00:00Z"))));
    }

    #[test]
    fn special_scalars_round_trip() {
        let wire = Wire::object([
            ("gone", Wire::Undefined),
            ("big", Wire::BigInt(-(1i128 << 100))),
            ("inf", Wire::NonFinite(f64::INFINITY)),
            ("ninf", Wire::NonFinite(f64::NEG_INFINITY)),
        ]);
        let doc = serialize(&wire);
        assert_eq!(doc["json"]["gone"], Value::Null);
        assert_eq!(doc["json"]["inf"], "Infinity");
        assert_eq!(doc["meta"]["values"]["big"], json!(["bigint"]));

        let decoded = deserialize(&doc).unwrap();
        assert_eq!(decoded.get("gone"), Some(&Wire::Undefined));
        assert_eq!(decoded.get("big"), Some(&Wire::BigInt(-(1i128 << 100))));
        assert_eq!(decoded.get("ninf"), Some(&Wire::NonFinite(f64::NEG_INFINITY)));
    }

    #[test]
    fn nan_decodes_as_nan() {
        let doc = json!({"json": {"x": "NaN"}, "meta": {"values": {"x": ["number"]}}});
        match deserialize(&doc).unwrap().get("x") {
            Some(Wire::NonFinite(f)) => assert!(f.is_nan()),
            other => panic!("expected NaN, got {other:?}"),
        }
    }

    #[test]
    fn dotted_keys_are_escaped() {
        let wire = Wire::object([("v1.2", Wire::Date(date("2020-05-05T05:05:05Z")))]);
        let doc = serialize(&wire);
        assert_eq!(doc["meta"]["values"]["v1\\.2"], json!(["Date"]));
        let decoded = deserialize(&doc).unwrap();
        assert_eq!(
            decoded.get("v1.2"),
            Some(&Wire::Date(date("2020-05-05T05:05:05Z")))
        );
    }

    #[test]
    fn root_annotation_is_bare() {
        let at = date("2023-07-01T00:00:00Z");
        let doc = serialize(&Wire::Date(at));
        assert_eq!(doc["meta"]["values"], json!(["Date"]));
        assert_eq!(deserialize(&doc).unwrap(), Wire::Date(at));
    }

    #[test]
    fn legacy_string_annotations_are_accepted() {
        let doc = json!({"json": {"d": "2020-01-01T00:00:00.000Z"}, "meta": {"values": {"d": "Date"}}});
        assert_eq!(
            deserialize(&doc).unwrap().get("d"),
            Some(&Wire::Date(date("2020-01-01T00:00:00Z")))
        );
    }

    #[test]
    fn unknown_annotation_is_an_error() {
        let doc = json!({"json": {"m": []}, "meta": {"values": {"m": ["map"]}}});
        assert!(matches!(
            deserialize(&doc),
            Err(CodecError::UnknownAnnotation { .. })
        ));
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(matches!(deserialize(&json!([1])), Err(CodecError::NotADocument)));
        let dangling = json!({"json": {}, "meta": {"values": {"missing": ["Date"]}}});
        assert!(matches!(deserialize(&dangling), Err(CodecError::DanglingPath(_))));
        let bad_date = json!({"json": {"d": "yesterday"}, "meta": {"values": {"d": ["Date"]}}});
        assert!(matches!(
            deserialize(&bad_date),
            Err(CodecError::InvalidValue { annotation: "Date", .. })
        ));
    }

    #[test]
    fn path_splitting_handles_escapes() {
        assert_eq!(split_path("a.b\\.c.0"), vec!["a", "b.c", "0"]);
        assert_eq!(split_path("x\\\\.y"), vec!["x\\", "y"]);
        assert_eq!(join_path(&["b.c".to_string(), "x\\".to_string()]), "b\\.c.x\\\\");
    }
}
