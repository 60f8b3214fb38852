//! Typed value tree for the registry's lossless wire format.
//!
//! Plain JSON has no date, `undefined`, bigint, or non-finite number. [`Wire`]
//! keeps those apart from their JSON look-alikes so the codec can annotate
//! them and restore them exactly on the other side.

use chrono::{DateTime, Utc};
use serde_json::{Map, Number, Value};

use crate::dates::format_rfc3339;
use crate::payload::SubmissionPayload;
use crate::record::{Founder, Reference, SmartContract, Website};

#[derive(Debug, Clone, PartialEq)]
pub enum Wire {
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    /// `NaN`, `Infinity`, or `-Infinity`.
    NonFinite(f64),
    BigInt(i128),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Wire>),
    /// Ordered key/value pairs.
    Object(Vec<(String, Wire)>),
}

impl Wire {
    pub fn object<I, K>(entries: I) -> Wire
    where
        I: IntoIterator<Item = (K, Wire)>,
        K: Into<String>,
    {
        Wire::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Lift plain JSON. Nothing is annotated: strings stay strings.
    pub fn from_json(value: Value) -> Wire {
        match value {
            Value::Null => Wire::Null,
            Value::Bool(b) => Wire::Bool(b),
            Value::Number(n) => Wire::Number(n),
            Value::String(s) => Wire::String(s),
            Value::Array(items) => Wire::Array(items.into_iter().map(Wire::from_json).collect()),
            Value::Object(map) => Wire::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Wire::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Lower to plain JSON. Dates become RFC 3339 strings, bigints decimal
    /// strings, non-finite numbers `null`; `undefined` object members are
    /// dropped and `undefined` array items become `null`.
    pub fn to_plain_json(&self) -> Value {
        match self {
            Wire::Undefined | Wire::Null | Wire::NonFinite(_) => Value::Null,
            Wire::Bool(b) => Value::Bool(*b),
            Wire::Number(n) => Value::Number(n.clone()),
            Wire::BigInt(n) => Value::String(n.to_string()),
            Wire::String(s) => Value::String(s.clone()),
            Wire::Date(dt) => Value::String(format_rfc3339(dt)),
            Wire::Array(items) => Value::Array(items.iter().map(Wire::to_plain_json).collect()),
            Wire::Object(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    if !matches!(value, Wire::Undefined) {
                        map.insert(key.clone(), value.to_plain_json());
                    }
                }
                Value::Object(map)
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Wire> {
        match self {
            Wire::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Conversion into the lossless value tree.
pub trait ToWire {
    fn to_wire(&self) -> Wire;
}

impl ToWire for str {
    fn to_wire(&self) -> Wire {
        Wire::String(self.to_string())
    }
}

impl ToWire for String {
    fn to_wire(&self) -> Wire {
        Wire::String(self.clone())
    }
}

impl ToWire for bool {
    fn to_wire(&self) -> Wire {
        Wire::Bool(*self)
    }
}

impl ToWire for DateTime<Utc> {
    fn to_wire(&self) -> Wire {
        Wire::Date(*self)
    }
}

impl<T: ToWire> ToWire for Option<T> {
    fn to_wire(&self) -> Wire {
        match self {
            Some(v) => v.to_wire(),
            None => Wire::Null,
        }
    }
}

impl<T: ToWire> ToWire for Vec<T> {
    fn to_wire(&self) -> Wire {
        Wire::Array(self.iter().map(ToWire::to_wire).collect())
    }
}

impl ToWire for Website {
    fn to_wire(&self) -> Wire {
        Wire::object([("title", self.title.to_wire()), ("url", self.url.to_wire())])
    }
}

impl ToWire for Founder {
    fn to_wire(&self) -> Wire {
        let mut entries = vec![
            ("name".to_string(), self.name.to_wire()),
            ("title".to_string(), self.title.to_wire()),
        ];
        if let Some(region) = &self.region {
            entries.push(("region".to_string(), region.to_wire()));
        }
        Wire::Object(entries)
    }
}

impl ToWire for SmartContract {
    fn to_wire(&self) -> Wire {
        Wire::object([
            ("id", self.id.to_wire()),
            ("chain", self.chain.to_wire()),
            ("addresses", self.addresses.to_wire()),
        ])
    }
}

impl ToWire for Reference {
    fn to_wire(&self) -> Wire {
        Wire::object([("key", self.key.to_wire()), ("value", self.value.to_wire())])
    }
}

impl ToWire for SubmissionPayload {
    fn to_wire(&self) -> Wire {
        Wire::object([
            ("name", self.name.to_wire()),
            ("tagline", self.tagline.to_wire()),
            ("categories", self.categories.to_wire()),
            ("mainDescription", self.main_description.to_wire()),
            ("logoUrl", self.logo_url.to_wire()),
            ("websites", self.websites.to_wire()),
            ("appUrl", self.app_url.to_wire()),
            ("dateFounded", self.date_founded.to_wire()),
            ("dateLaunch", self.date_launch.to_wire()),
            ("devStatus", self.dev_status.to_wire()),
            ("fundingStatus", self.funding_status.to_wire()),
            ("openSource", self.open_source.to_wire()),
            ("codeRepo", self.code_repo.to_wire()),
            ("tokenContract", self.token_contract.to_wire()),
            ("orgStructure", self.org_structure.to_wire()),
            ("publicGoods", self.public_goods.to_wire()),
            ("founders", self.founders.to_wire()),
            ("tags", self.tags.to_wire()),
            ("whitePaper", self.white_paper.to_wire()),
            ("dappSmartContracts", self.dapp_smart_contracts.to_wire()),
            ("refs", self.refs.to_wire()),
        ])
    }
}
