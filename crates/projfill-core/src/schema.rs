//! Output schema for AI extraction and its boundary validation.
//!
//! The same shape is described twice: as a JSON Schema handed to the AI
//! capability ([`extraction_schema`]) and as [`ExtractedRecord`], which every
//! returned object is re-validated against ([`ExtractedRecord::from_value`])
//! regardless of what the capability claims to guarantee.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::record::Founder;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown value {value:?} for {kind}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! closed_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $label:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            pub fn labels() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s.trim())
                    .ok_or_else(|| UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

closed_enum!(
    /// Registry project category.
    Category, "category" {
        Applications => "Applications/dApps",
        Community => "Community & Coordination",
        DeveloperTools => "Developer tools",
        Hubs => "Hubs",
        Infrastructure => "Infrastructure",
        SecurityPrivacy => "Security & Privacy",
        StorageData => "Storage & Data",
        Events => "Events",
        LocalCommunities => "Local Communities",
        Other => "Other",
    }
);

closed_enum!(
    /// Development stage of a project.
    DevStatus, "devStatus" {
        IdeaWhitepaper => "Idea/Whitepaper",
        Prototype => "Prototype",
        InDevelopment => "In development",
        Alpha => "Alpha",
        Beta => "Beta",
        BrokenAbandoned => "Broken / Abandoned",
        Concept => "Concept",
        Stealth => "Stealth",
        ActiveCommunity => "Active Community",
    }
);

closed_enum!(
    /// Legal or organisational form behind a project.
    OrgStructure, "orgStructure" {
        ForProfit => "For-Profit Company",
        NonProfit => "Non-Profit Organization / Association",
        Foundation => "Foundation",
        Cooperative => "Cooperative",
        Dao => "DAO",
        FederatedDao => "Federated DAO / SubDAO",
        ProjectWithinDao => "Project within a DAO",
        AnonymousCollective => "Anonymous Collective",
        SoleDeveloper => "Sole Developer",
        Academic => "University / Academic-Led Initiative",
        PublicPrivate => "Public-Private Partnership",
        CommunityLed => "Community-Led Initiative (no legal entity)",
        Hybrid => "Hybrid Structure (e.g. Company + DAO)",
        Evolving => "Evolving Structure",
    }
);

impl OrgStructure {
    /// Value used when the evidence does not resolve a structure.
    pub const SENTINEL: OrgStructure = OrgStructure::Evolving;
}

impl Default for OrgStructure {
    fn default() -> Self {
        Self::SENTINEL
    }
}

/// Top-level keys of the extraction output, in schema order.
pub const EXTRACTION_FIELDS: &[&str] = &[
    "categories",
    "dateFounded",
    "dateLaunch",
    "devStatus",
    "orgStructure",
    "openSource",
    "publicGoods",
    "founders",
    "codeRepo",
    "tokenContract",
    "whitePaper",
];

/// Structured fields produced by AI extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtractedRecord {
    pub categories: Vec<Category>,
    pub date_founded: Option<DateTime<FixedOffset>>,
    pub date_launch: Option<DateTime<FixedOffset>>,
    pub dev_status: DevStatus,
    #[serde(deserialize_with = "org_structure_or_sentinel")]
    pub org_structure: OrgStructure,
    pub open_source: bool,
    pub public_goods: bool,
    pub founders: Vec<Founder>,
    pub code_repo: Option<String>,
    pub token_contract: Option<String>,
    pub white_paper: Option<String>,
}

fn org_structure_or_sentinel<'de, D>(deserializer: D) -> Result<OrgStructure, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<OrgStructure>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("output is not a JSON object")]
    NotAnObject,
    #[error("output is missing fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("output does not match the schema: {0}")]
    Shape(String),
    #[error("categories must contain at least one value")]
    NoCategories,
    #[error("at least one founder with name and title is required")]
    NoFounders,
}

impl ExtractedRecord {
    /// Validate a capability response against the extraction schema.
    ///
    /// Rejects extra or missing keys, out-of-enum values, offset-less dates,
    /// and empty categories or founders. A null `orgStructure` becomes the
    /// sentinel; blank optional strings become `None`; repeated categories
    /// collapse to their first occurrence.
    pub fn from_value(value: Value) -> Result<Self, SchemaViolation> {
        let object = value.as_object().ok_or(SchemaViolation::NotAnObject)?;
        let missing: Vec<String> = EXTRACTION_FIELDS
            .iter()
            .filter(|field| !object.contains_key(**field))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SchemaViolation::MissingFields(missing));
        }

        let mut record: ExtractedRecord =
            serde_json::from_value(value).map_err(|e| SchemaViolation::Shape(e.to_string()))?;

        let mut seen = Vec::with_capacity(record.categories.len());
        record.categories.retain(|c| {
            let fresh = !seen.contains(c);
            seen.push(*c);
            fresh
        });
        if record.categories.is_empty() {
            return Err(SchemaViolation::NoCategories);
        }

        record.founders = record
            .founders
            .into_iter()
            .filter_map(|f| {
                let name = f.name.trim();
                let title = f.title.trim();
                (!name.is_empty() && !title.is_empty()).then(|| Founder {
                    name: name.to_string(),
                    title: title.to_string(),
                    region: f
                        .region
                        .map(|r| r.trim().to_string())
                        .filter(|r| !r.is_empty()),
                })
            })
            .collect();
        if record.founders.is_empty() {
            return Err(SchemaViolation::NoFounders);
        }

        for slot in [
            &mut record.code_repo,
            &mut record.token_contract,
            &mut record.white_paper,
        ] {
            *slot = slot
                .take()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
        }

        Ok(record)
    }
}

/// JSON Schema for the extraction output (strict structured-output form:
/// every key required, nullability expressed in the type, no extra keys).
pub fn extraction_schema() -> Value {
    let nullable_string = |description: &str| {
        json!({ "type": ["string", "null"], "description": description })
    };

    json!({
        "type": "object",
        "additionalProperties": false,
        "required": EXTRACTION_FIELDS,
        "properties": {
            "categories": {
                "type": "array",
                "minItems": 1,
                "items": { "type": "string", "enum": Category::labels() },
                "description": "At least one project category."
            },
            "dateFounded": nullable_string(
                "Founding date, ISO 8601 with offset (e.g. 2024-01-01T00:00:00Z); null if unverifiable."
            ),
            "dateLaunch": nullable_string(
                "Launch date, ISO 8601 with offset; null if unverifiable."
            ),
            "devStatus": { "type": "string", "enum": DevStatus::labels() },
            "orgStructure": {
                "type": "string",
                "enum": OrgStructure::labels(),
                "description": "Use \"Evolving Structure\" when unresolved; never null."
            },
            "openSource": { "type": "boolean" },
            "publicGoods": { "type": "boolean" },
            "founders": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["name", "title"],
                    "properties": {
                        "name": { "type": "string" },
                        "title": { "type": "string" }
                    }
                }
            },
            "codeRepo": nullable_string("Source code repository URL."),
            "tokenContract": nullable_string("Token contract address or explorer URL."),
            "whitePaper": nullable_string("Whitepaper URL.")
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Value {
        json!({
            "categories": ["Infrastructure", "Developer tools"],
            "dateFounded": "2021-03-01T00:00:00Z",
            "dateLaunch": null,
            "devStatus": "Beta",
            "orgStructure": "DAO",
            "openSource": true,
            "publicGoods": false,
            "founders": [{ "name": "Ada Lovelace", "title": "CEO" }],
            "codeRepo": "https://github.com/acme",
            "tokenContract": null,
            "whitePaper": "  "
        })
    }

    #[test]
    fn accepts_valid_output() {
        let record = ExtractedRecord::from_value(valid()).unwrap();
        assert_eq!(
            record.categories,
            vec![Category::Infrastructure, Category::DeveloperTools]
        );
        assert_eq!(record.dev_status, DevStatus::Beta);
        assert_eq!(record.org_structure, OrgStructure::Dao);
        assert!(record.date_launch.is_none());
        assert!(record.white_paper.is_none());
    }

    #[test]
    fn null_org_structure_falls_back_to_sentinel() {
        let mut value = valid();
        value["orgStructure"] = Value::Null;
        let record = ExtractedRecord::from_value(value).unwrap();
        assert_eq!(record.org_structure, OrgStructure::Evolving);
        assert_eq!(record.org_structure.as_str(), "Evolving Structure");
    }

    #[test]
    fn empty_categories_rejected() {
        let mut value = valid();
        value["categories"] = json!([]);
        assert_eq!(
            ExtractedRecord::from_value(value),
            Err(SchemaViolation::NoCategories)
        );
    }

    #[test]
    fn duplicate_categories_collapse() {
        let mut value = valid();
        value["categories"] = json!(["Hubs", "Hubs", "Other"]);
        let record = ExtractedRecord::from_value(value).unwrap();
        assert_eq!(record.categories, vec![Category::Hubs, Category::Other]);
    }

    #[test]
    fn out_of_enum_value_rejected() {
        let mut value = valid();
        value["devStatus"] = json!("Mainnet");
        assert!(matches!(
            ExtractedRecord::from_value(value),
            Err(SchemaViolation::Shape(_))
        ));
    }

    #[test]
    fn extra_field_rejected() {
        let mut value = valid();
        value["summary"] = json!("extra");
        assert!(matches!(
            ExtractedRecord::from_value(value),
            Err(SchemaViolation::Shape(_))
        ));
    }

    #[test]
    fn missing_nullable_field_rejected() {
        let mut value = valid();
        value.as_object_mut().unwrap().remove("tokenContract");
        assert_eq!(
            ExtractedRecord::from_value(value),
            Err(SchemaViolation::MissingFields(vec!["tokenContract".into()]))
        );
    }

    #[test]
    fn offsetless_date_rejected() {
        let mut value = valid();
        value["dateFounded"] = json!("2021-03-01");
        assert!(matches!(
            ExtractedRecord::from_value(value),
            Err(SchemaViolation::Shape(_))
        ));
    }

    #[test]
    fn blank_founders_rejected() {
        let mut value = valid();
        value["founders"] = json!([{ "name": " ", "title": "CEO" }]);
        assert_eq!(
            ExtractedRecord::from_value(value),
            Err(SchemaViolation::NoFounders)
        );
    }

    #[test]
    fn non_object_rejected() {
        assert_eq!(
            ExtractedRecord::from_value(json!(["nope"])),
            Err(SchemaViolation::NotAnObject)
        );
    }

    #[test]
    fn schema_lists_every_field_as_required() {
        let schema = extraction_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, EXTRACTION_FIELDS);
        assert_eq!(
            schema["properties"]["orgStructure"]["enum"]
                .as_array()
                .unwrap()
                .len(),
            OrgStructure::ALL.len()
        );
        assert_eq!(schema["additionalProperties"], json!(false));
    }

    #[test]
    fn enum_labels_roundtrip_through_from_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(*category));
        }
        assert!("Mainnet".parse::<DevStatus>().is_err());
    }
}
