//! Field reconciliation between the provider record and the extractor output.
//!
//! Precedence is declared per field in [`Field::winner`]. The merge itself is
//! mechanical: take the winner's value when it has one, otherwise the other
//! source's, and record which source supplied it.
//!
//! Provider values win for identity and presentation fields. Extractor values
//! win for structured fields, including the founder, date, and whitepaper
//! fields the provider also supplies: the provider's copy is unvalidated
//! input to the extractor, which has already corroborated or replaced it.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::dates::{format_rfc3339, parse_calendar_date};
use crate::record::{CanonicalRecord, Founder, Website};
use crate::sanitize::sanitize_nullable;
use crate::schema::{Category, DevStatus, ExtractedRecord, OrgStructure};

pub const OFFICIAL_WEBSITE_TITLE: &str = "Official Website";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Canonical,
    Extracted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Name,
    Tagline,
    LogoUrl,
    Description,
    Tags,
    Websites,
    ProviderUrl,
    Funding,
    Categories,
    DateFounded,
    DateLaunch,
    DevStatus,
    OrgStructure,
    OpenSource,
    PublicGoods,
    Founders,
    CodeRepo,
    TokenContract,
    WhitePaper,
}

impl Field {
    #[cfg(test)]
    const ALL: &'static [Field] = &[
        Field::Name,
        Field::Tagline,
        Field::LogoUrl,
        Field::Description,
        Field::Tags,
        Field::Websites,
        Field::ProviderUrl,
        Field::Funding,
        Field::Categories,
        Field::DateFounded,
        Field::DateLaunch,
        Field::DevStatus,
        Field::OrgStructure,
        Field::OpenSource,
        Field::PublicGoods,
        Field::Founders,
        Field::CodeRepo,
        Field::TokenContract,
        Field::WhitePaper,
    ];

    /// Source whose value is kept when both supply one.
    pub const fn winner(self) -> Source {
        match self {
            // Identity and presentation.
            Field::Name
            | Field::Tagline
            | Field::LogoUrl
            | Field::Description
            | Field::Tags
            | Field::Websites
            | Field::ProviderUrl
            | Field::Funding => Source::Canonical,
            // Classification and evidence-backed structure.
            Field::Categories
            | Field::DateFounded
            | Field::DateLaunch
            | Field::DevStatus
            | Field::OrgStructure
            | Field::OpenSource
            | Field::PublicGoods
            | Field::Founders
            | Field::CodeRepo
            | Field::TokenContract
            | Field::WhitePaper => Source::Extracted,
        }
    }
}

/// Union of both sources, presented to the user for review and editing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergedCandidate {
    pub project_id: Option<u64>,
    pub name: Option<String>,
    pub tagline: Option<String>,
    pub logo_url: Option<String>,
    #[serde(rename = "mainDescription")]
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub websites: Vec<Website>,
    #[serde(rename = "rootdataurl")]
    pub provider_url: Option<String>,
    #[serde(rename = "fundingStatus")]
    pub has_funding: Option<bool>,
    pub categories: Vec<Category>,
    pub date_founded: Option<String>,
    pub date_launch: Option<String>,
    pub dev_status: Option<DevStatus>,
    pub org_structure: Option<OrgStructure>,
    pub open_source: Option<bool>,
    pub public_goods: Option<bool>,
    pub founders: Vec<Founder>,
    pub code_repo: Option<String>,
    pub token_contract: Option<String>,
    pub white_paper: Option<String>,
    /// Source that supplied each populated field.
    pub provenance: BTreeMap<Field, Source>,
}

#[derive(Default)]
struct Merge {
    provenance: BTreeMap<Field, Source>,
}

impl Merge {
    fn pick<T>(&mut self, field: Field, canonical: Option<T>, extracted: Option<T>) -> Option<T> {
        let ordered = match field.winner() {
            Source::Canonical => [(Source::Canonical, canonical), (Source::Extracted, extracted)],
            Source::Extracted => [(Source::Extracted, extracted), (Source::Canonical, canonical)],
        };
        let (source, value) = ordered
            .into_iter()
            .find_map(|(source, value)| value.map(|v| (source, v)))?;
        self.provenance.insert(field, source);
        Some(value)
    }

    fn pick_list<T>(&mut self, field: Field, canonical: Vec<T>, extracted: Vec<T>) -> Vec<T> {
        self.pick(field, non_empty(canonical), non_empty(extracted))
            .unwrap_or_default()
    }
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

fn text(value: &Option<String>) -> Option<String> {
    sanitize_nullable(value.as_deref())
}

/// Provider dates arrive in whatever shape the provider uses; normalise the
/// parseable ones and keep the rest verbatim for the user to fix.
fn provider_date(value: &Option<String>) -> Option<String> {
    let raw = text(value)?;
    Some(
        parse_calendar_date(&raw)
            .map(|dt| format_rfc3339(&dt))
            .unwrap_or(raw),
    )
}

/// Merge the provider record and extractor output into one candidate.
///
/// Pure and deterministic: the same inputs always yield the same candidate.
pub fn reconcile(canonical: &CanonicalRecord, extracted: &ExtractedRecord) -> MergedCandidate {
    let mut merge = Merge::default();

    let canonical_websites: Vec<Website> = text(&canonical.website)
        .map(|url| Website {
            title: OFFICIAL_WEBSITE_TITLE.to_string(),
            url,
        })
        .into_iter()
        .collect();
    let canonical_tags: Vec<String> = canonical
        .tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    MergedCandidate {
        project_id: canonical.project_id,
        name: merge.pick(Field::Name, text(&canonical.name), None),
        tagline: merge.pick(Field::Tagline, text(&canonical.tagline), None),
        logo_url: merge.pick(Field::LogoUrl, text(&canonical.logo_url), None),
        description: merge.pick(Field::Description, text(&canonical.description), None),
        tags: merge.pick_list(Field::Tags, canonical_tags, Vec::new()),
        websites: merge.pick_list(Field::Websites, canonical_websites, Vec::new()),
        provider_url: merge.pick(Field::ProviderUrl, text(&canonical.provider_url), None),
        has_funding: merge.pick(Field::Funding, canonical.has_funding, None),
        categories: merge.pick_list(Field::Categories, Vec::new(), extracted.categories.clone()),
        date_founded: merge.pick(
            Field::DateFounded,
            provider_date(&canonical.date_founded),
            extracted.date_founded.map(|d| format_rfc3339(&d.with_timezone(&Utc))),
        ),
        date_launch: merge.pick(
            Field::DateLaunch,
            None,
            extracted.date_launch.map(|d| format_rfc3339(&d.with_timezone(&Utc))),
        ),
        dev_status: merge.pick(Field::DevStatus, None, Some(extracted.dev_status)),
        org_structure: merge.pick(Field::OrgStructure, None, Some(extracted.org_structure)),
        open_source: merge.pick(Field::OpenSource, None, Some(extracted.open_source)),
        public_goods: merge.pick(Field::PublicGoods, None, Some(extracted.public_goods)),
        founders: merge.pick_list(
            Field::Founders,
            canonical.founders.clone(),
            extracted.founders.clone(),
        ),
        code_repo: merge.pick(Field::CodeRepo, None, extracted.code_repo.clone()),
        token_contract: merge.pick(Field::TokenContract, None, extracted.token_contract.clone()),
        white_paper: merge.pick(
            Field::WhitePaper,
            text(&canonical.white_paper),
            extracted.white_paper.clone(),
        ),
        provenance: merge.provenance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::parse_offset_datetime;

    fn canonical() -> CanonicalRecord {
        CanonicalRecord {
            project_id: Some(42),
            name: Some(" Acme Protocol ".into()),
            tagline: Some("Settlement for everyone".into()),
            logo_url: Some("https://cdn.example/acme.png".into()),
            description: Some("Acme builds rails.".into()),
            website: Some("https://acme.io".into()),
            provider_url: Some("https://www.rootdata.com/Projects/detail/Acme?k=NDI=".into()),
            tags: vec!["Infra".into(), " ".into()],
            has_funding: Some(true),
            founders: vec![Founder {
                name: "Unverified Person".into(),
                title: "Founder".into(),
                region: None,
            }],
            date_founded: Some("2019".into()),
            white_paper: Some("https://acme.io/old-whitepaper.pdf".into()),
        }
    }

    fn extracted() -> ExtractedRecord {
        ExtractedRecord {
            categories: vec![Category::Infrastructure],
            date_founded: parse_offset_datetime("2020-05-01T00:00:00+02:00"),
            date_launch: None,
            dev_status: DevStatus::Beta,
            org_structure: OrgStructure::Foundation,
            open_source: true,
            public_goods: false,
            founders: vec![Founder {
                name: "Ada Lovelace".into(),
                title: "CEO".into(),
                region: None,
            }],
            code_repo: Some("https://github.com/acme".into()),
            token_contract: None,
            white_paper: Some("https://acme.io/whitepaper.pdf".into()),
        }
    }

    #[test]
    fn every_field_has_a_winner() {
        let canonical_fields = Field::ALL
            .iter()
            .filter(|f| f.winner() == Source::Canonical)
            .count();
        assert_eq!(canonical_fields, 8);
        assert_eq!(Field::ALL.len(), 19);
    }

    #[test]
    fn canonical_wins_presentation_fields() {
        let merged = reconcile(&canonical(), &extracted());
        assert_eq!(merged.name.as_deref(), Some("Acme Protocol"));
        assert_eq!(merged.websites[0].title, OFFICIAL_WEBSITE_TITLE);
        assert_eq!(merged.websites[0].url, "https://acme.io");
        assert_eq!(merged.tags, vec!["Infra".to_string()]);
        assert_eq!(merged.provenance[&Field::Name], Source::Canonical);
    }

    #[test]
    fn extracted_wins_evidence_fields_over_canonical_candidates() {
        let merged = reconcile(&canonical(), &extracted());
        assert_eq!(merged.founders[0].name, "Ada Lovelace");
        assert_eq!(merged.date_founded.as_deref(), Some("2020-04-30T22:00:00Z"));
        assert_eq!(
            merged.white_paper.as_deref(),
            Some("https://acme.io/whitepaper.pdf")
        );
        assert_eq!(merged.provenance[&Field::Founders], Source::Extracted);
    }

    #[test]
    fn canonical_fills_gaps_the_extractor_left_null() {
        let mut ext = extracted();
        ext.date_founded = None;
        ext.white_paper = None;
        let merged = reconcile(&canonical(), &ext);
        assert_eq!(merged.date_founded.as_deref(), Some("2019-01-01T00:00:00Z"));
        assert_eq!(merged.provenance[&Field::DateFounded], Source::Canonical);
        assert_eq!(
            merged.white_paper.as_deref(),
            Some("https://acme.io/old-whitepaper.pdf")
        );
    }

    #[test]
    fn empty_canonical_keeps_extracted_structure() {
        let merged = reconcile(&CanonicalRecord::default(), &extracted());
        assert!(merged.name.is_none());
        assert!(merged.websites.is_empty());
        assert_eq!(merged.categories, vec![Category::Infrastructure]);
        assert_eq!(merged.org_structure, Some(OrgStructure::Foundation));
        assert!(!merged.provenance.contains_key(&Field::Name));
    }

    #[test]
    fn reconcile_is_deterministic() {
        let first = reconcile(&canonical(), &extracted());
        let second = reconcile(&canonical(), &extracted());
        assert_eq!(first, second);
    }

    #[test]
    fn candidate_serializes_with_form_field_names() {
        let merged = reconcile(&canonical(), &extracted());
        let json = serde_json::to_value(&merged).unwrap();
        assert_eq!(json["mainDescription"], "Acme builds rails.");
        assert_eq!(json["fundingStatus"], true);
        assert_eq!(json["orgStructure"], "Foundation");
        assert_eq!(json["provenance"]["logoUrl"], "canonical");
        let back: MergedCandidate = serde_json::from_value(json).unwrap();
        assert_eq!(back, merged);
    }
}
