//! Submission payload construction.
//!
//! [`build_payload`] takes the user's edits plus the candidate they were
//! editing and produces the exact shape the registry accepts. It fails fast
//! on the first unmet required-field invariant, naming the field, so the
//! user always knows which field to fix next.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::parse_calendar_date;
use crate::error::ValidationFailure;
use crate::reconcile::MergedCandidate;
use crate::record::{Founder, Reference, SmartContract, Website};
use crate::sanitize::{resolve_bool, sanitize, sanitize_list, sanitize_nullable};

pub const HAS_FUNDING_LABEL: &str = "Has Funding";
pub const REF_PROVIDER_PROJECT_ID: &str = "rootdataProjectId";
pub const REF_PROVIDER_URL: &str = "rootdataUrl";

/// Funding status as entered: either free text or a yes/no answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FundingInput {
    Flag(bool),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebsiteEdit {
    pub title: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FounderEdit {
    pub name: Option<String>,
    pub title: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartContractEdit {
    pub id: Option<String>,
    pub chain: Option<String>,
    pub addresses: Option<String>,
}

/// Loosely-typed form values. `None` means "not edited": the candidate's
/// value is used instead. An explicit empty value is an edit and is not
/// replaced by the candidate's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateEdits {
    pub name: Option<String>,
    pub tagline: Option<String>,
    #[serde(alias = "description")]
    pub main_description: Option<String>,
    pub categories: Option<Vec<String>>,
    pub logo_url: Option<String>,
    pub websites: Option<Vec<WebsiteEdit>>,
    pub app_url: Option<String>,
    pub date_founded: Option<String>,
    pub date_launch: Option<String>,
    pub dev_status: Option<String>,
    pub funding_status: Option<FundingInput>,
    pub open_source: Option<bool>,
    pub code_repo: Option<String>,
    pub token_contract: Option<String>,
    pub org_structure: Option<String>,
    pub public_goods: Option<bool>,
    pub founders: Option<Vec<FounderEdit>>,
    pub tags: Option<Vec<String>>,
    pub white_paper: Option<String>,
    pub dapp_smart_contracts: Option<Vec<SmartContractEdit>>,
}

/// The strict shape accepted by the registry.
///
/// Only [`build_payload`] constructs one from user input, so every instance
/// carries non-empty required fields and a parsed founding date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub(crate) name: String,
    pub(crate) tagline: String,
    pub(crate) categories: Vec<String>,
    pub(crate) main_description: String,
    pub(crate) logo_url: String,
    pub(crate) websites: Vec<Website>,
    pub(crate) app_url: Option<String>,
    pub(crate) date_founded: DateTime<Utc>,
    pub(crate) date_launch: Option<DateTime<Utc>>,
    pub(crate) dev_status: String,
    pub(crate) funding_status: Option<String>,
    pub(crate) open_source: bool,
    pub(crate) code_repo: Option<String>,
    pub(crate) token_contract: Option<String>,
    pub(crate) org_structure: String,
    pub(crate) public_goods: bool,
    pub(crate) founders: Vec<Founder>,
    pub(crate) tags: Vec<String>,
    pub(crate) white_paper: Option<String>,
    pub(crate) dapp_smart_contracts: Option<Vec<SmartContract>>,
    pub(crate) refs: Option<Vec<Reference>>,
}

impl SubmissionPayload {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn date_founded(&self) -> DateTime<Utc> {
        self.date_founded
    }

    pub fn date_launch(&self) -> Option<DateTime<Utc>> {
        self.date_launch
    }

    pub fn refs(&self) -> Option<&[Reference]> {
        self.refs.as_deref()
    }
}

fn required(field: &'static str, value: String, reason: &str) -> Result<String, ValidationFailure> {
    if value.is_empty() {
        Err(ValidationFailure::new(field, reason))
    } else {
        Ok(value)
    }
}

fn normalize_funding(value: Option<&FundingInput>) -> Option<String> {
    match value? {
        FundingInput::Text(text) => sanitize_nullable(Some(text.as_str())),
        FundingInput::Flag(true) => Some(HAS_FUNDING_LABEL.to_string()),
        FundingInput::Flag(false) => None,
    }
}

fn build_refs(prior: &MergedCandidate) -> Option<Vec<Reference>> {
    let mut refs = Vec::new();
    if let Some(id) = prior.project_id {
        refs.push(Reference {
            key: REF_PROVIDER_PROJECT_ID.to_string(),
            value: id.to_string(),
        });
    }
    if let Some(url) = sanitize_nullable(prior.provider_url.as_deref()) {
        refs.push(Reference {
            key: REF_PROVIDER_URL.to_string(),
            value: url,
        });
    }
    (!refs.is_empty()).then_some(refs)
}

/// Validate and normalise edits against the candidate they started from.
pub fn build_payload(
    edits: &CandidateEdits,
    prior: &MergedCandidate,
) -> Result<SubmissionPayload, ValidationFailure> {
    let name = required(
        "name",
        sanitize(edits.name.as_deref().or(prior.name.as_deref())),
        "Project name is required before submission.",
    )?;

    let tagline = required(
        "tagline",
        sanitize(edits.tagline.as_deref().or(prior.tagline.as_deref())),
        "Tagline is required before submission.",
    )?;

    let main_description = required(
        "description",
        sanitize(
            edits
                .main_description
                .as_deref()
                .or(prior.description.as_deref()),
        ),
        "Project description is required before submission.",
    )?;

    let categories = match &edits.categories {
        Some(edited) => sanitize_list(edited),
        None => sanitize_list(prior.categories.iter().map(|c| c.as_str())),
    };
    if categories.is_empty() {
        return Err(ValidationFailure::new(
            "categories",
            "Select at least one category before submission.",
        ));
    }

    let logo_url = required(
        "logoUrl",
        sanitize(edits.logo_url.as_deref().or(prior.logo_url.as_deref())),
        "Please provide a logo URL before submission.",
    )?;

    let websites: Vec<Website> = match &edits.websites {
        Some(edited) => edited
            .iter()
            .map(|w| (sanitize(w.title.as_deref()), sanitize(w.url.as_deref())))
            .collect::<Vec<_>>(),
        None => prior
            .websites
            .iter()
            .map(|w| (sanitize(Some(w.title.as_str())), sanitize(Some(w.url.as_str()))))
            .collect::<Vec<_>>(),
    }
    .into_iter()
    .filter(|(title, url)| !title.is_empty() && !url.is_empty())
    .map(|(title, url)| Website { title, url })
    .collect();
    if websites.is_empty() {
        return Err(ValidationFailure::new(
            "websites",
            "Provide at least one website link before submission.",
        ));
    }

    let app_url = sanitize_nullable(edits.app_url.as_deref());

    let date_founded = parse_calendar_date(&sanitize(
        edits
            .date_founded
            .as_deref()
            .or(prior.date_founded.as_deref()),
    ))
    .ok_or_else(|| {
        ValidationFailure::new("dateFounded", "Founding date must be a valid ISO string.")
    })?;

    // Optional: an unparseable launch date is dropped rather than rejected.
    let date_launch = sanitize_nullable(
        edits
            .date_launch
            .as_deref()
            .or(prior.date_launch.as_deref()),
    )
    .and_then(|raw| parse_calendar_date(&raw));

    let dev_status = required(
        "devStatus",
        match &edits.dev_status {
            Some(edited) => sanitize(Some(edited.as_str())),
            None => prior.dev_status.map(|s| s.as_str().to_string()).unwrap_or_default(),
        },
        "Development status is required before submission.",
    )?;

    let funding_status = match &edits.funding_status {
        Some(edited) => normalize_funding(Some(edited)),
        None => normalize_funding(prior.has_funding.map(FundingInput::Flag).as_ref()),
    };

    let open_source = resolve_bool(edits.open_source, prior.open_source).ok_or_else(|| {
        ValidationFailure::new(
            "openSource",
            "Please indicate whether the project is open source.",
        )
    })?;

    let public_goods = resolve_bool(edits.public_goods, prior.public_goods).ok_or_else(|| {
        ValidationFailure::new(
            "publicGoods",
            "Please indicate whether the project is a public good.",
        )
    })?;

    let code_repo = sanitize_nullable(edits.code_repo.as_deref().or(prior.code_repo.as_deref()));
    let token_contract = sanitize_nullable(
        edits
            .token_contract
            .as_deref()
            .or(prior.token_contract.as_deref()),
    );

    let org_structure = required(
        "orgStructure",
        match &edits.org_structure {
            Some(edited) => sanitize(Some(edited.as_str())),
            None => prior
                .org_structure
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
        },
        "Organization structure is required before submission.",
    )?;

    let founders: Vec<Founder> = match &edits.founders {
        Some(edited) => edited
            .iter()
            .map(|f| Founder {
                name: sanitize(f.name.as_deref()),
                title: sanitize(f.title.as_deref()),
                region: sanitize_nullable(f.region.as_deref()),
            })
            .collect::<Vec<_>>(),
        None => prior
            .founders
            .iter()
            .map(|f| Founder {
                name: sanitize(Some(f.name.as_str())),
                title: sanitize(Some(f.title.as_str())),
                region: sanitize_nullable(f.region.as_deref()),
            })
            .collect::<Vec<_>>(),
    }
    .into_iter()
    .filter(|f| !f.name.is_empty() && !f.title.is_empty())
    .collect();
    if founders.is_empty() {
        return Err(ValidationFailure::new(
            "founders",
            "Please provide at least one founder with name and title.",
        ));
    }

    let tags = match &edits.tags {
        Some(edited) => sanitize_list(edited),
        None => sanitize_list(&prior.tags),
    };

    let white_paper = sanitize_nullable(
        edits
            .white_paper
            .as_deref()
            .or(prior.white_paper.as_deref()),
    );

    let dapp_smart_contracts = edits.dapp_smart_contracts.as_ref().and_then(|contracts| {
        let kept: Vec<SmartContract> = contracts
            .iter()
            .filter_map(|c| {
                Some(SmartContract {
                    id: sanitize_nullable(c.id.as_deref())?,
                    chain: sanitize_nullable(c.chain.as_deref())?,
                    addresses: sanitize_nullable(c.addresses.as_deref())?,
                })
            })
            .collect();
        (!kept.is_empty()).then_some(kept)
    });

    Ok(SubmissionPayload {
        name,
        tagline,
        categories,
        main_description,
        logo_url,
        websites,
        app_url,
        date_founded,
        date_launch,
        dev_status,
        funding_status,
        open_source,
        code_repo,
        token_contract,
        org_structure,
        public_goods,
        founders,
        tags,
        white_paper,
        dapp_smart_contracts,
        refs: build_refs(prior),
    })
}
