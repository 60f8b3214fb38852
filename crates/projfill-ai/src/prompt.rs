//! Prompt construction for grounded extraction.

use projfill_core::CanonicalRecord;
use reqwest::Url;

/// At most this many grounding URLs become `site:` qualifiers.
pub const MAX_SITE_QUERIES: usize = 2;

const ROLE: &str =
    "You are a researcher responsible for extracting structured on-chain project intelligence.";

const PROCESS_RULES: [&str; 9] = [
    "Use only the allowed domains and confirm their credibility.",
    "Provide evidence-backed values for every field and use null only when evidence is absent.",
    "The output must strictly follow the provided JSON Schema with no extra or missing fields.",
    "Ensure categories contains at least one enum item and return ISO 8601 date strings with time-offset (e.g., 2024-01-01T00:00:00Z) for dateFounded and dateLaunch.",
    "Choose devStatus and orgStructure from their enums using the best-supported value (if unresolved, use Evolving Structure for orgStructure, never null).",
    "Provide boolean values for publicGoods and openSource, include at least one founder with name and title, and verify founders via evidence.",
    "Preserve array element structure, remove invalid URLs, and when sources conflict prefer the most recent authoritative evidence, otherwise return null.",
    "Treat RootData-provided founders, dateFounded, dateLaunch, and whitePaper as primary candidates; validate them against schema and corroborate with current evidence.",
    "If ISO 8601 formatted dates cannot be verified, set the corresponding field to null.",
];

/// The fixed system instruction: a role line followed by the numbered rules.
pub fn system_instruction() -> String {
    let mut lines = vec![ROLE.to_string()];
    lines.extend(
        PROCESS_RULES
            .iter()
            .enumerate()
            .map(|(i, rule)| format!("{}) {rule}", i + 1)),
    );
    lines.join("\n")
}

pub fn domain_instruction(grounding_urls: &[String]) -> String {
    if grounding_urls.is_empty() {
        "No trusted domains detected. Prioritize authoritative sources and verify credibility."
            .to_string()
    } else {
        format!(
            "Use only the following domains and validate each domain's credibility: {}.",
            grounding_urls.join(", ")
        )
    }
}

/// Biases the search tool toward the first grounding URLs without
/// restricting the query to them.
pub fn site_hint(grounding_urls: &[String]) -> String {
    let queries: Vec<String> = grounding_urls
        .iter()
        .take(MAX_SITE_QUERIES)
        .map(|url| format!("\"site:{url}\""))
        .collect();
    if queries.is_empty() {
        "When possible, prioritize search sub-queries targeting official and authoritative domains."
            .to_string()
    } else {
        format!(
            "When possible, prioritize search sub-queries that include {}.",
            queries.join(" and ")
        )
    }
}

/// Candidate values the provider already knows, offered for corroboration.
/// Returns `None` when there is nothing to corroborate.
pub fn corroboration_hints(hints: &CanonicalRecord) -> Option<String> {
    let mut lines = Vec::new();
    if !hints.founders.is_empty() {
        let founders: Vec<String> = hints
            .founders
            .iter()
            .map(|f| {
                if f.title.is_empty() {
                    f.name.clone()
                } else {
                    format!("{} ({})", f.name, f.title)
                }
            })
            .collect();
        lines.push(format!("- founders: {}", founders.join("; ")));
    }
    if let Some(date) = &hints.date_founded {
        lines.push(format!("- dateFounded: {date}"));
    }
    if let Some(paper) = &hints.white_paper {
        lines.push(format!("- whitePaper: {paper}"));
    }
    if lines.is_empty() {
        return None;
    }
    lines.insert(
        0,
        "Candidate values from RootData (corroborate before use):".to_string(),
    );
    Some(lines.join("\n"))
}

pub fn user_prompt(
    project_name: &str,
    grounding_urls: &[String],
    hints: Option<&CanonicalRecord>,
) -> String {
    let mut lines = vec![
        format!("Goal: extract and populate form fields about \"{project_name}\"."),
        domain_instruction(grounding_urls),
        site_hint(grounding_urls),
    ];
    if let Some(block) = hints.and_then(corroboration_hints) {
        lines.push(block);
    }
    lines.push(
        "Before filling each field, verify evidence and schema constraints, ensure all required fields have values, and return an object that conforms to the schema (only fields marked nullable may be null).".to_string(),
    );
    lines.push("Do not output any schema-undefined fields or explanatory text.".to_string());
    lines.join("\n")
}

/// Trimmed `http`/`https` URLs from the record, first occurrence kept.
pub fn grounding_urls(record: &CanonicalRecord) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for candidate in record.candidate_urls() {
        let trimmed = candidate.trim();
        let Ok(parsed) = Url::parse(trimmed) else {
            continue;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            continue;
        }
        if !urls.iter().any(|u| u == trimmed) {
            urls.push(trimmed.to_string());
        }
    }
    urls
}

/// Display name for the prompt; falls back to the numeric identifier.
pub fn project_label(record: &CanonicalRecord, project_id: u64) -> String {
    record
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| project_id.to_string())
}
