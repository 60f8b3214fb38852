//! Vertical card display for a merged candidate.
//!
//! Groups fields into sections and tags each value with the source that
//! supplied it. Sections with no populated field are skipped.

use std::fmt::Write;

use projfill_core::{Field, MergedCandidate, SearchHit, Source};

const MAX_LIST_ITEMS: usize = 10;

type Row = (&'static str, Option<Field>, Option<String>);

// ── Public API ──

pub fn print_candidate_card(candidate: &MergedCandidate) {
    print!("{}", render_card(candidate));
}

pub fn print_search_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("(no matches)");
        return;
    }
    for hit in hits {
        println!("  {:<10} {}", hit.id, hit.name);
        if let Some(intro) = &hit.introduce {
            println!("  {:<10} {}", "", intro);
        }
    }
}

pub fn render_card(candidate: &MergedCandidate) -> String {
    let mut out = String::new();
    let name = candidate.name.as_deref().unwrap_or("(unnamed)");
    let _ = writeln!(out, "=== {name} ===");
    if let Some(tagline) = &candidate.tagline {
        let _ = writeln!(out, "{tagline}");
    }
    let _ = writeln!(out);

    render_section(&mut out, candidate, "Identity", identity(candidate));
    render_section(&mut out, candidate, "Classification", classification(candidate));
    render_section(&mut out, candidate, "Dates", dates(candidate));
    render_team(&mut out, candidate);
    render_section(&mut out, candidate, "Links", links(candidate));
    out
}

// ── Section contents ──

fn identity(c: &MergedCandidate) -> Vec<Row> {
    vec![
        ("project_id", None, c.project_id.map(|id| id.to_string())),
        ("logo_url", Some(Field::LogoUrl), c.logo_url.clone()),
        ("description", Some(Field::Description), c.description.clone()),
        ("tags", Some(Field::Tags), join(&c.tags)),
    ]
}

fn classification(c: &MergedCandidate) -> Vec<Row> {
    let categories: Vec<&str> = c.categories.iter().map(|cat| cat.as_str()).collect();
    vec![
        ("categories", Some(Field::Categories), join(&categories)),
        ("dev_status", Some(Field::DevStatus), c.dev_status.map(|s| s.to_string())),
        ("org_structure", Some(Field::OrgStructure), c.org_structure.map(|s| s.to_string())),
        ("open_source", Some(Field::OpenSource), c.open_source.map(yes_no)),
        ("public_goods", Some(Field::PublicGoods), c.public_goods.map(yes_no)),
        ("funding", Some(Field::Funding), c.has_funding.map(yes_no)),
    ]
}

fn dates(c: &MergedCandidate) -> Vec<Row> {
    vec![
        ("date_founded", Some(Field::DateFounded), c.date_founded.clone()),
        ("date_launch", Some(Field::DateLaunch), c.date_launch.clone()),
    ]
}

fn links(c: &MergedCandidate) -> Vec<Row> {
    let mut rows: Vec<Row> = c
        .websites
        .iter()
        .map(|w| ("website", Some(Field::Websites), Some(format!("{} <{}>", w.title, w.url))))
        .collect();
    rows.push(("rootdata_url", Some(Field::ProviderUrl), c.provider_url.clone()));
    rows.push(("code_repo", Some(Field::CodeRepo), c.code_repo.clone()));
    rows.push(("token_contract", Some(Field::TokenContract), c.token_contract.clone()));
    rows.push(("white_paper", Some(Field::WhitePaper), c.white_paper.clone()));
    rows
}

// ── Rendering ──

fn render_section(out: &mut String, c: &MergedCandidate, header: &str, rows: Vec<Row>) {
    if rows.iter().all(|(_, _, value)| value.is_none()) {
        return;
    }
    let _ = writeln!(out, "{header}");
    for (label, field, value) in rows {
        let Some(value) = value else { continue };
        let _ = writeln!(out, "  {:<26} {}{}", label, value, source_tag(c, field));
    }
    let _ = writeln!(out);
}

fn render_team(out: &mut String, c: &MergedCandidate) {
    let len = c.founders.len();
    if len == 0 {
        return;
    }
    let _ = writeln!(out, "Team");
    let _ = writeln!(out, "  founders ({len}):{}", source_tag(c, Some(Field::Founders)));
    for founder in c.founders.iter().take(MAX_LIST_ITEMS) {
        match &founder.region {
            Some(region) => {
                let _ = writeln!(out, "    - {} | {} | {}", founder.name, founder.title, region);
            }
            None => {
                let _ = writeln!(out, "    - {} | {}", founder.name, founder.title);
            }
        }
    }
    if len > MAX_LIST_ITEMS {
        let _ = writeln!(out, "    ... and {} more", len - MAX_LIST_ITEMS);
    }
    let _ = writeln!(out);
}

fn source_tag(c: &MergedCandidate, field: Option<Field>) -> &'static str {
    match field.and_then(|f| c.provenance.get(&f)) {
        Some(Source::Canonical) => "  [rootdata]",
        Some(Source::Extracted) => "  [ai]",
        None => "",
    }
}

fn join<S: AsRef<str>>(items: &[S]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    Some(items.iter().map(|s| s.as_ref()).collect::<Vec<&str>>().join(", "))
}

fn yes_no(b: bool) -> String {
    let label = if b { "yes" } else { "no" };
    label.to_string()
}
