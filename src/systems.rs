use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::emit::{self, OutputLayout, MANUAL_SOURCE};
use crate::frontmatter::{self, FrontMatter};

const SECTION_LABEL: &str = "Systems &amp; Devices";
const RELATED_COUNT: usize = 4;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    pub key: String,
    pub system_label: String,
    pub where_seen: Vec<String>,
    pub why_appears: Vec<String>,
    pub happens_next: Vec<String>,
    pub not_this: Vec<String>,
    pub troubleshooting: Vec<String>,
    pub notes: Vec<String>,
    pub codes: Vec<SystemCode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemCode {
    pub slug: String,
    pub code: String,
    pub short_label: String,
    pub summary: String,
    pub what_means: String,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    subcategories: Vec<Subcategory>,
}

/// Read-only table of hand-written systems content, keyed by subcategory.
#[derive(Debug, Clone)]
pub struct SystemsRegistry {
    subcategories: Vec<Subcategory>,
}

impl SystemsRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read systems data {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid systems data {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: RegistryFile = serde_json::from_str(raw)?;

        let mut keys = HashSet::new();
        for sub in &file.subcategories {
            if !keys.insert(sub.key.as_str()) {
                bail!("duplicate subcategory {}", sub.key);
            }
            let mut slugs = HashSet::new();
            for code in &sub.codes {
                if !slugs.insert(code.slug.as_str()) {
                    bail!("duplicate code slug {} in {}", code.slug, sub.key);
                }
            }
        }

        Ok(SystemsRegistry {
            subcategories: file.subcategories,
        })
    }

    pub fn subcategories(&self) -> &[Subcategory] {
        &self.subcategories
    }

}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// The first few other codes of the same subcategory, labelled.
fn related_lines(sub: &Subcategory, code: &SystemCode) -> Vec<String> {
    sub.codes
        .iter()
        .filter(|c| c.slug != code.slug)
        .take(RELATED_COUNT)
        .map(|c| format!("{} — {}", c.code, c.short_label))
        .collect()
}

/// Body markup in the same `Key: value` / headed-paragraph layout the
/// document import reads.
pub fn render_body(sub: &Subcategory, code: &SystemCode) -> String {
    let mut lines = vec![
        format!("<p>SECTION: {SECTION_LABEL}</p>"),
        format!("<p>SYSTEM: {}</p>", escape_html(&sub.system_label)),
        format!("<p>CODE: {}</p>", escape_html(&code.code)),
        "<p>Title</p>".to_string(),
        format!(
            "<p>({} &mdash; {})</p>",
            escape_html(&code.code),
            escape_html(&code.short_label)
        ),
        "<p>One-sentence summary</p>".to_string(),
        format!("<p>{}</p>", escape_html(&code.summary)),
        "<p>What this code means</p>".to_string(),
        format!("<p>{}</p>", escape_html(&code.what_means)),
    ];

    let related = related_lines(sub, code);
    let sections: [(&str, &[String]); 7] = [
        ("Where users usually see this code", &sub.where_seen),
        ("Why this code usually appears", &sub.why_appears),
        ("What typically happens next", &sub.happens_next),
        ("What this code is NOT", &sub.not_this),
        ("Troubleshooting checklist", &sub.troubleshooting),
        ("Related error codes", &related),
        ("Notes and edge cases", &sub.notes),
    ];
    for (heading, items) in sections {
        lines.push(format!("<p>{heading}</p>"));
        lines.extend(items.iter().map(|it| format!("<p>{}</p>", escape_html(it))));
    }

    lines.join("\n")
}

pub fn render_code(sub: &Subcategory, code: &SystemCode, lastmod: &str) -> String {
    let front = FrontMatter::new()
        .field("industry", "systems")
        .field("subcategory", sub.key.as_str())
        .field("code", code.code.as_str())
        .field("shortLabel", code.short_label.as_str())
        .field("summary", code.summary.as_str())
        .field("lastmod", lastmod)
        .field("source", MANUAL_SOURCE);
    frontmatter::render_document(&front, &render_body(sub, code))
}

/// Regenerate the systems collection from the registry.
pub fn write_registry(layout: &OutputLayout, registry: &SystemsRegistry, lastmod: &str) -> Result<usize> {
    let files: Vec<(PathBuf, String)> = registry
        .subcategories()
        .iter()
        .flat_map(|sub| {
            sub.codes.iter().map(move |code| {
                (
                    PathBuf::from(&sub.key).join(format!("{}.mdx", code.slug)),
                    render_code(sub, code, lastmod),
                )
            })
        })
        .collect();

    emit::replace_dir(&layout.systems_dir(), &files)?;
    info!(
        subcategories = registry.subcategories().len(),
        files = files.len(),
        "wrote systems collection"
    );
    Ok(files.len())
}
