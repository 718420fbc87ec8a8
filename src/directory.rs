use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::frontmatter;

pub const DEFAULT_LIMIT: usize = 24;
const CONTENT_EXT: &str = "mdx";

/// One emitted content file, read back through its front matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeDoc {
    /// Path relative to the collection directory, without extension.
    pub slug: String,
    pub fields: BTreeMap<String, String>,
}

impl CodeDoc {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn code(&self) -> &str {
        self.get("code").unwrap_or(&self.slug)
    }

    /// Last path segment of the slug.
    pub fn code_slug(&self) -> &str {
        self.slug.rsplit('/').next().unwrap_or(&self.slug)
    }

    pub fn href(&self) -> String {
        let slug = self.code_slug();
        match self.get("industry").unwrap_or_default() {
            "systems" => format!(
                "/systems/{}/error-codes/{slug}/",
                self.get("subcategory").unwrap_or_default()
            ),
            "appliances" => format!(
                "/appliances/{}/{}/{}/error-codes/{slug}/",
                self.get("applianceType").unwrap_or_default(),
                self.get("brand").unwrap_or_default(),
                self.get("seriesOrModel").unwrap_or_default()
            ),
            industry => format!("/{industry}/error-codes/{}/", self.slug),
        }
    }

    fn search_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.code(),
            self.slug,
            self.get("shortLabel").unwrap_or_default(),
            self.get("summary").unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRow {
    pub code: String,
    pub meaning: String,
    pub next_step: &'static str,
    pub href: String,
}

/// Read every content file under `dir`, sorted by slug. Hidden entries
/// (staging and backup trees) are skipped.
pub fn read_collection(dir: &Path) -> Result<Vec<CodeDoc>> {
    let mut docs = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry =
            entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(CONTENT_EXT)
        {
            continue;
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let Some(fields) = frontmatter::parse(&content) else {
            debug!(path = %path.display(), "no front matter, skipping");
            continue;
        };
        let rel = path.strip_prefix(dir).unwrap_or(path).with_extension("");
        let slug = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        docs.push(CodeDoc { slug, fields });
    }

    docs.sort_by(|a, b| a.slug.cmp(&b.slug));
    debug!(dir = %dir.display(), docs = docs.len(), "read collection");
    Ok(docs)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Neighbors of `current` in sorted slug order, wrapping around.
pub fn pick_related(all: &[String], current: &str, min: usize, max: usize) -> Vec<String> {
    let mut slugs: Vec<&str> = all
        .iter()
        .map(String::as_str)
        .filter(|s| *s != current)
        .collect();
    if slugs.is_empty() {
        return Vec::new();
    }
    slugs.sort_unstable();

    let count = min.max(3).min(max.min(10)).min(slugs.len());
    let start = slugs.iter().position(|s| *s > current).unwrap_or(0);
    (0..count)
        .map(|i| slugs[(start + i) % slugs.len()].to_string())
        .collect()
}

const NEXT_STEPS: &[(&[&str], &str)] = &[
    (
        &["timeout", "timed out"],
        "Retry once; validate connectivity and service status",
    ),
    (
        &["access denied", "permission"],
        "Verify account permissions and security policy",
    ),
    (
        &["not found", "missing"],
        "Verify the correct path/resource and prerequisites",
    ),
    (&["dns"], "Test DNS resolution and try a known-good resolver"),
    (
        &["offline", "cannot connect"],
        "Check network path, firewall/proxy, and service availability",
    ),
    (
        &["jam", "paper"],
        "Clear paper path and verify feed/pickup components",
    ),
    (
        &["fuser", "heater"],
        "Follow manufacturer maintenance guidance; avoid unsafe disassembly",
    ),
    (
        &["update", "install"],
        "Confirm storage/prerequisites; retry after restart",
    ),
    (
        &["decline", "issuer"],
        "Try another method; contact issuer if it follows the card",
    ),
];

const DEFAULT_NEXT_STEP: &str = "Follow the checklist on the code page";

/// First matching rule wins.
pub fn next_step(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    NEXT_STEPS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|(_, step)| *step)
        .unwrap_or(DEFAULT_NEXT_STEP)
}

pub fn meaning(doc: &CodeDoc) -> String {
    match (doc.get("shortLabel"), doc.get("summary")) {
        (Some(label), Some(summary)) => format!("{label} — {summary}"),
        (Some(label), None) => label.to_string(),
        (None, Some(summary)) => summary.to_string(),
        (None, None) => "See details".to_string(),
    }
}

/// Case-insensitive patterns for `resolve`.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("Invalid pattern: {p}"))
        })
        .collect()
}

/// Filter, newest first, limit, then de-duplicate by href.
pub fn resolve(docs: &[CodeDoc], patterns: &[Regex], limit: usize) -> Vec<DirectoryRow> {
    let mut matched: Vec<&CodeDoc> = docs
        .iter()
        .filter(|doc| {
            let text = doc.search_text();
            patterns.is_empty() || patterns.iter().any(|re| re.is_match(&text))
        })
        .collect();
    matched.sort_by(|a, b| {
        b.get("lastmod")
            .unwrap_or_default()
            .cmp(a.get("lastmod").unwrap_or_default())
    });

    let mut seen = HashSet::new();
    matched
        .into_iter()
        .take(limit)
        .filter_map(|doc| {
            let href = doc.href();
            if !seen.insert(href.clone()) {
                return None;
            }
            let meaning = meaning(doc);
            Some(DirectoryRow {
                code: doc.code().to_string(),
                next_step: next_step(&format!("{} {meaning}", doc.code())),
                meaning,
                href,
            })
        })
        .collect()
}
