use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::html::{collapse_whitespace, Fragment};
use crate::slug::slugify;

static KEY_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([A-Z0-9][A-Z0-9 /._-]{1,60})\s*:\s*(.*?)\s*$").unwrap()
});
static LABEL_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+[-–—:]\s+").unwrap());

const SUMMARY_MARKER: &str = "one-sentence summary";
const MAX_LABEL_CHARS: usize = 120;

/// Ordered multimap of `Key: value` lines. Repeated keys append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRecord {
    fields: Vec<(String, Vec<String>)>,
}

impl FieldRecord {
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut record = FieldRecord::default();
        for line in lines {
            if let Some((key, value)) = parse_key_value(line) {
                record.push(key, value);
            }
        }
        record
    }

    pub fn push(&mut self, key: String, value: String) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.fields.push((key, vec![value])),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// First value of the first key in `keys` that is present.
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.first(k))
    }

}

/// Fields pulled out of one delimited block.
#[derive(Debug, Clone)]
pub struct BlockFields {
    pub record: FieldRecord,
    pub code: String,
    pub code_slug: String,
    pub short_label: String,
    pub summary: Option<String>,
}

/// `None` when the block carries no usable `code` field.
pub fn extract(fragment: &Fragment) -> Option<BlockFields> {
    let record = FieldRecord::from_lines(fragment.lines.iter().map(String::as_str));
    let code = record.first("code")?.trim().to_string();
    if code.is_empty() {
        return None;
    }
    let code_slug = slugify(&code);
    if code_slug.is_empty() {
        debug!(code = %code, "code without a usable slug, skipping");
        return None;
    }

    let title = extract_title_line(&fragment.lines, &code).unwrap_or(&code);
    let short_label = short_label(title);
    let summary = extract_summary(&fragment.lines);

    Some(BlockFields {
        record,
        code,
        code_slug,
        short_label,
        summary,
    })
}

/// Match `KEY: value`. Key is lower-cased and whitespace-collapsed.
pub fn parse_key_value(line: &str) -> Option<(String, String)> {
    let caps = KEY_VALUE_RE.captures(line)?;
    let key = collapse_whitespace(&caps[1].to_lowercase());
    let value = caps[2].trim().to_string();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// A `(`-prefixed line mentioning the code, else any line with the code and an em-dash.
pub fn extract_title_line<'a>(lines: &'a [String], code: &str) -> Option<&'a str> {
    let lower_code = code.to_lowercase();
    lines
        .iter()
        .find(|t| t.trim().starts_with('(') && t.to_lowercase().contains(&lower_code))
        .or_else(|| {
            lines
                .iter()
                .find(|t| t.to_lowercase().contains(&lower_code) && t.contains('—'))
        })
        .map(String::as_str)
}

pub fn short_label(title: &str) -> String {
    let trimmed = title.trim();
    let trimmed = trimmed.strip_prefix('(').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(')').unwrap_or(trimmed);
    let cleaned = collapse_whitespace(trimmed);

    let parts: Vec<&str> = LABEL_SPLIT_RE.split(&cleaned).collect();
    let label = if parts.len() >= 2 {
        parts[1..].join(" - ")
    } else {
        cleaned
    };
    truncate_chars(&label, MAX_LABEL_CHARS)
}

/// First non-empty line after the "One-sentence summary" marker.
pub fn extract_summary(lines: &[String]) -> Option<String> {
    let idx = lines
        .iter()
        .position(|t| t.trim().to_lowercase() == SUMMARY_MARKER)?;
    lines[idx + 1..]
        .iter()
        .map(|t| t.trim())
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
