pub mod blocks;
pub mod fields;
pub mod html;
pub mod industry;

use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::slug::slugify;
use blocks::{HeadingBlock, RawBlock};
use html::{Element, Fragment};
use industry::{ApplianceHierarchy, Industry};

/// One normalized error-code record, destined for exactly one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub industry: Industry,
    pub code: String,
    pub code_slug: String,
    pub short_label: String,
    pub summary: Option<String>,
    pub body_html: String,
    /// Present iff `industry` is `Appliances`.
    pub appliance: Option<ApplianceHierarchy>,
}

/// Three-pass pipeline: elements → blocks → entries.
///
/// Sentinel-delimited blocks are preferred; the heading fallback runs only
/// when they produce no entries at all.
pub fn parse_entries(elements: &[Element]) -> Result<Vec<Entry>, SyncError> {
    let delimited = blocks::segment_delimited(elements);
    let entries = entries_from_blocks(&delimited);
    if !entries.is_empty() {
        info!(blocks = delimited.len(), entries = entries.len(), "parsed delimited blocks");
        return Ok(entries);
    }

    let headed = blocks::segment_headings(elements)?;
    let entries: Vec<Entry> = headed.into_iter().map(entry_from_heading).collect();
    if entries.is_empty() {
        return Err(SyncError::NoEntries);
    }
    info!(entries = entries.len(), "parsed heading fallback");
    Ok(entries)
}

pub fn entries_from_blocks(blocks: &[RawBlock]) -> Vec<Entry> {
    blocks.iter().filter_map(entry_from_block).collect()
}

fn entry_from_block(block: &RawBlock) -> Option<Entry> {
    let fragment = Fragment::from_elements(&block.elements);
    let Some(fields) = fields::extract(&fragment) else {
        debug!(elements = block.elements.len(), "block without code, skipping");
        return None;
    };

    let section = fields.record.first("section").unwrap_or_default();
    let Some(industry) = industry::from_section(section) else {
        debug!(code = %fields.code, section, "block without recognizable section, skipping");
        return None;
    };

    let appliance = if industry == Industry::Appliances {
        match industry::infer_hierarchy(&fields.record) {
            Some(h) => Some(h),
            None => {
                warn!(
                    code = %fields.code,
                    section,
                    "appliance entry without type/brand/series, dropping"
                );
                return None;
            }
        }
    } else {
        None
    };

    Some(Entry {
        industry,
        code: fields.code,
        code_slug: fields.code_slug,
        short_label: fields.short_label,
        summary: fields.summary,
        body_html: fragment.body_html(),
        appliance,
    })
}

fn entry_from_heading(block: HeadingBlock) -> Entry {
    let code = blocks::heading_code(&block.heading).to_string();
    let body_html = Fragment::from_elements(&block.body).body_html();
    Entry {
        industry: block.industry,
        code_slug: slugify(&code),
        short_label: fields::short_label(&block.heading),
        code,
        summary: None,
        body_html,
        appliance: block.appliance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_document(html: &str) -> Result<Vec<Entry>, SyncError> {
        parse_entries(&html::parse_elements(html))
    }

    fn doc(body: &str) -> String {
        format!("<html><head><meta charset=\"utf-8\"></head><body>{body}</body></html>")
    }

    fn block(lines: &[&str]) -> String {
        let mut out = format!("<p>{}</p>", blocks::START_SENTINEL);
        for line in lines {
            out.push_str(&format!("<p>{line}</p>"));
        }
        out.push_str(&format!("<p>{}</p>", blocks::END_SENTINEL));
        out
    }

    #[test]
    fn delimited_healthcare_entry() {
        let html = doc(&block(&[
            "Section: Healthcare",
            "Code: CO-45",
            "Title",
            "(CO-45 &mdash; Charges exceed fee schedule)",
            "One-sentence summary",
            "",
            "Claim was denied for lacking prior authorization.",
        ]));
        let entries = parse_document(&html).unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.industry, Industry::Healthcare);
        assert_eq!(e.code, "CO-45");
        assert_eq!(e.code_slug, "co-45");
        assert_eq!(e.short_label, "Charges exceed fee schedule");
        assert_eq!(
            e.summary.as_deref(),
            Some("Claim was denied for lacking prior authorization.")
        );
        assert!(e.body_html.contains("<p>Section: Healthcare</p>"));
        assert!(e.appliance.is_none());
    }

    #[test]
    fn scaffolding_blocks_are_skipped() {
        let html = doc(&format!(
            "{}{}{}",
            block(&["Just a preamble"]),
            block(&["Section: Internal notes", "Code: X1"]),
            block(&["Section: IRS", "Code: CP2000"]),
        ));
        let entries = parse_document(&html).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].industry, Industry::IrsTax);
        assert_eq!(entries[0].code_slug, "cp2000");
    }

    #[test]
    fn incomplete_appliance_blocks_are_dropped() {
        let html = doc(&format!(
            "{}{}",
            block(&["Section: Appliances / Whirlpool / Front Load Washer", "Code: F5E1"]),
            block(&["Section: Gaming", "Code: CE-34878-0"]),
        ));
        let entries = parse_document(&html).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].industry, Industry::Gaming);
    }

    #[test]
    fn appliance_block_with_system_field() {
        let html = doc(&block(&[
            "Section: Appliances",
            "System: Samsung / Bespoke Refrigerator",
            "Code: 22E",
        ]));
        let entries = parse_document(&html).unwrap();
        let h = entries[0].appliance.as_ref().unwrap();
        assert_eq!(h.appliance_type, "refrigerator");
        assert_eq!(h.brand, "samsung");
        assert_eq!(h.series_or_model, "bespoke-refrigerator");
    }

    #[test]
    fn fallback_runs_when_no_sentinels() {
        let html = doc(
            "<h1>Error codes</h1><h2>Gaming</h2>\
             <h3>0x87DD0006 — Network Error</h3><p>Sign-in failed.</p>",
        );
        let entries = parse_document(&html).unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.industry, Industry::Gaming);
        assert!(e.code.starts_with("0x87DD0006"));
        assert_eq!(e.code_slug, "0x87dd0006");
        assert_eq!(e.short_label, "Network Error");
        assert_eq!(e.body_html, "<p>Sign-in failed.</p>");
    }

    #[test]
    fn fallback_runs_when_sentinel_blocks_yield_nothing() {
        let html = doc(&format!(
            "{}<h2>Healthcare</h2><h3>CO-45 — Charges exceed fee schedule</h3><p>x</p>",
            block(&["No fields here"])
        ));
        let entries = parse_document(&html).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].industry, Industry::Healthcare);
    }

    #[test]
    fn nothing_recognizable_is_fatal() {
        let html = doc("<h1>Welcome</h1><p>Nothing to see.</p><h3>Overview</h3>");
        assert!(matches!(parse_document(&html), Err(SyncError::NoEntries)));
        assert!(matches!(parse_document(""), Err(SyncError::NoEntries)));
    }
}
