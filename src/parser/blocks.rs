use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::html::Element;
use super::industry::{self, ApplianceHierarchy, Industry};
use crate::error::SyncError;

pub const START_SENTINEL: &str = "=== START ERROR CODE ===";
pub const END_SENTINEL: &str = "=== END ERROR CODE ===";

static CODE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z0-9][A-Za-z0-9._-]{1,20})\b").unwrap());

/// Elements between one start/end sentinel pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBlock {
    pub elements: Vec<Element>,
}

/// An entry found by heading structure rather than sentinels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingBlock {
    pub industry: Industry,
    pub heading: String,
    pub appliance: Option<ApplianceHierarchy>,
    pub body: Vec<Element>,
}

/// Sentinel pass. Content outside a pair is dropped, as is an unterminated
/// trailing block.
pub fn segment_delimited(elements: &[Element]) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<RawBlock> = None;

    for element in elements {
        if let Some(block) = current.as_mut() {
            if element.text == END_SENTINEL {
                blocks.extend(current.take());
            } else {
                block.elements.push(element.clone());
            }
        } else if element.text == START_SENTINEL {
            current = Some(RawBlock::default());
        }
    }

    if let Some(open) = current {
        debug!(elements = open.elements.len(), "dropping unterminated block");
    }
    blocks
}

/// Heading-taxonomy state while walking the fallback document.
#[derive(Default)]
struct HeadingContext {
    industry: Option<Industry>,
    appliance_type: Option<String>,
    brand: Option<String>,
    series: Option<String>,
    current: Option<OpenEntry>,
}

struct OpenEntry {
    heading: String,
    body: Vec<Element>,
}

impl HeadingContext {
    fn reset_appliance(&mut self) {
        self.appliance_type = None;
        self.brand = None;
        self.series = None;
    }

    /// Close the open entry, if any, against the current context.
    fn close(&mut self, out: &mut Vec<HeadingBlock>) -> Result<(), SyncError> {
        let Some(industry) = self.industry else {
            if let Some(open) = self.current.take() {
                debug!(heading = %open.heading, "code heading outside any industry");
            }
            return Ok(());
        };
        let Some(open) = self.current.take() else {
            return Ok(());
        };

        let appliance = if industry == Industry::Appliances {
            match (&self.appliance_type, &self.brand, &self.series) {
                (Some(t), Some(b), Some(s)) => Some(ApplianceHierarchy {
                    appliance_type: t.clone(),
                    brand: b.clone(),
                    series_or_model: s.clone(),
                }),
                _ => {
                    return Err(SyncError::ApplianceContextIncomplete {
                        heading: open.heading,
                    })
                }
            }
        } else {
            None
        };

        out.push(HeadingBlock {
            industry,
            heading: open.heading,
            appliance,
            body: open.body,
        });
        Ok(())
    }

    fn open(&mut self, heading: &str) {
        self.current = Some(OpenEntry {
            heading: heading.to_string(),
            body: Vec::new(),
        });
    }
}

/// Heading fallback: industry H1/H2, then code headings (H2-H4), or for
/// appliances H3 type / H4 brand / H5 series with H6 code headings.
pub fn segment_headings(elements: &[Element]) -> Result<Vec<HeadingBlock>, SyncError> {
    let mut ctx = HeadingContext::default();
    let mut out = Vec::new();

    for element in elements {
        let text = element.text.as_str();
        let level = element.heading_level();

        if matches!(level, Some(1 | 2)) {
            if let Some(industry) = industry::from_heading(text) {
                ctx.close(&mut out)?;
                ctx.industry = Some(industry);
                ctx.reset_appliance();
                continue;
            }
        }

        if ctx.industry == Some(Industry::Appliances) {
            match level {
                Some(3) => {
                    ctx.close(&mut out)?;
                    ctx.appliance_type = industry::non_empty_slug(text);
                    ctx.brand = None;
                    ctx.series = None;
                    continue;
                }
                Some(4) => {
                    ctx.close(&mut out)?;
                    ctx.brand = industry::non_empty_slug(text);
                    ctx.series = None;
                    continue;
                }
                Some(5) => {
                    ctx.close(&mut out)?;
                    ctx.series = industry::non_empty_slug(text);
                    continue;
                }
                Some(6) if looks_like_code(text) => {
                    ctx.close(&mut out)?;
                    ctx.open(text);
                    continue;
                }
                _ => {}
            }
        } else if matches!(level, Some(2..=4)) && looks_like_code(text) {
            ctx.close(&mut out)?;
            ctx.open(text);
            continue;
        }

        if let Some(open) = ctx.current.as_mut() {
            open.body.push(element.clone());
        }
    }

    ctx.close(&mut out)?;
    Ok(out)
}

/// Leading token of 2+ code characters, starting with an uppercase letter or
/// digit, that is either all-caps or carries a digit (`CO-45`, `0x87DD0006`,
/// `SERVICE`). Title-case words such as `Overview` are not codes.
pub fn looks_like_code(text: &str) -> bool {
    let Some(caps) = CODE_TOKEN_RE.captures(text.trim()) else {
        return false;
    };
    let token = &caps[1];
    token.chars().any(|c| c.is_ascii_digit()) || !token.chars().any(|c| c.is_ascii_lowercase())
}

/// First whitespace token of a code heading.
pub fn heading_code(heading: &str) -> &str {
    heading.split_whitespace().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(tag: &str, text: &str) -> Element {
        Element::from_markup(tag, format!("<{tag}>{text}</{tag}>"))
    }

    fn p(text: &str) -> Element {
        el("p", text)
    }

    #[test]
    fn sentinel_blocks() {
        let elements = vec![
            p("preamble"),
            p(START_SENTINEL),
            p("Code: A1"),
            p("body"),
            p(END_SENTINEL),
            p("between"),
            p(START_SENTINEL),
            p("Code: B2"),
            p(END_SENTINEL),
        ];
        let blocks = segment_delimited(&elements);
        assert_eq!(blocks.len(), 2);
        let texts: Vec<_> = blocks[0].elements.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["Code: A1", "body"]);
        assert_eq!(blocks[1].elements.len(), 1);
    }

    #[test]
    fn sentinels_match_after_whitespace_normalization() {
        let elements = vec![
            Element::from_markup("p", "<p>===  START <span>ERROR</span>\n CODE ===</p>"),
            p("Code: A1"),
            Element::from_markup("p", "<p> === END ERROR CODE === </p>"),
        ];
        assert_eq!(segment_delimited(&elements).len(), 1);
    }

    #[test]
    fn unterminated_block_is_dropped() {
        let elements = vec![
            p(START_SENTINEL),
            p("Code: A1"),
            p(END_SENTINEL),
            p(START_SENTINEL),
            p("Code: B2"),
        ];
        let blocks = segment_delimited(&elements);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].elements[0].text, "Code: A1");
    }

    #[test]
    fn stray_end_sentinel_is_ignored() {
        let elements = vec![p(END_SENTINEL), p("Code: A1")];
        assert!(segment_delimited(&elements).is_empty());
    }

    #[test]
    fn code_heading_heuristic() {
        assert!(looks_like_code("0x87DD0006 — Network Error"));
        assert!(looks_like_code("CO-45 Charges exceed fee schedule"));
        assert!(looks_like_code("E21"));
        assert!(looks_like_code("SERVICE ERROR"));
        assert!(!looks_like_code("Overview"));
        assert!(!looks_like_code("error 651"));
        assert!(!looks_like_code("A"));
        assert!(!looks_like_code(""));
    }

    #[test]
    fn generic_industry_fallback() {
        let elements = vec![
            el("h1", "Error Code Library"),
            el("h2", "Gaming"),
            el("h3", "0x87DD0006 — Network Error"),
            p("Xbox Live sign-in failed."),
            el("h3", "Overview notes"),
            p("more detail"),
        ];
        let blocks = segment_headings(&elements).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].industry, Industry::Gaming);
        assert_eq!(heading_code(&blocks[0].heading), "0x87DD0006");
        // Non-code headings stay in the body.
        assert_eq!(blocks[0].body.len(), 3);
    }

    #[test]
    fn industry_heading_closes_entry() {
        let elements = vec![
            el("h2", "Healthcare"),
            el("h3", "CO-45 — Charges exceed fee schedule"),
            p("healthcare body"),
            el("h2", "Banking & Payments"),
            el("h3", "R01 — Insufficient funds"),
            p("banking body"),
        ];
        let blocks = segment_headings(&elements).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].industry, Industry::Healthcare);
        assert_eq!(blocks[0].body.len(), 1);
        assert_eq!(blocks[1].industry, Industry::Banking);
        assert_eq!(blocks[1].body[0].text, "banking body");
    }

    #[test]
    fn code_headings_without_industry_are_dropped() {
        let elements = vec![el("h3", "CO-45 — orphan"), p("body")];
        assert!(segment_headings(&elements).unwrap().is_empty());
    }

    #[test]
    fn appliance_hierarchy_from_headings() {
        let elements = vec![
            el("h2", "Appliances"),
            el("h3", "Washer"),
            el("h4", "Whirlpool"),
            el("h5", "Cabrio Series"),
            el("h6", "F5E1 — Door lock failure"),
            p("Door did not lock."),
            el("h5", "Duet"),
            el("h6", "F21 — Long drain"),
        ];
        let blocks = segment_headings(&elements).unwrap();
        assert_eq!(blocks.len(), 2);
        let first = blocks[0].appliance.as_ref().unwrap();
        assert_eq!(first.appliance_type, "washer");
        assert_eq!(first.brand, "whirlpool");
        assert_eq!(first.series_or_model, "cabrio-series");
        assert_eq!(blocks[0].body.len(), 1);
        assert_eq!(blocks[1].appliance.as_ref().unwrap().series_or_model, "duet");
    }

    #[test]
    fn appliance_entry_without_full_context_is_fatal() {
        let elements = vec![
            el("h2", "Appliances"),
            el("h3", "Dryer"),
            el("h6", "D80 — Vent blocked"),
            p("body"),
        ];
        let err = segment_headings(&elements).unwrap_err();
        assert!(matches!(err, SyncError::ApplianceContextIncomplete { ref heading } if heading.starts_with("D80")));
    }

    #[test]
    fn heading_without_slug_leaves_context_incomplete() {
        let elements = vec![
            el("h2", "Appliances"),
            el("h3", "★"),
            el("h4", "Whirlpool"),
            el("h5", "Cabrio"),
            el("h6", "F5E1 — Door"),
        ];
        let err = segment_headings(&elements).unwrap_err();
        assert!(matches!(err, SyncError::ApplianceContextIncomplete { ref heading } if heading.starts_with("F5E1")));
    }

    #[test]
    fn new_brand_clears_series() {
        let elements = vec![
            el("h1", "Appliances"),
            el("h3", "Dryer"),
            el("h4", "LG"),
            el("h5", "TurboSteam"),
            el("h4", "Samsung"),
            el("h6", "DE — Door error"),
        ];
        assert!(matches!(
            segment_headings(&elements),
            Err(SyncError::ApplianceContextIncomplete { .. })
        ));
    }
}
