use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::{Html, Selector};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]+);").unwrap());

static BODY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
static ELEMENT_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1, h2, h3, h4, h5, h6, p, ul, ol, table, pre").unwrap()
});

/// One structural element of the document body, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lower-case tag name (`h3`, `p`, `table`, ...).
    pub tag: String,
    /// Whitespace-collapsed text with markup stripped and entities decoded.
    pub text: String,
    /// Outer HTML exactly as serialized by the parser.
    pub html: String,
}

impl Element {
    pub fn from_markup(tag: &str, html: impl Into<String>) -> Self {
        let html = html.into();
        Element {
            tag: tag.to_ascii_lowercase(),
            text: normalize_line(&html),
            html,
        }
    }

    /// `Some(1..=6)` for `h1`..`h6`.
    pub fn heading_level(&self) -> Option<u8> {
        let rest = self.tag.strip_prefix('h')?;
        match rest.parse::<u8>() {
            Ok(level @ 1..=6) => Some(level),
            _ => None,
        }
    }
}

/// Line-oriented view of a run of elements, alongside the untouched markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub lines: Vec<String>,
    pub markup: Vec<String>,
}

impl Fragment {
    pub fn from_elements(elements: &[Element]) -> Self {
        Fragment {
            lines: elements.iter().map(|e| e.text.clone()).collect(),
            markup: elements.iter().map(|e| e.html.clone()).collect(),
        }
    }

    pub fn from_markup<S: AsRef<str>>(markup: &[S]) -> Self {
        Fragment {
            lines: markup.iter().map(|m| normalize_line(m.as_ref())).collect(),
            markup: markup.iter().map(|m| m.as_ref().to_string()).collect(),
        }
    }

    pub fn body_html(&self) -> String {
        self.markup.join("\n")
    }
}

/// Parse a full HTML export and return its structural elements.
///
/// Nested matches are kept: a `<p>` inside a `<table>` appears both as part
/// of the table and on its own, so key/value lines in table cells still scan.
pub fn parse_elements(html: &str) -> Vec<Element> {
    let doc = Html::parse_document(html);
    let root = doc
        .select(&BODY_SEL)
        .next()
        .unwrap_or_else(|| doc.root_element());

    root.select(&ELEMENT_SEL)
        .map(|el| Element::from_markup(el.value().name(), el.html()))
        .collect()
}

/// Strip tags, decode entities and collapse whitespace into a single line.
pub fn normalize_line(markup: &str) -> String {
    let stripped = TAG_RE.replace_all(markup, "");
    let decoded = decode_entities(&stripped);
    collapse_whitespace(&decoded)
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the entity set the emitters produce, plus numeric references.
/// Single pass, so `&amp;lt;` becomes `&lt;` and not `<`.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    ENTITY_RE
        .replace_all(s, |caps: &Captures| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "mdash" => Some('\u{2014}'),
                "ndash" => Some('\u{2013}'),
                "nbsp" => Some('\u{a0}'),
                _ => numeric_reference(name),
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn numeric_reference(name: &str) -> Option<char> {
    let digits = name.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code)
}
