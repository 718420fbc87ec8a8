use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::fields::FieldRecord;
use crate::slug::slugify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Industry {
    Healthcare,
    IrsTax,
    Banking,
    Gaming,
    Appliances,
}

impl Industry {
    pub const ALL: [Industry; 5] = [
        Industry::Healthcare,
        Industry::IrsTax,
        Industry::Banking,
        Industry::Gaming,
        Industry::Appliances,
    ];

    /// Value written to front matter and used in URLs.
    pub fn key(self) -> &'static str {
        match self {
            Industry::Healthcare => "healthcare",
            Industry::IrsTax => "irs-tax",
            Industry::Banking => "banking",
            Industry::Gaming => "gaming",
            Industry::Appliances => "appliances",
        }
    }

    pub fn from_key(key: &str) -> Option<Industry> {
        Industry::ALL.into_iter().find(|i| i.key() == key)
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Any needle contained in the lower-cased text selects `industry`.
struct Rule {
    needles: &'static [&'static str],
    industry: Industry,
}

const SECTION_RULES: &[Rule] = &[
    Rule { needles: &["healthcare"], industry: Industry::Healthcare },
    Rule { needles: &["gaming"], industry: Industry::Gaming },
    Rule { needles: &["appliance"], industry: Industry::Appliances },
    Rule { needles: &["irs", "tax"], industry: Industry::IrsTax },
    Rule { needles: &["banking", "payment"], industry: Industry::Banking },
];

// Headings need the plural: "Appliance" alone titles too many intro sections.
const HEADING_RULES: &[Rule] = &[
    Rule { needles: &["healthcare"], industry: Industry::Healthcare },
    Rule { needles: &["gaming"], industry: Industry::Gaming },
    Rule { needles: &["appliances"], industry: Industry::Appliances },
    Rule { needles: &["irs", "tax"], industry: Industry::IrsTax },
    Rule { needles: &["banking", "payment"], industry: Industry::Banking },
];

fn classify(text: &str, rules: &[Rule]) -> Option<Industry> {
    let lower = text.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.needles.iter().any(|n| lower.contains(n)))
        .map(|rule| rule.industry)
}

/// Classify a block's `section` value.
pub fn from_section(section: &str) -> Option<Industry> {
    classify(section, SECTION_RULES)
}

/// Classify an H1/H2 heading in the heading-hierarchy fallback.
pub fn from_heading(heading: &str) -> Option<Industry> {
    classify(heading, HEADING_RULES)
}

// ── Appliance hierarchy ──

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApplianceHierarchy {
    pub appliance_type: String,
    pub brand: String,
    pub series_or_model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialHierarchy {
    pub appliance_type: Option<String>,
    pub brand: Option<String>,
    pub series_or_model: Option<String>,
}

impl PartialHierarchy {
    fn new(appliance_type: &str, brand: &str, series_or_model: &str) -> Self {
        PartialHierarchy {
            appliance_type: non_empty_slug(appliance_type),
            brand: non_empty_slug(brand),
            series_or_model: non_empty_slug(series_or_model),
        }
    }

    /// Fill only the fields still missing.
    fn fill(&mut self, other: PartialHierarchy) {
        if self.appliance_type.is_none() {
            self.appliance_type = other.appliance_type;
        }
        if self.brand.is_none() {
            self.brand = other.brand;
        }
        if self.series_or_model.is_none() {
            self.series_or_model = other.series_or_model;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.appliance_type.is_some() && self.brand.is_some() && self.series_or_model.is_some()
    }

    pub fn complete(self) -> Option<ApplianceHierarchy> {
        Some(ApplianceHierarchy {
            appliance_type: self.appliance_type?,
            brand: self.brand?,
            series_or_model: self.series_or_model?,
        })
    }
}

const TYPE_KEYS: &[&str] = &["appliance type", "type"];
const BRAND_KEYS: &[&str] = &["brand"];
const SERIES_KEYS: &[&str] = &["series", "series or model", "model"];

const DEFAULT_APPLIANCE_TYPE: &str = "appliances";

/// Checked in order; the first whole-word match names the appliance type.
const APPLIANCE_TYPES: &[&str] = &[
    "washer",
    "dryer",
    "refrigerator",
    "fridge",
    "dishwasher",
    "oven",
    "range",
    "stove",
    "microwave",
    "freezer",
    "air conditioner",
    "ac",
];

static APPLIANCE_TYPE_RES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    APPLIANCE_TYPES
        .iter()
        .map(|name| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(name).replace(' ', r"\s+"));
            (Regex::new(&pattern).unwrap(), *name)
        })
        .collect()
});

static SECTION_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^appliances\s*").unwrap());
static SECTION_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+error\s+codes?\s*$").unwrap());
static SLASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*/\s*").unwrap());

/// Resolve type/brand/series field by field: explicit fields, then the
/// section path, then the `system` field. `None` if any stays unknown.
pub fn infer_hierarchy(record: &FieldRecord) -> Option<ApplianceHierarchy> {
    let mut partial = explicit_hierarchy(record);

    if !partial.is_complete() {
        if let Some(inferred) = record.first("section").and_then(hierarchy_from_section) {
            partial.fill(inferred);
        }
    }

    if !partial.is_complete() {
        if let Some(inferred) = record.first("system").and_then(hierarchy_from_system) {
            partial.fill(inferred);
        }
    }

    partial.complete()
}

pub fn explicit_hierarchy(record: &FieldRecord) -> PartialHierarchy {
    PartialHierarchy {
        appliance_type: record.first_of(TYPE_KEYS).and_then(non_empty_slug),
        brand: record.first_of(BRAND_KEYS).and_then(non_empty_slug),
        series_or_model: record.first_of(SERIES_KEYS).and_then(non_empty_slug),
    }
}

/// `Appliances / Washer / Whirlpool / WTW5000 Error Codes` → last three segments.
pub fn hierarchy_from_section(section: &str) -> Option<PartialHierarchy> {
    let raw = SECTION_PREFIX_RE.replace(section, "");
    let raw = SECTION_SUFFIX_RE.replace(&raw, "");
    let parts: Vec<&str> = SLASH_RE
        .split(raw.trim())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    match parts.as_slice() {
        [.., appliance_type, brand, series] => {
            Some(PartialHierarchy::new(appliance_type, brand, series))
        }
        _ => None,
    }
}

/// `Whirlpool / Cabrio Washer` → brand `whirlpool`, series `cabrio-washer`, type `washer`.
pub fn hierarchy_from_system(system: &str) -> Option<PartialHierarchy> {
    let raw = system.trim();
    if raw.is_empty() {
        return None;
    }
    let segments: Vec<&str> = raw
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let (brand, series) = if segments.len() >= 2 {
        (segments[0].to_string(), segments[1..].join(" / "))
    } else {
        (raw.to_string(), raw.to_string())
    };

    let appliance_type = appliance_type_in(&series).unwrap_or(DEFAULT_APPLIANCE_TYPE);
    let partial = PartialHierarchy::new(appliance_type, &brand, &series);
    if partial.brand.is_none() || partial.series_or_model.is_none() {
        return None;
    }
    Some(partial)
}

pub fn appliance_type_in(text: &str) -> Option<&'static str> {
    APPLIANCE_TYPE_RES
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, name)| *name)
}

pub(crate) fn non_empty_slug(raw: &str) -> Option<String> {
    let slug = slugify(raw);
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}
