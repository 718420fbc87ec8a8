use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::parser::blocks::RawBlock;
use crate::parser::fields::parse_key_value;
use crate::parser::html::Element;

const SAMPLE_ELEMENTS: usize = 250;
const SAMPLE_TEXT_CHARS: usize = 240;
const APPLIANCE_SAMPLES: usize = 5;
const APPLIANCE_SAMPLE_LINES: usize = 60;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureSummary {
    pub counts: BTreeMap<String, usize>,
    pub key_counts: BTreeMap<String, usize>,
    pub section_counts: BTreeMap<String, usize>,
    pub sample: Vec<SampleElement>,
}

#[derive(Debug, Serialize)]
pub struct SampleElement {
    pub tag: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ApplianceSample {
    pub kv: BTreeMap<String, String>,
    pub texts: Vec<String>,
}

/// Tag counts, key frequencies and a leading sample of the element stream.
pub fn summarize(elements: &[Element]) -> StructureSummary {
    let mut counts = BTreeMap::new();
    let mut key_counts = BTreeMap::new();
    let mut section_counts = BTreeMap::new();

    for el in elements {
        *counts.entry(el.tag.clone()).or_insert(0) += 1;
        let Some((key, value)) = parse_key_value(&el.text) else {
            continue;
        };
        if key == "section" {
            *section_counts.entry(value).or_insert(0) += 1;
        }
        *key_counts.entry(key).or_insert(0) += 1;
    }

    let sample = elements
        .iter()
        .take(SAMPLE_ELEMENTS)
        .map(|el| SampleElement {
            tag: el.tag.clone(),
            text: el.text.chars().take(SAMPLE_TEXT_CHARS).collect(),
        })
        .collect();

    StructureSummary {
        counts,
        key_counts,
        section_counts,
        sample,
    }
}

/// First few delimited blocks whose section is exactly "appliances".
pub fn appliance_samples(blocks: &[RawBlock]) -> Vec<ApplianceSample> {
    blocks
        .iter()
        .filter_map(|block| {
            let texts: Vec<String> = block.elements.iter().map(|e| e.text.clone()).collect();
            // Last value wins here; this is a peek, not the real record.
            let kv: BTreeMap<String, String> =
                texts.iter().filter_map(|t| parse_key_value(t)).collect();
            let is_appliance = kv
                .get("section")
                .is_some_and(|s| s.to_lowercase() == "appliances");
            is_appliance.then(|| ApplianceSample {
                kv,
                texts: texts.into_iter().take(APPLIANCE_SAMPLE_LINES).collect(),
            })
        })
        .take(APPLIANCE_SAMPLES)
        .collect()
}

pub fn write_export_html(cache_dir: &Path, html: &str) -> Result<()> {
    write_artifact(cache_dir, "gdoc-export.html", html)
}

pub fn write_structure(cache_dir: &Path, elements: &[Element]) -> Result<()> {
    let json = serde_json::to_string_pretty(&summarize(elements))?;
    write_artifact(cache_dir, "gdoc-structure.json", &json)
}

pub fn write_appliance_samples(cache_dir: &Path, blocks: &[RawBlock]) -> Result<()> {
    let json = serde_json::to_string_pretty(&appliance_samples(blocks))?;
    write_artifact(cache_dir, "gdoc-appliance-sample.json", &json)
}

fn write_artifact(cache_dir: &Path, name: &str, content: &str) -> Result<()> {
    fs::create_dir_all(cache_dir)
        .with_context(|| format!("Failed to create {}", cache_dir.display()))?;
    let path = cache_dir.join(name);
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote debug artifact {}", path.display());
    Ok(())
}
