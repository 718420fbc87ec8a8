use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::frontmatter::{self, FrontMatter};
use crate::parser::industry::Industry;
use crate::parser::Entry;

pub const GOOGLE_DOC_SOURCE: &str = "google-doc";
pub const MANUAL_SOURCE: &str = "manual";

const CONTENT_EXT: &str = "mdx";
const SYSTEMS_COLLECTION: &str = "systemCodes";

const REMOVE_ATTEMPTS: u32 = 5;
const REMOVE_BACKOFF_MS: u64 = 75;

/// Per-collection output directories under one content root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    content_root: PathBuf,
}

impl OutputLayout {
    pub fn new(content_root: impl Into<PathBuf>) -> Self {
        OutputLayout {
            content_root: content_root.into(),
        }
    }

    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        self.content_root.join(collection)
    }

    pub fn industry_dir(&self, industry: Industry) -> PathBuf {
        self.collection_dir(collection_name(industry))
    }

    pub fn systems_dir(&self) -> PathBuf {
        self.collection_dir(SYSTEMS_COLLECTION)
    }
}

pub fn collection_name(industry: Industry) -> &'static str {
    match industry {
        Industry::Healthcare => "healthcareCodes",
        Industry::IrsTax => "irsTaxCodes",
        Industry::Banking => "bankingCodes",
        Industry::Gaming => "gamingCodes",
        Industry::Appliances => "applianceCodes",
    }
}

/// Values shared by every file of one run.
#[derive(Debug, Clone)]
pub struct EmitContext {
    pub lastmod: String,
    pub source_doc_id: Option<String>,
}

impl EmitContext {
    pub fn new(lastmod: String, source_doc_id: Option<String>) -> Self {
        EmitContext {
            lastmod,
            source_doc_id,
        }
    }
}

/// Run timestamp, formatted like `2026-10-15T09:20:00.000Z`.
pub fn lastmod_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Path of an entry's file relative to its collection directory.
pub fn relative_path(entry: &Entry) -> PathBuf {
    let file = format!("{}.{CONTENT_EXT}", entry.code_slug);
    match &entry.appliance {
        Some(h) => [
            h.appliance_type.as_str(),
            h.brand.as_str(),
            h.series_or_model.as_str(),
            file.as_str(),
        ]
        .iter()
        .collect(),
        None => PathBuf::from(file),
    }
}

pub fn render_entry(entry: &Entry, ctx: &EmitContext) -> String {
    let mut front = FrontMatter::new().field("industry", entry.industry.key());
    if let Some(h) = &entry.appliance {
        front = front
            .field("applianceType", h.appliance_type.as_str())
            .field("brand", h.brand.as_str())
            .field("seriesOrModel", h.series_or_model.as_str());
    }
    let front = front
        .field("code", entry.code.as_str())
        .field("shortLabel", entry.short_label.as_str())
        .opt_field("summary", entry.summary.as_deref())
        .field("lastmod", ctx.lastmod.as_str())
        .field("source", GOOGLE_DOC_SOURCE)
        .opt_field("sourceDocId", ctx.source_doc_id.as_deref());

    frontmatter::render_document(&front, &entry.body_html)
}

/// Replace every industry collection with the given entries.
///
/// All collections are staged first and only then swapped in, so a render or
/// write failure leaves the previous output untouched.
pub fn write_entries(
    layout: &OutputLayout,
    entries: &[Entry],
    ctx: &EmitContext,
) -> Result<BTreeMap<Industry, usize>> {
    let mut files: BTreeMap<Industry, Vec<(PathBuf, String)>> =
        Industry::ALL.into_iter().map(|i| (i, Vec::new())).collect();
    for entry in entries {
        files
            .entry(entry.industry)
            .or_default()
            .push((relative_path(entry), render_entry(entry, ctx)));
    }

    let pb = ProgressBar::new(entries.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} files")?
            .progress_chars("=> "),
    );

    let mut staged = Vec::with_capacity(files.len());
    let mut counts = BTreeMap::new();
    for (industry, industry_files) in &files {
        let dir = layout.industry_dir(*industry);
        staged.push(stage_dir(&dir, industry_files, Some(&pb))?);
        counts.insert(*industry, industry_files.len());
    }
    pb.finish_and_clear();

    for dir in staged {
        dir.commit()?;
    }

    info!(files = entries.len(), "wrote content collections");
    Ok(counts)
}

/// Replace `target` with exactly `files` (paths relative to `target`).
pub fn replace_dir(target: &Path, files: &[(PathBuf, String)]) -> Result<()> {
    stage_dir(target, files, None)?.commit()
}

/// A fully written sibling tree waiting to be swapped over its target.
#[derive(Debug)]
pub struct StagedDir {
    target: PathBuf,
    staging: PathBuf,
}

pub fn stage_dir(
    target: &Path,
    files: &[(PathBuf, String)],
    progress: Option<&ProgressBar>,
) -> Result<StagedDir> {
    let staging = sibling(target, "staging");
    remove_dir_with_retry(&staging)?;
    fs::create_dir_all(&staging)
        .with_context(|| format!("Failed to create staging directory: {}", staging.display()))?;

    for (rel, content) in files {
        let path = staging.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    debug!(target = %target.display(), files = files.len(), "staged directory");
    Ok(StagedDir {
        target: target.to_path_buf(),
        staging,
    })
}

impl StagedDir {
    /// Move the live tree aside, rename the staged tree into place, then
    /// delete the old tree.
    pub fn commit(self) -> Result<()> {
        let previous = sibling(&self.target, "previous");
        remove_dir_with_retry(&previous)?;

        if self.target.exists() {
            fs::rename(&self.target, &previous).with_context(|| {
                format!("Failed to move aside {}", self.target.display())
            })?;
        } else if let Some(parent) = self.target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        fs::rename(&self.staging, &self.target).with_context(|| {
            format!(
                "Failed to move {} into place at {}",
                self.staging.display(),
                self.target.display()
            )
        })?;

        remove_dir_with_retry(&previous)?;
        Ok(())
    }
}

/// `content/healthcareCodes` → `content/.healthcareCodes.<suffix>`
fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.{suffix}"))
}

/// Recursive delete that tolerates short-lived contention (a dev server
/// reading the tree). A missing directory counts as removed.
pub fn remove_dir_with_retry(path: &Path) -> Result<(), SyncError> {
    let mut attempt = 0;
    loop {
        match fs::remove_dir_all(path) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) if attempt + 1 >= REMOVE_ATTEMPTS => {
                return Err(SyncError::RemoveDir {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
            Err(e) => {
                attempt += 1;
                let backoff = Duration::from_millis(REMOVE_BACKOFF_MS * attempt as u64);
                warn!(
                    "Failed to remove {} (attempt {}/{}): {}, retrying in {}ms",
                    path.display(),
                    attempt,
                    REMOVE_ATTEMPTS,
                    e,
                    backoff.as_millis()
                );
                thread::sleep(backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::industry::ApplianceHierarchy;

    fn ctx() -> EmitContext {
        EmitContext::new("2026-01-01T00:00:00.000Z".into(), Some("doc-123".into()))
    }

    fn healthcare() -> Entry {
        Entry {
            industry: Industry::Healthcare,
            code: "CO-45".into(),
            code_slug: "co-45".into(),
            short_label: "Charges exceed fee schedule".into(),
            summary: Some("The \"allowed\" amount was exceeded.".into()),
            body_html: "<p>Code: CO-45</p>".into(),
            appliance: None,
        }
    }

    fn washer() -> Entry {
        Entry {
            industry: Industry::Appliances,
            code: "F5E1".into(),
            code_slug: "f5e1".into(),
            short_label: "Door lock failure".into(),
            summary: None,
            body_html: "<p>Code: F5E1</p>".into(),
            appliance: Some(ApplianceHierarchy {
                appliance_type: "washer".into(),
                brand: "whirlpool".into(),
                series_or_model: "cabrio".into(),
            }),
        }
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn paths_follow_identity() {
        assert_eq!(relative_path(&healthcare()), PathBuf::from("co-45.mdx"));
        assert_eq!(
            relative_path(&washer()),
            PathBuf::from("washer/whirlpool/cabrio/f5e1.mdx")
        );
    }

    #[test]
    fn renders_industry_entry() {
        assert_eq!(
            render_entry(&healthcare(), &ctx()),
            "---\n\
             industry: \"healthcare\"\n\
             code: \"CO-45\"\n\
             shortLabel: \"Charges exceed fee schedule\"\n\
             summary: \"The \\\"allowed\\\" amount was exceeded.\"\n\
             lastmod: \"2026-01-01T00:00:00.000Z\"\n\
             source: \"google-doc\"\n\
             sourceDocId: \"doc-123\"\n\
             ---\n\n<div>\n<p>Code: CO-45</p>\n</div>\n"
        );
    }

    #[test]
    fn renders_appliance_identity_fields() {
        let out = render_entry(&washer(), &EmitContext::new("t".into(), None));
        let fields = frontmatter::parse(&out).unwrap();
        assert_eq!(fields["industry"], "appliances");
        assert_eq!(fields["applianceType"], "washer");
        assert_eq!(fields["brand"], "whirlpool");
        assert_eq!(fields["seriesOrModel"], "cabrio");
        assert!(!fields.contains_key("summary"));
        assert!(!fields.contains_key("sourceDocId"));
    }

    #[test]
    fn lastmod_is_iso_utc_millis() {
        let ts = lastmod_now();
        assert!(ts.ends_with('Z'), "{ts}");
        assert_eq!(ts.len(), "2026-01-01T00:00:00.000Z".len());
    }

    #[test]
    fn write_replaces_previous_output() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(tmp.path());
        let stale = layout.industry_dir(Industry::Gaming).join("stale.mdx");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "old").unwrap();

        let counts = write_entries(&layout, &[healthcare(), washer()], &ctx()).unwrap();
        assert_eq!(counts[&Industry::Healthcare], 1);
        assert_eq!(counts[&Industry::Gaming], 0);

        assert!(!stale.exists());
        assert!(layout.industry_dir(Industry::Gaming).is_dir());
        assert!(layout.industry_dir(Industry::Banking).is_dir());
        let written = read(&layout.industry_dir(Industry::Healthcare).join("co-45.mdx"));
        assert!(written.contains("code: \"CO-45\""));
        assert!(layout
            .industry_dir(Industry::Appliances)
            .join("washer/whirlpool/cabrio/f5e1.mdx")
            .is_file());

        // No staging or backup trees left behind.
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn rewrite_is_byte_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(tmp.path());
        let path = layout.industry_dir(Industry::Healthcare).join("co-45.mdx");

        write_entries(&layout, &[healthcare()], &ctx()).unwrap();
        let first = read(&path);
        write_entries(&layout, &[healthcare()], &ctx()).unwrap();
        assert_eq!(read(&path), first);
    }

    #[test]
    fn replace_dir_creates_missing_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nested/content/systemCodes");
        replace_dir(&target, &[(PathBuf::from("routers/error-651.mdx"), "x".into())]).unwrap();
        assert_eq!(read(&target.join("routers/error-651.mdx")), "x");
    }

    #[test]
    fn removing_missing_dir_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(remove_dir_with_retry(&tmp.path().join("nope")).is_ok());
    }

    #[test]
    fn removing_a_file_path_exhausts_retries() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not-a-dir");
        fs::write(&file, "x").unwrap();
        let err = remove_dir_with_retry(&file).unwrap_err();
        assert!(matches!(err, SyncError::RemoveDir { .. }));
    }
}
