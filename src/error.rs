use std::path::PathBuf;

use thiserror::Error;

/// Conditions that abort a sync run. Everything else is a silent drop.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Google Doc export request failed with status {status}.")]
    FetchStatus { status: u16 },

    #[error(
        "Google Doc export is not accessible for build-time import.\n\
         Option A: Make the document publicly exportable and keep the default importer.\n\
         Option B: Export the document to HTML and set GDOC_HTML_PATH to that file path.\n\
         Option C: Set GDOC_EXPORT_URL to a published-to-web or otherwise accessible export endpoint."
    )]
    FetchBlocked,

    #[error(
        "No per-code entries were detected in the Google Doc export.\n\
         This importer expects `=== START ERROR CODE ===` / `=== END ERROR CODE ===` blocks, \
         or industry headings (H1/H2) with per-code headings beneath them.\n\
         Update the document structure or implement a custom parser for the current document format."
    )]
    NoEntries,

    #[error("Appliance entry detected without type/brand/model context: {heading}")]
    ApplianceContextIncomplete { heading: String },

    #[error("Duplicate code slug detected for {industry}: {slug}")]
    DuplicateIdentity { industry: String, slug: String },

    #[error("failed to remove {}: {source}", path.display())]
    RemoveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
