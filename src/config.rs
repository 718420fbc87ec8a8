use std::path::{Path, PathBuf};

use clap::builder::BoolishValueParser;
use clap::Args;

/// Published error-code library document.
pub const DOC_ID: &str = "1o9sKjxyBhrNQRxHcyXMq9toYPLqSEgn8kXWqmzQjX1U";

pub fn export_url_for(doc_id: &str) -> String {
    format!("https://docs.google.com/document/d/{doc_id}/export?format=html")
}

/// Where the document comes from and what to do with it.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Read the export from a local HTML file instead of fetching it
    #[arg(long, env = "GDOC_HTML_PATH")]
    pub html_path: Option<PathBuf>,

    /// Fetch the export from this URL instead of the default endpoint
    #[arg(long, env = "GDOC_EXPORT_URL")]
    pub export_url: Option<String>,

    /// Write the raw export and a structure summary to .cache/
    #[arg(long, env = "GDOC_DEBUG_WRITE", value_parser = BoolishValueParser::new())]
    pub debug_write: bool,

    /// Document id recorded as sourceDocId
    #[arg(long, default_value = DOC_ID)]
    pub doc_id: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub html_path: Option<PathBuf>,
    pub export_url: String,
    pub debug_write: bool,
    pub doc_id: String,
}

impl Config {
    pub fn new(root: &Path, args: SourceArgs) -> Self {
        let html_path = args.html_path.map(|p| {
            if p.is_absolute() {
                p
            } else {
                root.join(p)
            }
        });
        let export_url = args
            .export_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| export_url_for(&args.doc_id));

        Config {
            root: root.to_path_buf(),
            html_path,
            export_url,
            debug_write: args.debug_write,
            doc_id: args.doc_id,
        }
    }

    pub fn content_root(&self) -> PathBuf {
        content_root(&self.root)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(".cache")
    }
}

pub fn content_root(root: &Path) -> PathBuf {
    root.join("src").join("content")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SourceArgs {
        SourceArgs {
            html_path: None,
            export_url: None,
            debug_write: false,
            doc_id: DOC_ID.to_string(),
        }
    }

    #[test]
    fn defaults_to_doc_export_url() {
        let config = Config::new(Path::new("/site"), args());
        assert_eq!(
            config.export_url,
            format!("https://docs.google.com/document/d/{DOC_ID}/export?format=html")
        );
        assert_eq!(config.content_root(), PathBuf::from("/site/src/content"));
        assert_eq!(config.cache_dir(), PathBuf::from("/site/.cache"));
    }

    #[test]
    fn relative_html_path_resolves_against_root() {
        let config = Config::new(
            Path::new("/site"),
            SourceArgs {
                html_path: Some(PathBuf::from("exports/doc.html")),
                ..args()
            },
        );
        assert_eq!(config.html_path, Some(PathBuf::from("/site/exports/doc.html")));

        let config = Config::new(
            Path::new("/site"),
            SourceArgs {
                html_path: Some(PathBuf::from("/tmp/doc.html")),
                ..args()
            },
        );
        assert_eq!(config.html_path, Some(PathBuf::from("/tmp/doc.html")));
    }

    #[test]
    fn blank_export_url_falls_back() {
        let config = Config::new(
            Path::new("."),
            SourceArgs {
                export_url: Some("  ".into()),
                doc_id: "abc".into(),
                ..args()
            },
        );
        assert_eq!(
            config.export_url,
            "https://docs.google.com/document/d/abc/export?format=html"
        );
    }
}
