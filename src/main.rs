mod config;
mod debug;
mod directory;
mod emit;
mod error;
mod fetch;
mod frontmatter;
mod merge;
mod parser;
mod slug;
mod systems;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use config::{Config, SourceArgs};
use emit::{EmitContext, OutputLayout};
use parser::industry::Industry;

#[derive(Parser)]
#[command(name = "codes_sync", about = "Error-code library import from a Google Doc export")]
struct Cli {
    /// Project root; content goes to <root>/src/content
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the document and regenerate every industry collection
    Sync {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Regenerate the systems collection from the registry file
    Systems {
        #[arg(long, default_value = "data/systems.json")]
        data: PathBuf,
    },
    /// Code directory table for one emitted collection
    Directory {
        /// Industry key (e.g. irs-tax) or collection directory (e.g. systemCodes/routers)
        collection: String,
        /// Case-insensitive regex over code, slug, label and summary (repeatable)
        #[arg(short, long = "pattern")]
        patterns: Vec<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value_t = directory::DEFAULT_LIMIT)]
        limit: usize,
        /// Print slugs related to this one instead of the table
        #[arg(long)]
        related: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let result = run(Cli::parse()).await;

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let layout = OutputLayout::new(config::content_root(&cli.root));

    match cli.command {
        Commands::Sync { source } => {
            let config = Config::new(&cli.root, source);
            sync(&config, &emit::lastmod_now()).await
        }
        Commands::Systems { data } => {
            let path = if data.is_absolute() {
                data
            } else {
                cli.root.join(data)
            };
            let registry = systems::SystemsRegistry::load(&path)?;
            let written = systems::write_registry(&layout, &registry, &emit::lastmod_now())?;
            println!(
                "Wrote {} systems codes across {} subcategories.",
                written,
                registry.subcategories().len()
            );
            Ok(())
        }
        Commands::Directory {
            collection,
            patterns,
            limit,
            related,
        } => {
            let dir = match Industry::from_key(&collection) {
                Some(industry) => layout.industry_dir(industry),
                None => layout.collection_dir(&collection),
            };
            print_directory(&dir, &patterns, limit, related.as_deref())
        }
    }
}

async fn sync(config: &Config, lastmod: &str) -> anyhow::Result<()> {
    let html = fetch::load_html(config).await?;
    if config.debug_write {
        debug::write_export_html(&config.cache_dir(), &html)?;
    }

    let elements = parser::html::parse_elements(&html);
    if config.debug_write {
        let cache = config.cache_dir();
        debug::write_structure(&cache, &elements)?;
        debug::write_appliance_samples(&cache, &parser::blocks::segment_delimited(&elements))?;
    }

    let entries = parser::parse_entries(&elements)?;
    let parsed = entries.len();
    let entries = merge::merge_entries(entries)?;
    info!(parsed, merged = entries.len(), "merged entries");

    let layout = OutputLayout::new(config.content_root());
    let ctx = EmitContext::new(lastmod.to_string(), Some(config.doc_id.clone()));
    let counts = emit::write_entries(&layout, &entries, &ctx)?;

    for (industry, count) in &counts {
        info!(%industry, count, "industry entries");
    }
    let summary: Vec<String> = counts
        .iter()
        .map(|(industry, count)| format!("{industry}: {count}"))
        .collect();
    println!("Synced {} entries ({}).", entries.len(), summary.join(", "));
    Ok(())
}

fn print_directory(
    dir: &Path,
    patterns: &[String],
    limit: usize,
    related: Option<&str>,
) -> anyhow::Result<()> {
    let docs = directory::read_collection(dir)
        .with_context(|| format!("Unknown collection at {}", dir.display()))?;

    if let Some(current) = related {
        let slugs: Vec<String> = docs.iter().map(|d| d.slug.clone()).collect();
        for slug in directory::pick_related(&slugs, current, 3, 10) {
            println!("{slug}");
        }
        return Ok(());
    }

    let regexes = directory::compile_patterns(patterns)?;
    let rows = directory::resolve(&docs, &regexes, limit);
    if rows.is_empty() {
        println!("No codes found.");
        return Ok(());
    }

    println!(
        "{:>3} | {:<16} | {:<40} | {:<40}",
        "#", "Code", "Meaning", "Next step"
    );
    println!("{}", "-".repeat(109));
    for (i, r) in rows.iter().enumerate() {
        println!(
            "{:>3} | {:<16} | {:<40} | {:<40}",
            i + 1,
            truncate(&r.code, 16),
            truncate(&r.meaning, 40),
            truncate(r.next_step, 40)
        );
    }

    println!("\n--- Links ---");
    for r in &rows {
        println!("  {}: {}", truncate(&r.code, 16), r.href);
    }

    println!("\n{} of {} codes", rows.len(), docs.len());
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
