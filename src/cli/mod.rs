//! Command-line interface for titledl.
//!
//! Provides commands for querying the title catalog, fetching a single
//! title with terminal progress, and running the HTTP service.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};

use crate::adapters::{FetchError, FetchRequest, ProcessFetcher};
use crate::catalog::{Catalog, TitleEntry, TitleFilter, TitleId};
use crate::config;
use crate::core::run_fetch;
use crate::progress::{ConsoleProgress, ProgressSink};
use crate::server::{self, AppState};

/// Exit code used when a fetch is interrupted by Ctrl-C or SIGTERM
pub const EXIT_CANCELLED: i32 = 130;

/// Exit code for argument and setup errors
pub const EXIT_FAILURE: i32 = 1;

/// Exit code for a failed argument parse. `--help` and `--version` keep
/// clap's success code; every other usage error maps to [`EXIT_FAILURE`].
pub fn parse_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit_code(),
        _ => EXIT_FAILURE,
    }
}

/// titledl - Title catalog browser and download manager
#[derive(Parser, Debug)]
#[command(name = "titledl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Catalog document to use instead of the configured one
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List catalog titles
    List {
        /// game, update, dlc, demo, system or all
        #[arg(short, long)]
        category: Option<String>,

        /// japan, usa, europe or all
        #[arg(short, long)]
        region: Option<String>,

        /// wiiu, vwii, wii, 3ds, switch or all
        #[arg(short, long)]
        platform: Option<String>,

        /// content, cia, nsp, iso or all
        #[arg(short, long)]
        format: Option<String>,

        /// Case-insensitive name substring
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Search titles by name
    Search {
        /// Search query
        query: String,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        region: Option<String>,
    },

    /// Show details of one title
    Show {
        /// Title ID (hex)
        title_id: String,
    },

    /// Download one title with terminal progress
    Fetch {
        /// Title ID (hex)
        #[arg(short, long)]
        title: String,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Run the post-download transform
        #[arg(long, alias = "decrypt")]
        transform: bool,

        /// Delete the untransformed payload after a successful transform
        #[arg(long, alias = "delete-encrypted")]
        delete_after: bool,
    },

    /// Start the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Root directory for job output
        #[arg(short, long)]
        downloads: Option<PathBuf>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let catalog_override = self.catalog.as_deref();

        match self.command {
            Commands::List {
                category,
                region,
                platform,
                format,
                search,
            } => {
                let filter = TitleFilter::from_tokens(
                    category.as_deref(),
                    region.as_deref(),
                    platform.as_deref(),
                    format.as_deref(),
                    search.as_deref(),
                )?;
                list_titles(catalog_override, &filter).await
            }
            Commands::Search {
                query,
                category,
                region,
            } => {
                let filter = TitleFilter::from_tokens(
                    Some(category.as_deref().unwrap_or("all")),
                    region.as_deref(),
                    None,
                    None,
                    Some(&query),
                )?;
                list_titles(catalog_override, &filter).await
            }
            Commands::Show { title_id } => {
                show_title(catalog_override, &title_id).await
            }
            Commands::Fetch {
                title,
                output,
                transform,
                delete_after,
            } => {
                fetch_title(catalog_override, &title, output, transform, delete_after).await
            }
            Commands::Serve { port, downloads } => {
                serve(catalog_override, port, downloads).await
            }
            Commands::Config => {
                show_config()
            }
        }
    }
}

/// Load the catalog from the override path or the configured one
async fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config::catalog_path()?,
    };
    Catalog::load(&path).await
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// List catalog titles matching a filter
async fn list_titles(catalog_path: Option<&Path>, filter: &TitleFilter) -> Result<()> {
    let catalog = load_catalog(catalog_path).await?;
    let titles = catalog.filter(filter);

    if titles.is_empty() {
        println!("No titles found matching the criteria.");
        return Ok(());
    }

    println!("{:<18} {:<50} {:<16} {:<14}", "ID", "NAME", "REGION", "TYPE");
    println!("{}", "-".repeat(100));

    for entry in &titles {
        println!(
            "{:<18} {:<50} {:<16} {:<14}",
            entry.id,
            truncate(&entry.name, 50),
            entry.region.label(),
            entry.id.kind().label()
        );
    }

    println!("\nTotal: {} titles", titles.len());

    Ok(())
}

fn print_title(entry: &TitleEntry) {
    println!("  ID:       {}", entry.id);
    println!("  Name:     {}", entry.name);
    println!("  Region:   {}", entry.region);
    println!("  Type:     {}", entry.id.kind());
    println!("  Platform: {}", entry.id.platform());
    println!("  Format:   {}", entry.id.format());
}

/// Show details of one title
async fn show_title(catalog_path: Option<&Path>, raw_id: &str) -> Result<()> {
    let title_id: TitleId = raw_id.parse()?;
    let catalog = load_catalog(catalog_path).await?;

    let entry = catalog
        .lookup(title_id)
        .ok_or_else(|| anyhow::anyhow!("Title not found: {}", title_id))?;

    print_title(entry);
    Ok(())
}

/// Fetch one title in the foreground
async fn fetch_title(
    catalog_path: Option<&Path>,
    raw_id: &str,
    output: PathBuf,
    transform: bool,
    delete_after: bool,
) -> Result<()> {
    let title_id: TitleId = raw_id.parse()?;
    let catalog = load_catalog(catalog_path).await?;
    let entry = catalog
        .lookup(title_id)
        .ok_or_else(|| anyhow::anyhow!("Title not found: {}", title_id))?;

    tokio::fs::create_dir_all(&output)
        .await
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;

    let cfg = config::config()?;
    let fetcher = Arc::new(ProcessFetcher::from_settings(&cfg.fetcher));

    let progress = Arc::new(ConsoleProgress::new());
    progress.set_display_name(&entry.name);

    let watcher = {
        let progress = progress.clone();
        tokio::spawn(async move {
            server::shutdown_signal().await;
            eprintln!("\nCancelling download...");
            progress.request_cancel();
        })
    };

    let request = FetchRequest::new(
        title_id,
        output.clone(),
        transform,
        delete_after,
        progress.cancellation_token(),
    );
    let result = run_fetch(fetcher, request, progress.clone()).await;

    watcher.abort();
    progress.finish();

    match result {
        Ok(()) if !progress.is_cancelled() => {
            println!("Download completed: {}", output.display());
            Ok(())
        }
        Ok(()) | Err(FetchError::Cancelled) => {
            eprintln!("Download cancelled");
            std::process::exit(EXIT_CANCELLED);
        }
        Err(e) if progress.is_cancelled() => {
            eprintln!("Download cancelled ({})", e);
            std::process::exit(EXIT_CANCELLED);
        }
        Err(e) => {
            eprintln!("Download failed: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    }
}

/// Start the HTTP API server
async fn serve(
    catalog_path: Option<&Path>,
    port: Option<u16>,
    downloads: Option<PathBuf>,
) -> Result<()> {
    let cfg = config::config()?;
    let catalog = load_catalog(catalog_path).await?;
    tracing::info!(titles = catalog.len(), "Catalog loaded");

    let downloads = downloads.unwrap_or_else(|| cfg.downloads.clone());
    tokio::fs::create_dir_all(&downloads)
        .await
        .with_context(|| format!("Failed to create downloads directory: {}", downloads.display()))?;

    let addr: SocketAddr = format!("{}:{}", cfg.server.bind, port.unwrap_or(cfg.server.port))
        .parse()
        .with_context(|| format!("Invalid bind address: {}", cfg.server.bind))?;

    let fetcher = Arc::new(ProcessFetcher::from_settings(&cfg.fetcher));
    let state = AppState::new(Arc::new(catalog), fetcher, downloads);

    server::serve(state, addr).await
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("titledl configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Catalog:   {}", cfg.catalog.display());
    println!("  Downloads: {}", cfg.downloads.display());
    println!();
    println!("Fetcher:");
    println!("  Command:   {}", cfg.fetcher.command);
    if !cfg.fetcher.args.is_empty() {
        println!("  Args:      {}", cfg.fetcher.args.join(" "));
    }
    println!();
    println!("Server:");
    println!("  Bind:      {}:{}", cfg.server.bind, cfg.server.port);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch_command() {
        let cli = Cli::try_parse_from([
            "titledl",
            "fetch",
            "--title",
            "00050000101C9500",
            "--output",
            "/tmp/out",
            "--decrypt",
        ])
        .unwrap();

        match cli.command {
            Commands::Fetch {
                title,
                output,
                transform,
                delete_after,
            } => {
                assert_eq!(title, "00050000101C9500");
                assert_eq!(output, PathBuf::from("/tmp/out"));
                assert!(transform);
                assert!(!delete_after);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_catalog_flag() {
        let cli = Cli::try_parse_from(["titledl", "list", "--catalog", "titles.json", "-r", "usa"])
            .unwrap();
        assert_eq!(cli.catalog, Some(PathBuf::from("titles.json")));
    }

    #[test]
    fn test_missing_fetch_argument_exits_with_failure() {
        let err = Cli::try_parse_from(["titledl", "fetch", "--title", "00050000101C9500"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(parse_exit_code(&err), 1);

        let err = Cli::try_parse_from(["titledl", "fetch", "--output", "/tmp/out"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 1);

        let err = Cli::try_parse_from(["titledl", "frobnicate"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 1);
    }

    #[test]
    fn test_help_and_version_exit_successfully() {
        let help = Cli::try_parse_from(["titledl", "--help"]).unwrap_err();
        assert_eq!(help.kind(), ErrorKind::DisplayHelp);
        assert_eq!(parse_exit_code(&help), 0);

        let version = Cli::try_parse_from(["titledl", "--version"]).unwrap_err();
        assert_eq!(version.kind(), ErrorKind::DisplayVersion);
        assert_eq!(parse_exit_code(&version), 0);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
    }
}
