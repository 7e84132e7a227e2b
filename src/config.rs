//! Configuration for titledl paths, fetcher and server.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (TITLEDL_HOME, TITLEDL_CATALOG, TITLEDL_DOWNLOADS, TITLEDL_FETCHER)
//! 2. Config file (.titledl/config.yaml)
//! 3. Defaults (~/.titledl)
//!
//! Config file discovery:
//! - Searches current directory and parents for .titledl/config.yaml
//! - `home` is relative to the .titledl directory, other paths to its parent

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const DEFAULT_FETCHER: &str = "wiiudownloader";
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub fetcher: Option<FetcherConfig>,
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .titledl/)
    pub home: Option<String>,
    /// Catalog JSON document (relative to project root)
    pub catalog: Option<String>,
    /// Root for job output directories (relative to project root)
    pub downloads: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// Catalog document
    pub catalog: PathBuf,
    /// Root for job output directories
    pub downloads: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub fetcher: FetcherSettings,
    pub server: ServerSettings,
}

/// External fetch tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherSettings {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            command: DEFAULT_FETCHER.to_string(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".titledl").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Combine config file, environment and defaults
fn resolve(
    default_home: PathBuf,
    config_file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let (config_path, config) = match config_file {
        Some((path, config)) => (Some(path), Some(config)),
        None => (None, None),
    };

    // .titledl/ and the project root that holds it
    let state_dir = config_path
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let base_dir = state_dir.parent().unwrap_or(Path::new("."));

    let paths = config.as_ref().map(|c| c.paths.clone()).unwrap_or_default();

    let home = env("TITLEDL_HOME")
        .map(PathBuf::from)
        .or_else(|| paths.home.as_deref().map(|p| resolve_path(state_dir, p)))
        .unwrap_or(default_home);

    let catalog = env("TITLEDL_CATALOG")
        .map(PathBuf::from)
        .or_else(|| paths.catalog.as_deref().map(|p| resolve_path(base_dir, p)))
        .unwrap_or_else(|| home.join("catalog.json"));

    let downloads = env("TITLEDL_DOWNLOADS")
        .map(PathBuf::from)
        .or_else(|| paths.downloads.as_deref().map(|p| resolve_path(base_dir, p)))
        .unwrap_or_else(|| home.join("downloads"));

    let fetcher_config = config.as_ref().and_then(|c| c.fetcher.clone());
    let fetcher = FetcherSettings {
        command: env("TITLEDL_FETCHER")
            .or_else(|| fetcher_config.as_ref().and_then(|f| f.command.clone()))
            .unwrap_or_else(|| DEFAULT_FETCHER.to_string()),
        args: fetcher_config.map(|f| f.args).unwrap_or_default(),
    };

    let server_config = config.as_ref().and_then(|c| c.server.clone());
    let server = ServerSettings {
        bind: server_config
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string()),
        port: server_config
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_PORT),
    };

    ResolvedConfig {
        home,
        catalog,
        downloads,
        config_file: config_path,
        fetcher,
        server,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".titledl");

    let config_file = match find_config_file() {
        Some(path) => {
            let config = load_config_file(&path)?;
            Some((path, config))
        }
        None => None,
    };

    Ok(resolve(default_home, config_file, |key| {
        std::env::var(key).ok()
    }))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the catalog document path
pub fn catalog_path() -> Result<PathBuf> {
    Ok(config()?.catalog.clone())
}
