//! In-memory title catalog.
//!
//! Loaded once from a JSON document and read-only afterwards. Lookups and
//! filters never allocate entries; results borrow from the catalog and keep
//! declaration order.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::title::{Category, ContentFormat, Platform, Region, TitleId};
use super::CatalogError;

/// A single catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleEntry {
    pub id: TitleId,
    pub name: String,
    pub region: Region,
}

impl TitleEntry {
    pub fn new(id: impl Into<TitleId>, name: impl Into<String>, region: Region) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            region,
        }
    }
}

/// On-disk catalog document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    /// Catalog format version
    #[serde(default = "default_version")]
    pub version: u32,

    pub titles: Vec<TitleEntry>,
}

fn default_version() -> u32 {
    1
}

/// Conjunction of catalog predicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleFilter {
    pub category: Category,
    pub region: Option<Region>,
    pub platform: Option<Platform>,
    pub format: Option<ContentFormat>,
    /// Lower-cased search needle; `None` or empty matches everything
    pub search: Option<String>,
}

impl TitleFilter {
    /// Build a filter from raw query tokens. Missing tokens take the
    /// defaults: category `game`, everything else unrestricted.
    pub fn from_tokens(
        category: Option<&str>,
        region: Option<&str>,
        platform: Option<&str>,
        format: Option<&str>,
        search: Option<&str>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            category: category
                .map(str::parse::<Category>)
                .transpose()?
                .unwrap_or_default(),
            region: region.map(Region::parse_filter).transpose()?.flatten(),
            platform: platform.map(Platform::parse_filter).transpose()?.flatten(),
            format: format.map(ContentFormat::parse_filter).transpose()?.flatten(),
            search: search
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty()),
        })
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_search(mut self, search: impl AsRef<str>) -> Self {
        let needle = search.as_ref().trim().to_lowercase();
        self.search = (!needle.is_empty()).then_some(needle);
        self
    }

    /// Check a single entry against every predicate
    pub fn matches(&self, entry: &TitleEntry) -> bool {
        if !self.category.matches(entry.id) {
            return false;
        }
        if let Some(region) = self.region {
            if !entry.region.overlaps(region) {
                return false;
            }
        }
        if let Some(platform) = self.platform {
            if entry.id.platform() != platform {
                return false;
            }
        }
        if let Some(format) = self.format {
            if entry.id.format() != format {
                return false;
            }
        }
        match &self.search {
            Some(needle) => entry.name.to_lowercase().contains(needle.as_str()),
            None => true,
        }
    }
}

/// Read-only title catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<TitleEntry>,
    by_id: HashMap<TitleId, usize>,
}

impl Catalog {
    /// Build a catalog from entries in declaration order.
    ///
    /// Fails on duplicate IDs so that a lookup can never be ambiguous.
    pub fn from_entries(entries: Vec<TitleEntry>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            if by_id.insert(entry.id, idx).is_some() {
                return Err(CatalogError::DuplicateTitle(entry.id));
            }
        }
        Ok(Self { entries, by_id })
    }

    /// Load the catalog from a JSON document
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read catalog: {}", path.display()))?;

        Self::from_json(&content)
            .with_context(|| format!("Failed to load catalog: {}", path.display()))
    }

    /// Parse a catalog document
    pub fn from_json(content: &str) -> Result<Self> {
        let file: CatalogFile =
            serde_json::from_str(content).context("Failed to parse catalog JSON")?;
        Ok(Self::from_entries(file.titles)?)
    }

    /// Look up an entry by ID
    pub fn lookup(&self, id: TitleId) -> Option<&TitleEntry> {
        self.by_id.get(&id).map(|&idx| &self.entries[idx])
    }

    /// All entries matching the filter, in catalog order
    pub fn filter(&self, filter: &TitleFilter) -> Vec<&TitleEntry> {
        self.entries.iter().filter(|e| filter.matches(e)).collect()
    }

    /// Shorthand for a name search across all categories
    pub fn search(&self, query: &str) -> Vec<&TitleEntry> {
        self.filter(&TitleFilter::default().with_category(Category::All).with_search(query))
    }

    pub fn entries(&self) -> &[TitleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
