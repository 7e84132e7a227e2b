//! Title identifiers, regions and the classification derived from them.
//!
//! A title ID is a 64-bit value. The upper 32 bits ("high word") select the
//! platform and content category, the lower 32 bits identify the title.
//! Everything in this module except the name is a pure function of the ID.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::CatalogError;

/// 64-bit title identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TitleId(u64);

impl TitleId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub fn value(self) -> u64 {
        self.0
    }

    /// Upper 32 bits (platform + category prefix)
    pub fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Kind of content, e.g. game or update
    pub fn kind(self) -> TitleKind {
        prefix_info(self.high())
            .map(|(_, kind)| kind)
            .unwrap_or(TitleKind::Unknown)
    }

    /// Platform bucket according to the prefix table
    pub fn platform(self) -> Platform {
        prefix_info(self.high())
            .map(|(platform, _)| platform)
            .unwrap_or(Platform::Unknown)
    }

    /// Packaging format shown to users
    pub fn format(self) -> ContentFormat {
        self.platform().format()
    }

    /// Upper-case 16 digit hex form, as used on the wire
    pub fn to_hex(self) -> String {
        format!("{:016X}", self.0)
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl FromStr for TitleId {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() || digits.len() > 16 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CatalogError::InvalidTitleId(s.to_string()));
        }

        u64::from_str_radix(digits, 16)
            .map(TitleId)
            .map_err(|_| CatalogError::InvalidTitleId(s.to_string()))
    }
}

impl From<u64> for TitleId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl Serialize for TitleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TitleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Hex(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Hex(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Number(n) => Ok(TitleId(n)),
        }
    }
}

/// Platform a title belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    WiiU,
    Vwii,
    Wii,
    N3ds,
    Switch,
    Unknown,
}

impl Platform {
    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            Platform::WiiU => "Wii U",
            Platform::Vwii => "vWii",
            Platform::Wii => "Wii",
            Platform::N3ds => "3DS",
            Platform::Switch => "Switch",
            Platform::Unknown => "Unknown",
        }
    }

    pub fn format(self) -> ContentFormat {
        match self {
            Platform::WiiU | Platform::Vwii => ContentFormat::Content,
            Platform::N3ds => ContentFormat::Cia,
            Platform::Switch => ContentFormat::Nsp,
            Platform::Wii => ContentFormat::Iso,
            Platform::Unknown => ContentFormat::Unknown,
        }
    }

    /// Parse a filter token. `all` yields `None` (no filtering).
    pub fn parse_filter(token: &str) -> Result<Option<Self>, CatalogError> {
        match token.trim().to_lowercase().as_str() {
            "" | "all" => Ok(None),
            "wiiu" => Ok(Some(Platform::WiiU)),
            "vwii" => Ok(Some(Platform::Vwii)),
            "wii" => Ok(Some(Platform::Wii)),
            "3ds" => Ok(Some(Platform::N3ds)),
            "switch" => Ok(Some(Platform::Switch)),
            _ => Err(CatalogError::invalid_filter("platform", token)),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of content a title ID denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TitleKind {
    Game,
    Update,
    Dlc,
    Demo,
    SystemApp,
    SystemData,
    SystemApplet,
    VwiiIos,
    VwiiSystemApp,
    VwiiSystem,
    Unknown,
}

impl TitleKind {
    pub fn label(self) -> &'static str {
        match self {
            TitleKind::Game => "Game",
            TitleKind::Update => "Update",
            TitleKind::Dlc => "DLC",
            TitleKind::Demo => "Demo",
            TitleKind::SystemApp => "System App",
            TitleKind::SystemData => "System Data",
            TitleKind::SystemApplet => "System Applet",
            TitleKind::VwiiIos => "vWii IOS",
            TitleKind::VwiiSystemApp => "vWii System App",
            TitleKind::VwiiSystem => "vWii System",
            TitleKind::Unknown => "Unknown",
        }
    }

    /// Listing category this kind falls under
    pub fn category(self) -> Option<Category> {
        match self {
            TitleKind::Game => Some(Category::Game),
            TitleKind::Update => Some(Category::Update),
            TitleKind::Dlc => Some(Category::Dlc),
            TitleKind::Demo => Some(Category::Demo),
            TitleKind::SystemApp
            | TitleKind::SystemData
            | TitleKind::SystemApplet
            | TitleKind::VwiiIos
            | TitleKind::VwiiSystemApp
            | TitleKind::VwiiSystem => Some(Category::System),
            TitleKind::Unknown => None,
        }
    }
}

impl fmt::Display for TitleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Listing category used by the `category` filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Category {
    #[default]
    Game,
    Update,
    Dlc,
    Demo,
    System,
    All,
}

impl Category {
    pub fn matches(self, id: TitleId) -> bool {
        match self {
            Category::All => true,
            category => id.kind().category() == Some(category),
        }
    }
}

impl FromStr for Category {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "game" => Ok(Category::Game),
            "update" => Ok(Category::Update),
            "dlc" => Ok(Category::Dlc),
            "demo" => Ok(Category::Demo),
            "system" => Ok(Category::System),
            "all" => Ok(Category::All),
            _ => Err(CatalogError::invalid_filter("category", s)),
        }
    }
}

/// Packaging format derived from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentFormat {
    Content,
    Cia,
    Nsp,
    Iso,
    Unknown,
}

impl ContentFormat {
    pub fn label(self) -> &'static str {
        match self {
            ContentFormat::Content => "Content",
            ContentFormat::Cia => "CIA",
            ContentFormat::Nsp => "NSP",
            ContentFormat::Iso => "ISO",
            ContentFormat::Unknown => "Unknown",
        }
    }

    /// Parse a filter token. `all` yields `None`.
    pub fn parse_filter(token: &str) -> Result<Option<Self>, CatalogError> {
        match token.trim().to_lowercase().as_str() {
            "" | "all" => Ok(None),
            "content" => Ok(Some(ContentFormat::Content)),
            "cia" => Ok(Some(ContentFormat::Cia)),
            "nsp" => Ok(Some(ContentFormat::Nsp)),
            "iso" => Ok(Some(ContentFormat::Iso)),
            _ => Err(CatalogError::invalid_filter("format", token)),
        }
    }
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Region bitmask over Japan, USA and Europe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region(u8);

impl Region {
    pub const JAPAN: Region = Region(0x01);
    pub const USA: Region = Region(0x02);
    pub const EUROPE: Region = Region(0x04);
    pub const ALL: Region = Region(0x07);

    pub const fn from_bits(bits: u8) -> Self {
        Region(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// True when the two masks share at least one region
    pub fn overlaps(self, other: Region) -> bool {
        self.0 & other.0 != 0
    }

    pub fn label(self) -> &'static str {
        let eur = self.overlaps(Region::EUROPE);
        let usa = self.overlaps(Region::USA);
        let jpn = self.overlaps(Region::JAPAN);
        match (eur, usa, jpn) {
            (true, true, true) => "All",
            (true, true, false) => "Europe, USA",
            (true, false, true) => "Europe, Japan",
            (false, true, true) => "USA, Japan",
            (true, false, false) => "Europe",
            (false, true, false) => "USA",
            (false, false, true) => "Japan",
            (false, false, false) => "Unknown",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "japan" | "jpn" => Some(Region::JAPAN),
            "usa" => Some(Region::USA),
            "europe" | "eur" => Some(Region::EUROPE),
            "all" => Some(Region::ALL),
            _ => None,
        }
    }

    /// Parse a filter token. `all` yields `None`.
    pub fn parse_filter(token: &str) -> Result<Option<Self>, CatalogError> {
        match token.trim().to_lowercase().as_str() {
            "" | "all" => Ok(None),
            other => Self::from_token(other)
                .map(Some)
                .ok_or_else(|| CatalogError::invalid_filter("region", token)),
        }
    }
}

impl std::ops::BitOr for Region {
    type Output = Region;

    fn bitor(self, rhs: Region) -> Region {
        Region(self.0 | rhs.0)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Region {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bits(u8),
            Tokens(Vec<String>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bits(bits) => Ok(Region(bits)),
            Raw::Tokens(tokens) => tokens.iter().try_fold(Region::default(), |acc, token| {
                Region::from_token(token)
                    .map(|r| acc | r)
                    .ok_or_else(|| serde::de::Error::custom(format!("unknown region: {}", token)))
            }),
        }
    }
}

/// High-word prefixes known per platform
const PREFIX_TABLE: &[(u32, Platform, TitleKind)] = &[
    (0x0005_0000, Platform::WiiU, TitleKind::Game),
    (0x0005_0002, Platform::WiiU, TitleKind::Demo),
    (0x0005_000C, Platform::WiiU, TitleKind::Dlc),
    (0x0005_000E, Platform::WiiU, TitleKind::Update),
    (0x0005_0010, Platform::WiiU, TitleKind::SystemApp),
    (0x0005_001B, Platform::WiiU, TitleKind::SystemData),
    (0x0005_0030, Platform::WiiU, TitleKind::SystemApplet),
    (0x0000_0007, Platform::Vwii, TitleKind::VwiiIos),
    (0x0007_0002, Platform::Vwii, TitleKind::VwiiSystemApp),
    (0x0007_0008, Platform::Vwii, TitleKind::VwiiSystem),
    (0x0001_0000, Platform::Wii, TitleKind::Game),
    (0x0001_0001, Platform::Wii, TitleKind::Game),
    (0x0001_0002, Platform::Wii, TitleKind::SystemApp),
    (0x0001_0004, Platform::Wii, TitleKind::Game),
    (0x0001_0005, Platform::Wii, TitleKind::Dlc),
    (0x0001_0008, Platform::Wii, TitleKind::SystemData),
    (0x0004_0000, Platform::N3ds, TitleKind::Game),
    (0x0004_0002, Platform::N3ds, TitleKind::Demo),
    (0x0004_000C, Platform::N3ds, TitleKind::Dlc),
    (0x0004_000E, Platform::N3ds, TitleKind::Update),
    (0x0004_0010, Platform::N3ds, TitleKind::SystemApp),
    (0x0004_001B, Platform::N3ds, TitleKind::SystemData),
    (0x0004_0030, Platform::N3ds, TitleKind::SystemApplet),
    (0x0100_0000, Platform::Switch, TitleKind::Game),
    (0x0100_0002, Platform::Switch, TitleKind::Demo),
    (0x0100_000C, Platform::Switch, TitleKind::Dlc),
    (0x0100_000E, Platform::Switch, TitleKind::Update),
    (0x0100_0080, Platform::Switch, TitleKind::SystemApp),
    (0x0100_0081, Platform::Switch, TitleKind::SystemData),
    (0x0100_0082, Platform::Switch, TitleKind::SystemApplet),
];

fn prefix_info(high: u32) -> Option<(Platform, TitleKind)> {
    PREFIX_TABLE
        .iter()
        .find(|(prefix, _, _)| *prefix == high)
        .map(|(_, platform, kind)| (*platform, *kind))
}
