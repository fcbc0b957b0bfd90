//! Media locators and opened assets.
//!
//! An [`Asset`] is the result of asking a Media Engine to open a
//! [`Locator`]. Its probed properties never change after construction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Where a media resource lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// A file on the local filesystem.
    File(PathBuf),
    /// A resource shipped with the application, resolved against the
    /// configured resources directory.
    Resource { name: String, extension: String },
}

impl Locator {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn resource(name: impl Into<String>, extension: impl Into<String>) -> Self {
        Self::Resource {
            name: name.into(),
            extension: extension.into(),
        }
    }

    /// Resolve to a filesystem path.
    pub fn resolve(&self, resources_dir: &Path) -> PathBuf {
        match self {
            Self::File(path) => path.clone(),
            Self::Resource { name, extension } => {
                resources_dir.join(format!("{name}.{extension}"))
            }
        }
    }

    /// File stem used when naming derived outputs.
    pub fn stem(&self) -> String {
        match self {
            Self::File(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "asset".to_string()),
            Self::Resource { name, .. } => name.clone(),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Resource { name, extension } => write!(f, "resource:{name}.{extension}"),
        }
    }
}

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalSize {
    pub width: u32,
    pub height: u32,
}

impl NaturalSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for NaturalSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Properties probed when an asset is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Total duration in seconds.
    pub duration_secs: f64,

    /// Size of the first video track.
    pub natural_size: NaturalSize,

    /// Whether the engine can play this asset back.
    pub playable: bool,

    /// Whether the asset carries an audio track.
    #[serde(default)]
    pub has_audio: bool,
}

/// An opened media resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    locator: Locator,
    info: AssetInfo,
}

impl Asset {
    pub fn new(locator: Locator, info: AssetInfo) -> Self {
        Self { locator, info }
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn info(&self) -> &AssetInfo {
        &self.info
    }

    pub fn duration(&self) -> f64 {
        self.info.duration_secs
    }

    pub fn natural_size(&self) -> NaturalSize {
        self.info.natural_size
    }

    pub fn is_playable(&self) -> bool {
        self.info.playable
    }
}
