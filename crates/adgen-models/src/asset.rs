//! Visual asset models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Origin source recorded on the static placeholder asset.
pub const FALLBACK_SOURCE: &str = "fallback";

/// Kind of visual media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Image,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Video => "video",
            AssetKind::Image => "image",
        }
    }

    /// File extension used when the source URL does not carry one.
    pub fn default_extension(&self) -> &'static str {
        match self {
            AssetKind::Video => "mp4",
            AssetKind::Image => "jpg",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A downloaded (or placeholder) visual asset on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisualAsset {
    /// Local file path of the media
    pub source_path: PathBuf,
    pub kind: AssetKind,
    /// Creator credited by the stock provider
    pub origin_creator: String,
    /// Provider the asset came from (e.g. "pexels")
    pub origin_source: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl VisualAsset {
    pub fn new(
        source_path: impl Into<PathBuf>,
        kind: AssetKind,
        origin_creator: impl Into<String>,
        origin_source: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            kind,
            origin_creator: origin_creator.into(),
            origin_source: origin_source.into(),
            tags: BTreeSet::new(),
        }
    }

    /// Build the static placeholder image asset.
    pub fn placeholder(path: impl Into<PathBuf>) -> Self {
        Self::new(path, AssetKind::Image, "", FALLBACK_SOURCE)
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Whether this is the shared placeholder, which must never be deleted.
    pub fn is_placeholder(&self) -> bool {
        self.origin_source == FALLBACK_SOURCE
    }

    pub fn path(&self) -> &Path {
        &self.source_path
    }
}

/// Binding of an asset to a segment (or to the whole script).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetBinding {
    /// Segment index, or `None` when bound to the whole script
    pub segment_index: Option<usize>,
    pub asset: VisualAsset,
    /// True when the placeholder was substituted
    pub fallback: bool,
}
