use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Content Kind
// ============================================================================

/// Media category selected by the user.
///
/// Changes both the request parameters sent to a provider and the branch
/// used to normalize its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Gif,
    Sticker,
    Clip,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Gif => "gif",
            ContentKind::Sticker => "sticker",
            ContentKind::Clip => "clip",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gif" | "gifs" => Ok(ContentKind::Gif),
            "sticker" | "stickers" => Ok(ContentKind::Sticker),
            "clip" | "clips" => Ok(ContentKind::Clip),
            other => Err(format!("unknown content kind: {other}")),
        }
    }
}

// ============================================================================
// Feed Item
// ============================================================================

/// A normalized media entry in the feed.
///
/// `width` and `height` are always positive: adapters substitute 1 when the
/// provider omits a dimension or reports a non-positive one. Sponsored
/// placeholders (`is_ad`) carry an empty URL and only ever appear in the
/// decorated display list, never in the accumulated page list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    pub id: String,
    pub url: String,
    pub width: f64,
    pub height: f64,
    pub is_ad: bool,
}

impl FeedItem {
    /// Builds a media item, clamping invalid dimensions to 1.
    pub fn media(id: impl Into<String>, url: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            width: positive_or_one(width),
            height: positive_or_one(height),
            is_ad: false,
        }
    }

    /// Builds a display-only sponsored placeholder.
    pub fn sponsored(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: String::new(),
            width: 1.0,
            height: 1.0,
            is_ad: true,
        }
    }

    /// Height-to-width ratio used for column balancing.
    pub fn layout_ratio(&self) -> f64 {
        if self.width > 0.0 && self.height > 0.0 {
            self.height / self.width
        } else {
            1.0
        }
    }

    /// Width-to-height ratio recorded when the item is selected.
    pub fn aspect_ratio(&self) -> f64 {
        if self.width > 0.0 && self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

/// Returns `value` when it is a finite positive number, otherwise 1.
pub(crate) fn positive_or_one(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        1.0
    }
}

// ============================================================================
// Page
// ============================================================================

/// One page of normalized items returned by a provider.
///
/// `next_cursor` is `None` once the provider has no further pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<FeedItem>,
    pub next_cursor: Option<String>,
}

impl Page {
    /// An exhausted, empty page.
    pub fn empty() -> Self {
        Self::default()
    }
}

// ============================================================================
// Selected Item
// ============================================================================

/// An item the user picked from the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedItem {
    /// `{source id}-{kind}-{selection count at pick time}`, unique per pick.
    pub id: String,
    pub kind: ContentKind,
    pub url: String,
    pub aspect_ratio: f64,
}
