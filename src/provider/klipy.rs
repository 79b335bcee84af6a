//! Klipy adapter (page-number-cursor provider).
//!
//! Klipy responses do not have a single fixed shape. The item list is
//! located by [`Envelope`], and each item is decoded through a schema whose
//! fields are individually lenient:
//!
//! 1. The body itself is an array
//! 2. Otherwise, the first top-level property holding an array
//! 3. Otherwise, the first array property of a nested `data` object
//! 4. Otherwise, no items
//!
//! There is no authoritative total, so a page is assumed to be the last one
//! when it comes back short of [`PAGE_SIZE`].

use super::http::{get_bytes, validate_base_url, with_query, HttpSettings, ProviderError};
use super::schema::{lenient, non_empty, Dimensions, ItemId};
use super::{FeedRequest, MediaProvider, ProviderKind};
use crate::config::KlipyConfig;
use crate::feed::{ContentKind, FeedItem, Page};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.klipy.com/api/v1";

/// Items requested per page (`per_page`).
pub const PAGE_SIZE: usize = 50;

/// Size buckets scanned for GIFs and stickers, in priority order.
const SIZE_BUCKETS: [&str; 4] = ["sm", "md", "xs", "hd"];
/// Variant types scanned inside each size bucket, in priority order.
const STILL_VARIANTS: [&str; 5] = ["gif", "webp", "mp4", "webm", "jpg"];
/// Clip media keys under `file` (and `file_meta`), in priority order.
const CLIP_VARIANTS: [&str; 3] = ["gif", "webp", "mp4"];

// ============================================================================
// Response Schema
// ============================================================================

/// Top-level response shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    Bare(Vec<Value>),
    Object(Map<String, Value>),
    Scalar(Value),
}

impl Envelope {
    /// Locates the raw item list using the fixed fallback order.
    fn into_items(self) -> Vec<Value> {
        match self {
            Envelope::Bare(items) => items,
            Envelope::Object(mut map) => {
                if map.values().any(Value::is_array) {
                    return first_array(map).unwrap_or_default();
                }
                match map.remove("data") {
                    Some(Value::Object(data)) => first_array(data).unwrap_or_default(),
                    _ => Vec::new(),
                }
            }
            Envelope::Scalar(_) => Vec::new(),
        }
    }
}

/// First property (in document order) whose value is an array.
fn first_array(map: Map<String, Value>) -> Option<Vec<Value>> {
    map.into_iter().find_map(|(_, value)| match value {
        Value::Array(items) => Some(items),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<ItemId>,
    #[serde(default, deserialize_with = "lenient")]
    slug: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    file: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient")]
    file_meta: Option<Map<String, Value>>,
}

/// One media variant inside a GIF/sticker size bucket.
#[derive(Debug, Deserialize)]
struct StillVariant {
    #[serde(default, deserialize_with = "lenient")]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    width: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    height: Option<f64>,
}

impl RawItem {
    /// `id` (string or number), then `slug`, then the media URL.
    fn resolve_id(&mut self, media_url: &str) -> String {
        self.id
            .take()
            .and_then(ItemId::into_non_empty)
            .or_else(|| non_empty(self.slug.take()))
            .unwrap_or_else(|| media_url.to_string())
    }

    /// Clip media: first of `gif`, `webp`, `mp4` under `file`, with the
    /// matching entry of `file_meta` supplying dimensions.
    fn clip_media(&self) -> Option<(String, f64, f64)> {
        let file = self.file.as_ref()?;
        let (variant, url) = CLIP_VARIANTS.iter().find_map(|variant| {
            file.get(*variant)
                .and_then(Value::as_str)
                .filter(|url| !url.is_empty())
                .map(|url| (*variant, url.to_string()))
        })?;

        let dims = self
            .file_meta
            .as_ref()
            .and_then(|meta| meta.get(variant))
            .and_then(|meta| Dimensions::deserialize(meta).ok())
            .unwrap_or_default();

        Some((
            url,
            dims.width.unwrap_or(1.0),
            dims.height.unwrap_or(1.0),
        ))
    }

    /// GIF/sticker media from the first bucket whose first string-URL
    /// variant is non-empty.
    ///
    /// Within a bucket the first variant carrying a string `url` decides:
    /// an empty one abandons that bucket rather than trying later variants.
    /// The winning variant's own dimensions are used only when both are
    /// positive; otherwise the item is 1x1.
    fn still_media(&self) -> Option<(String, f64, f64)> {
        let file = self.file.as_ref()?;
        SIZE_BUCKETS
            .iter()
            .filter_map(|bucket| file.get(*bucket).and_then(Value::as_object))
            .find_map(|bucket| {
                let variant = STILL_VARIANTS.iter().find_map(|variant| {
                    StillVariant::deserialize(bucket.get(*variant)?)
                        .ok()
                        .filter(|variant| variant.url.is_some())
                })?;
                let url = non_empty(variant.url)?;
                let dims = Dimensions {
                    width: variant.width,
                    height: variant.height,
                };
                let (width, height) = dims.both_positive().unwrap_or((1.0, 1.0));
                Some((url, width, height))
            })
    }
}

fn normalize_item(raw: Value, kind: ContentKind) -> Option<FeedItem> {
    let mut item = RawItem::deserialize(&raw).ok()?;
    let (url, width, height) = match kind {
        ContentKind::Clip => item.clip_media()?,
        ContentKind::Gif | ContentKind::Sticker => item.still_media()?,
    };
    let id = item.resolve_id(&url);
    Some(FeedItem::media(id, url, width, height))
}

/// Parses a Klipy response body for the given kind and page number.
pub fn parse_page(bytes: &[u8], kind: ContentKind, page: u32) -> Result<Page, ProviderError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    let raw_items = envelope.into_items();
    let total = raw_items.len();

    let items: Vec<FeedItem> = raw_items
        .into_iter()
        .filter_map(|raw| normalize_item(raw, kind))
        .collect();

    let skipped = total - items.len();
    if skipped > 0 {
        tracing::debug!(
            provider = "klipy",
            kind = %kind,
            skipped = skipped,
            "Items without a usable media URL skipped"
        );
    }

    let next_cursor = (items.len() == PAGE_SIZE).then(|| page.saturating_add(1).to_string());
    Ok(Page { items, next_cursor })
}

/// Page number encoded in a cursor; 1 when absent or unparseable.
///
/// Leading digits are honoured (`"3abc"` is page 3) and zero maps to 1.
pub fn page_number(cursor: Option<&str>) -> u32 {
    cursor
        .map(|cursor| {
            let cursor = cursor.trim_start();
            let digits_end = cursor
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(cursor.len());
            &cursor[..digits_end]
        })
        .and_then(|digits| digits.parse::<u32>().ok())
        .filter(|page| *page > 0)
        .unwrap_or(1)
}

/// Endpoint path segment for a kind, search or trending.
fn segment(kind: ContentKind, search: bool) -> &'static str {
    match (kind, search) {
        (ContentKind::Gif, true) => "gifs/search",
        (ContentKind::Gif, false) => "gifs/trending",
        (ContentKind::Sticker, true) => "stickers/search",
        (ContentKind::Sticker, false) => "stickers/trending",
        (ContentKind::Clip, true) => "clips/search",
        (ContentKind::Clip, false) => "clips/trending",
    }
}

// ============================================================================
// Adapter
// ============================================================================

pub struct KlipyProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    settings: HttpSettings,
}

impl KlipyProvider {
    pub fn new(
        client: reqwest::Client,
        config: &KlipyConfig,
        settings: HttpSettings,
    ) -> Result<Self, ProviderError> {
        let base_url = validate_base_url(&config.base_url)?;
        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            api_key: config
                .api_key
                .as_deref()
                .filter(|key| !key.is_empty())
                .map(SecretString::from),
            settings,
        })
    }

    /// Builds the request URL, or `None` when no API key is configured.
    pub fn request_url(&self, request: &FeedRequest) -> Result<Option<Url>, ProviderError> {
        let Some(api_key) = &self.api_key else {
            return Ok(None);
        };

        let endpoint = format!(
            "{}/{}/{}",
            self.base_url,
            api_key.expose_secret(),
            segment(request.kind, request.has_query())
        );

        let mut params: Vec<(&str, String)> = vec![
            ("page", page_number(request.cursor.as_deref()).to_string()),
            ("per_page", PAGE_SIZE.to_string()),
        ];
        if request.has_query() {
            let query = request.trimmed_query().to_string();
            params.push(("q", query.clone()));
            params.push(("query", query));
        }

        with_query(&endpoint, &params).map(Some)
    }
}

#[async_trait]
impl MediaProvider for KlipyProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Klipy
    }

    async fn fetch_page(&self, request: &FeedRequest) -> Result<Page, ProviderError> {
        let Some(url) = self.request_url(request)? else {
            tracing::debug!("Klipy API key not configured, returning empty page");
            return Ok(Page::empty());
        };

        // The API key is part of the path, so only the segment is logged
        let label = segment(request.kind, request.has_query());
        let page = page_number(request.cursor.as_deref());
        tracing::debug!(request = label, page = page, "Fetching provider page");

        let bytes = get_bytes(&self.client, &url, &self.settings, label).await?;
        parse_page(&bytes, request.kind, page)
    }
}
