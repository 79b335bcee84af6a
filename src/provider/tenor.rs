//! Tenor adapter (token-cursor provider).
//!
//! Trending listings come from `/featured`, searches from `/search`. The
//! response carries a continuation token in `next` which is passed back as
//! `pos` to fetch the following page.

use super::http::{get_bytes, validate_base_url, with_query, HttpSettings, ProviderError};
use super::schema::{lenient, ItemId};
use super::{FeedRequest, MediaProvider, ProviderKind};
use crate::config::TenorConfig;
use crate::feed::{ContentKind, FeedItem, Page};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://tenor.googleapis.com/v2";

/// Media variants requested from the API, also the preview whitelist.
const MEDIA_FILTER: &str = "gif,tinygif,mp4,tinymp4";
const CONTENT_FILTER: &str = "medium";
const STICKER_SEARCH_FILTER: &str = "sticker,-static";
const CLIP_ASPECT_RANGE: &str = "wide";
/// Sent as `q` for clip listings, which have no trending endpoint of their own.
const CLIP_FALLBACK_QUERY: &str = "memes";

// ============================================================================
// Response Schema
// ============================================================================

/// Every field is lenient: a value of the wrong JSON type is treated as
/// absent so one malformed result never costs the rest of the page.
#[derive(Debug, Deserialize)]
struct TenorResponse {
    #[serde(default, deserialize_with = "lenient")]
    results: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient")]
    next: Option<ItemId>,
}

#[derive(Debug, Deserialize)]
struct TenorResult {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<ItemId>,
    #[serde(default, deserialize_with = "lenient")]
    media_formats: Option<MediaFormats>,
}

/// Only the formats the adapter can preview; anything else is ignored.
#[derive(Debug, Default, Deserialize)]
struct MediaFormats {
    #[serde(default, deserialize_with = "lenient")]
    tinygif: Option<MediaFormat>,
    #[serde(default, deserialize_with = "lenient")]
    gif: Option<MediaFormat>,
    #[serde(default, deserialize_with = "lenient")]
    tinymp4: Option<MediaFormat>,
    #[serde(default, deserialize_with = "lenient")]
    mp4: Option<MediaFormat>,
}

#[derive(Debug, Deserialize)]
struct MediaFormat {
    #[serde(default, deserialize_with = "lenient")]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    dims: Option<Vec<Value>>,
}

impl MediaFormats {
    /// First present format in preview priority order.
    fn preview(self) -> Option<MediaFormat> {
        self.tinygif.or(self.gif).or(self.tinymp4).or(self.mp4)
    }
}

impl MediaFormat {
    /// Reads one side from a `[width, height]` pair, defaulting to 1.
    ///
    /// Each side is checked on its own: a non-numeric or non-positive entry
    /// only defaults that side.
    fn dimension(&self, index: usize) -> f64 {
        match self.dims.as_deref() {
            Some(dims) if dims.len() == 2 => dims[index]
                .as_f64()
                .filter(|side| *side > 0.0)
                .unwrap_or(1.0),
            _ => 1.0,
        }
    }
}

/// Parses a Tenor response body into a page.
///
/// Results whose preview format is missing or has an empty URL are dropped,
/// as are entries of `results` that are not objects. Only a body that is not
/// valid JSON, or whose top level is a scalar, fails.
pub fn parse_page(bytes: &[u8]) -> Result<Page, ProviderError> {
    let response: TenorResponse = serde_json::from_slice(bytes)?;
    let results = response.results.unwrap_or_default();
    let total = results.len();

    let items: Vec<FeedItem> = results
        .iter()
        .filter_map(|raw| TenorResult::deserialize(raw).ok())
        .filter_map(normalize_result)
        .collect();

    let skipped = total - items.len();
    if skipped > 0 {
        tracing::debug!(
            provider = "tenor",
            skipped = skipped,
            "Results without a usable preview skipped"
        );
    }

    Ok(Page {
        items,
        next_cursor: response.next.and_then(ItemId::into_non_empty),
    })
}

fn normalize_result(result: TenorResult) -> Option<FeedItem> {
    let preview = result.media_formats?.preview()?;
    let url = preview.url.clone().filter(|url| !url.is_empty())?;
    let id = result
        .id
        .and_then(ItemId::into_non_empty)
        .unwrap_or_else(|| url.clone());

    Some(FeedItem::media(
        id,
        url,
        preview.dimension(0),
        preview.dimension(1),
    ))
}

// ============================================================================
// Adapter
// ============================================================================

pub struct TenorProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    client_key: String,
    country: String,
    locale: String,
    limit: u32,
    settings: HttpSettings,
}

impl TenorProvider {
    pub fn new(
        client: reqwest::Client,
        config: &TenorConfig,
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
            client_key: config.client_key.clone(),
            country: config.country.clone(),
            locale: config.locale.clone(),
            limit: config.limit,
            settings,
        })
    }

    /// Builds the request URL, or `None` when no API key is configured.
    pub fn request_url(&self, request: &FeedRequest) -> Result<Option<Url>, ProviderError> {
        let Some(api_key) = &self.api_key else {
            return Ok(None);
        };

        let query = request.trimmed_query();
        let endpoint = if request.has_query() {
            format!("{}/search", self.base_url)
        } else {
            format!("{}/featured", self.base_url)
        };

        let mut params: Vec<(&str, String)> = vec![
            ("key", api_key.expose_secret().to_string()),
            ("client_key", self.client_key.clone()),
            ("country", self.country.clone()),
            ("locale", self.locale.clone()),
            ("contentfilter", CONTENT_FILTER.to_string()),
            ("media_filter", MEDIA_FILTER.to_string()),
            ("limit", self.limit.to_string()),
        ];

        if request.has_query() {
            params.push(("q", query.to_string()));
        } else if request.kind == ContentKind::Clip {
            params.push(("q", CLIP_FALLBACK_QUERY.to_string()));
        }

        match request.kind {
            ContentKind::Sticker => params.push(("searchfilter", STICKER_SEARCH_FILTER.to_string())),
            ContentKind::Clip => params.push(("ar_range", CLIP_ASPECT_RANGE.to_string())),
            ContentKind::Gif => {}
        }

        if let Some(cursor) = &request.cursor {
            params.push(("pos", cursor.clone()));
        }

        with_query(&endpoint, &params).map(Some)
    }
}

#[async_trait]
impl MediaProvider for TenorProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Tenor
    }

    async fn fetch_page(&self, request: &FeedRequest) -> Result<Page, ProviderError> {
        let Some(url) = self.request_url(request)? else {
            tracing::debug!("Tenor API key not configured, returning empty page");
            return Ok(Page::empty());
        };

        let label = if request.has_query() {
            "tenor/search"
        } else {
            "tenor/featured"
        };
        tracing::debug!(
            request = label,
            kind = %request.kind,
            has_cursor = request.cursor.is_some(),
            "Fetching provider page"
        );

        let bytes = get_bytes(&self.client, &url, &self.settings, label).await?;
        parse_page(&bytes)
    }
}
