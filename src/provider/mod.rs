//! Provider adapters that turn a [`FeedRequest`] into a normalized [`Page`].
//!
//! Each supported content provider has its own request encoding, cursor
//! format and JSON response shape. Adapters hide all of that behind the
//! [`MediaProvider`] trait:
//!
//! - [`tenor`] - token-cursor provider with a fixed response schema
//! - [`klipy`] - page-number-cursor provider with a loosely shaped response
//! - [`http`] - shared transport (timeouts, retries, body size limit)
//!
//! Missing credentials are not an error: an adapter without an API key
//! returns an empty, exhausted page without touching the network.

mod http;
pub mod klipy;
mod schema;
pub mod tenor;

pub use http::{build_client, HttpSettings, ProviderError};
pub use klipy::KlipyProvider;
pub use tenor::TenorProvider;

use crate::config::Config;
use crate::feed::{ContentKind, Page};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Identifies a content provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProviderKind {
    /// Token cursor, fixed schema, no sponsored placements.
    #[default]
    Tenor,
    /// Page-number cursor, probed schema, sponsored placements in the feed.
    Klipy,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Tenor => "tenor",
            ProviderKind::Klipy => "klipy",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tenor" => Ok(ProviderKind::Tenor),
            "klipy" => Ok(ProviderKind::Klipy),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Parameters for a single page request.
///
/// `cursor` is provider-private: Tenor issues opaque position tokens, Klipy
/// uses a page number encoded as a string. `None` requests the first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    pub provider: ProviderKind,
    pub kind: ContentKind,
    pub query: String,
    pub cursor: Option<String>,
}

impl FeedRequest {
    /// The query with surrounding whitespace removed.
    pub fn trimmed_query(&self) -> &str {
        self.query.trim()
    }

    /// True when the request is a search rather than a trending listing.
    pub fn has_query(&self) -> bool {
        !self.trimmed_query().is_empty()
    }
}

/// A source of paginated media.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Fetches and normalizes one page.
    ///
    /// Items with no usable media URL are dropped rather than reported.
    async fn fetch_page(&self, request: &FeedRequest) -> Result<Page, ProviderError>;
}

/// The adapters available to the feed, one per [`ProviderKind`].
#[derive(Clone)]
pub struct ProviderRegistry {
    tenor: Arc<dyn MediaProvider>,
    klipy: Arc<dyn MediaProvider>,
}

impl ProviderRegistry {
    pub fn new(tenor: Arc<dyn MediaProvider>, klipy: Arc<dyn MediaProvider>) -> Self {
        Self { tenor, klipy }
    }

    /// Builds both HTTP adapters from configuration, sharing one client.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Self, ProviderError> {
        let settings = config.http.settings();
        let tenor = TenorProvider::new(client.clone(), &config.tenor, settings.clone())?;
        let klipy = KlipyProvider::new(client, &config.klipy, settings)?;
        Ok(Self::new(Arc::new(tenor), Arc::new(klipy)))
    }

    pub fn get(&self, kind: ProviderKind) -> Arc<dyn MediaProvider> {
        match kind {
            ProviderKind::Tenor => Arc::clone(&self.tenor),
            ProviderKind::Klipy => Arc::clone(&self.klipy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_round_trip_through_str() {
        for kind in [ProviderKind::Tenor, ProviderKind::Klipy] {
            assert_eq!(kind.as_str().parse::<ProviderKind>(), Ok(kind));
        }
        assert!("giphy".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_has_query_ignores_whitespace() {
        let mut request = FeedRequest {
            provider: ProviderKind::Tenor,
            kind: ContentKind::Gif,
            query: "   ".to_string(),
            cursor: None,
        };
        assert!(!request.has_query());

        request.query = "  cats ".to_string();
        assert!(request.has_query());
        assert_eq!(request.trimmed_query(), "cats");
    }
}
