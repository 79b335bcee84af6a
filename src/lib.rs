//! Paginated GIF, sticker and clip feeds from Tenor and Klipy.
//!
//! [`provider`] adapters turn a request into a normalized [`feed::Page`];
//! [`feed::FeedOrchestrator`] accumulates pages, injects sponsored
//! placeholders, packs the display list into two columns and records
//! selections. [`config`] loads credentials and transport limits.

pub mod config;
pub mod feed;
pub mod provider;
