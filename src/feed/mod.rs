//! Feed state, presentation transforms and orchestration.
//!
//! - [`types`] - normalized items, pages and selections
//! - [`pagination`] - accumulated items plus the load state machine
//! - [`ads`] - sponsored placeholder injection for the display list
//! - [`masonry`] - greedy two-column packing
//! - [`selection`] - most-recent-first log of picked items
//! - [`orchestrator`] - wires parameter changes to provider fetches
//!
//! Only the orchestrator performs I/O. Everything else is a pure transform
//! over the accumulated items and can be exercised without a runtime.

pub mod ads;
pub mod masonry;
pub mod orchestrator;
pub mod pagination;
pub mod selection;
pub mod types;

pub use ads::{decorate, inject_ads, AD_FREQUENCY};
pub use masonry::{Column, MasonryLayout};
pub use orchestrator::{FeedEvent, FeedOrchestrator, LoadMode};
pub use pagination::FeedState;
pub use selection::SelectionLog;
pub use types::{ContentKind, FeedItem, Page, SelectedItem};
