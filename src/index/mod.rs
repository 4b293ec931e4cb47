//! Search index client: index lifecycle, reindex deletion, doc scrolling,
//! rollup enqueueing, and bulk writes, all built on one `SearchIndexClient`
//! trait over the external engine's REST interface.

pub mod bulk;
pub mod client;
pub mod lifecycle;
pub mod reindex;
pub mod rollup;
pub mod scroll;
pub mod testing;

pub use client::{BulkAction, HttpSearchIndexClient, ScrollHit, SearchIndexClient};
