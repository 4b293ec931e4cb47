//! Bulk writer: `bulk(docs)` with configured chunk size, plus
//! retry-on-version-conflict for split-file updates.

use anyhow::Result;
use tracing::warn;

use crate::index::client::{BulkAction, SearchIndexClient};

pub struct BulkWriterConfig {
    pub chunk_size: usize,
    pub splitfiles: bool,
    pub wait_for_yellow: bool,
}

pub struct BulkWriter<'a> {
    client: &'a dyn SearchIndexClient,
    config: BulkWriterConfig,
}

impl<'a> BulkWriter<'a> {
    pub fn new(client: &'a dyn SearchIndexClient, config: BulkWriterConfig) -> Self {
        Self { client, config }
    }

    /// Writes `docs` in chunks of `chunk_size`. When `splitfiles` is active,
    /// a version conflict on a chunk is retried with only the `update`
    /// entries from that chunk.
    pub fn bulk(&self, index: &str, docs: Vec<BulkAction>) -> Result<()> {
        if self.config.wait_for_yellow {
            self.client.wait_for_health("yellow")?;
        }

        for chunk in docs.chunks(self.config.chunk_size.max(1)) {
            let result = self.client.bulk(index, chunk.to_vec())?;
            if !result.conflicts.is_empty() {
                if self.config.splitfiles {
                    let updates_only: Vec<BulkAction> =
                        result.conflicts.into_iter().filter(|a| a.is_update()).collect();
                    if !updates_only.is_empty() {
                        warn!(
                            index,
                            count = updates_only.len(),
                            "bulk version conflict, retrying update entries only"
                        );
                        self.client.bulk(index, updates_only)?;
                    }
                } else {
                    warn!(index, count = result.conflicts.len(), "bulk version conflict, not retrying (splitfiles disabled)");
                }
            }
        }
        Ok(())
    }
}
