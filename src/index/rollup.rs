//! After the crawl queue drains, scrolls directory docs deepest-first and
//! enqueues `RollupJob`s with the same adaptive batching algorithm the
//! crawl dispatcher uses.

use anyhow::Result;
use tracing::info;

use crate::broker::client::{JobBroker, QueueName};
use crate::index::client::SearchIndexClient;
use crate::index::scroll::{scroll_rollup_input, ScrollOptions};
use crate::model::{RollupEntry, RollupJob};

pub struct RollupDriverConfig {
    pub scroll_size: usize,
    pub batchsize: usize,
    pub adaptive: bool,
    pub startsize: usize,
    pub maxsize: usize,
    pub stepsize: usize,
}

/// Scrolls directory docs and enqueues rollup jobs. Returns the number of
/// rollup jobs enqueued.
pub fn run(
    index_client: &dyn SearchIndexClient,
    broker: &dyn JobBroker,
    index_name: &str,
    opts: &ScrollOptions,
    config: RollupDriverConfig,
) -> Result<usize> {
    let rows = scroll_rollup_input(index_client, index_name, opts, config.scroll_size)?;
    info!(count = rows.len(), "rollup driver scrolled directory docs");

    let mut batchsize = config.batchsize;
    let mut batch: Vec<RollupEntry> = Vec::with_capacity(batchsize);
    let mut jobs_enqueued = 0;

    for row in rows {
        batch.push(RollupEntry {
            doc_id: row.id,
            full_path: row.full_path,
            mtime: row.mtime,
            atime: row.atime,
            ctime: row.ctime,
        });

        if batch.len() >= batchsize {
            flush(broker, &mut batch, &mut batchsize, &config)?;
            jobs_enqueued += 1;
        }
    }
    if !batch.is_empty() {
        flush(broker, &mut batch, &mut batchsize, &config)?;
        jobs_enqueued += 1;
    }

    Ok(jobs_enqueued)
}

fn flush(
    broker: &dyn JobBroker,
    batch: &mut Vec<RollupEntry>,
    batchsize: &mut usize,
    config: &RollupDriverConfig,
) -> Result<()> {
    let entries = std::mem::take(batch);
    broker.enqueue_rollup(RollupJob { entries })?;

    if config.adaptive {
        let depth = broker.queue_depth(QueueName::Rollup)?;
        *batchsize = if depth == 0 {
            batchsize.saturating_sub(config.stepsize).max(config.startsize)
        } else {
            (*batchsize + config.stepsize).min(config.maxsize)
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::testing::FakeJobBroker;
    use crate::index::client::BulkAction;
    use crate::index::testing::FakeSearchIndex;
    use serde_json::json;

    #[test]
    fn enqueues_rollup_jobs_from_scrolled_directories() {
        let index = FakeSearchIndex::new();
        index.create_index("diskover-test", json!({}), 1, 1).unwrap();
        index
            .bulk(
                "diskover-test",
                vec![BulkAction::Index {
                    id: "d1".to_string(),
                    doc: json!({
                        "doctype": "directory",
                        "full_path": "/t/a",
                        "path_parent": "/t",
                    }),
                }],
            )
            .unwrap();

        let broker = FakeJobBroker::new();
        let opts = ScrollOptions::default();
        let config = RollupDriverConfig {
            scroll_size: 100,
            batchsize: 50,
            adaptive: false,
            startsize: 10,
            maxsize: 100,
            stepsize: 10,
        };

        let jobs = run(&index, &broker, "diskover-test", &opts, config).unwrap();
        assert_eq!(jobs, 1);
        assert_eq!(broker.rollup_len(), 1);
    }

    #[test]
    fn rollup_entries_carry_distinct_mtime_atime_ctime() {
        let index = FakeSearchIndex::new();
        index.create_index("diskover-test", json!({}), 1, 1).unwrap();
        index
            .bulk(
                "diskover-test",
                vec![BulkAction::Index {
                    id: "d1".to_string(),
                    doc: json!({
                        "doctype": "directory",
                        "full_path": "/t/a",
                        "path_parent": "/t",
                        "last_modified": "2024-01-03T00:00:00+00:00",
                        "last_access": "2024-01-02T00:00:00+00:00",
                        "last_change": "2024-01-01T00:00:00+00:00",
                    }),
                }],
            )
            .unwrap();

        let broker = FakeJobBroker::new();
        let opts = ScrollOptions::default();
        let config = RollupDriverConfig {
            scroll_size: 100,
            batchsize: 50,
            adaptive: false,
            startsize: 10,
            maxsize: 100,
            stepsize: 10,
        };

        run(&index, &broker, "diskover-test", &opts, config).unwrap();
        let jobs = broker.take_rollup_jobs();
        let entry = &jobs[0].entries[0];
        assert!(entry.mtime > entry.atime);
        assert!(entry.atime > entry.ctime);
        assert!(entry.ctime > 0.0);
    }
}
