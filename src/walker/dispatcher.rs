//! Turns a stream of `PathEnvelope`s into `CrawlJob`s on the broker, with
//! adaptive batch sizing.

use std::sync::mpsc::Receiver;
use tracing::debug;

use crate::broker::client::{JobBroker, QueueName};
use crate::model::{CrawlJob, PathEnvelope};

/// Path-prefix rewrite rules applied before a directory is batched.
pub fn replace_path(path: &str, rules: &[(String, String)]) -> String {
    for (from, to) in rules {
        if path.starts_with(from.as_str()) {
            return format!("{to}{}", &path[from.len()..]);
        }
    }
    path.to_string()
}

pub struct BatchDispatcherConfig {
    pub indexemptydirs: bool,
    pub replacepath: Vec<(String, String)>,
    pub batchsize: usize,
    pub adaptive: bool,
    pub startsize: usize,
    pub maxsize: usize,
    pub stepsize: usize,
    pub adaptivebatch_maxfiles: usize,
}

pub struct BatchDispatcher<'a> {
    config: BatchDispatcherConfig,
    broker: &'a dyn JobBroker,
    batch: Vec<PathEnvelope>,
    batch_files: usize,
    current_batchsize: usize,
}

impl<'a> BatchDispatcher<'a> {
    pub fn new(config: BatchDispatcherConfig, broker: &'a dyn JobBroker) -> Self {
        let current_batchsize = config.batchsize;
        Self {
            config,
            broker,
            batch: Vec::new(),
            batch_files: 0,
            current_batchsize,
        }
    }

    pub fn current_batchsize(&self) -> usize {
        self.current_batchsize
    }

    /// Drains `results` until the channel closes (the walker pool has
    /// terminated), flushing full batches to the broker as it goes.
    pub fn drain(&mut self, results: &Receiver<PathEnvelope>) -> anyhow::Result<usize> {
        let mut enqueued = 0;
        while let Ok(envelope) = results.recv() {
            if self.accept(envelope)? {
                enqueued += 1;
            }
        }
        if self.flush()? {
            enqueued += 1;
        }
        Ok(enqueued)
    }

    /// Accepts one envelope into the current batch, flushing if a threshold
    /// is reached. Returns whether a flush happened.
    fn accept(&mut self, envelope: PathEnvelope) -> anyhow::Result<bool> {
        if envelope.is_empty() && !self.config.indexemptydirs {
            return Ok(false);
        }

        let envelope = rewrite_envelope(envelope, &self.config.replacepath);
        self.batch_files += envelope.file_count();
        self.batch.push(envelope);

        let should_flush = self.batch.len() >= self.current_batchsize
            || (self.config.adaptive && self.batch_files >= self.config.adaptivebatch_maxfiles);

        if should_flush {
            self.flush()
        } else {
            Ok(false)
        }
    }

    fn flush(&mut self) -> anyhow::Result<bool> {
        if self.batch.is_empty() {
            return Ok(false);
        }
        let envelopes = std::mem::take(&mut self.batch);
        self.batch_files = 0;
        self.broker.enqueue_crawl(CrawlJob { envelopes })?;

        if self.config.adaptive {
            self.adjust_batchsize()?;
        }
        Ok(true)
    }

    /// After each flush: shrink toward `startsize` when the crawl queue is
    /// empty, grow toward `maxsize` when it isn't.
    fn adjust_batchsize(&mut self) -> anyhow::Result<()> {
        let depth = self.broker.queue_depth(QueueName::Crawl)?;
        if depth == 0 {
            self.current_batchsize = self
                .current_batchsize
                .saturating_sub(self.config.stepsize)
                .max(self.config.startsize);
        } else {
            self.current_batchsize =
                (self.current_batchsize + self.config.stepsize).min(self.config.maxsize);
        }
        debug!(new_batchsize = self.current_batchsize, queue_depth = depth, "adaptive batch adjusted");
        Ok(())
    }
}

fn rewrite_envelope(envelope: PathEnvelope, rules: &[(String, String)]) -> PathEnvelope {
    if rules.is_empty() {
        return envelope;
    }
    match envelope {
        PathEnvelope::Plain { path, dirs, files } => PathEnvelope::Plain {
            path: replace_path(&path, rules),
            dirs,
            files,
        },
        PathEnvelope::Chunk {
            path,
            dirs,
            files_chunk,
        } => PathEnvelope::Chunk {
            path: replace_path(&path, rules),
            dirs,
            files_chunk,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::testing::FakeJobBroker;

    fn plain(path: &str, n_files: usize) -> PathEnvelope {
        PathEnvelope::Plain {
            path: path.to_string(),
            dirs: vec![],
            files: (0..n_files).map(|i| format!("f{i}")).collect(),
        }
    }

    #[test]
    fn empty_directories_skipped_unless_indexemptydirs() {
        let broker = FakeJobBroker::new();
        let cfg = BatchDispatcherConfig {
            indexemptydirs: false,
            replacepath: vec![],
            batchsize: 10,
            adaptive: false,
            startsize: 10,
            maxsize: 10,
            stepsize: 1,
            adaptivebatch_maxfiles: usize::MAX,
        };
        let mut d = BatchDispatcher::new(cfg, &broker);
        d.accept(plain("/t/empty", 0)).unwrap();
        d.flush().unwrap();
        assert_eq!(broker.crawl_len(), 0);
    }

    #[test]
    fn flushes_at_batchsize() {
        let broker = FakeJobBroker::new();
        let cfg = BatchDispatcherConfig {
            indexemptydirs: true,
            replacepath: vec![],
            batchsize: 2,
            adaptive: false,
            startsize: 2,
            maxsize: 2,
            stepsize: 1,
            adaptivebatch_maxfiles: usize::MAX,
        };
        let mut d = BatchDispatcher::new(cfg, &broker);
        assert!(!d.accept(plain("/t/a", 1)).unwrap());
        assert!(d.accept(plain("/t/b", 1)).unwrap());
        assert_eq!(broker.crawl_len(), 1);
    }

    #[test]
    fn adaptive_batchsize_stays_in_bounds_and_grows_when_queue_busy() {
        let broker = FakeJobBroker::new();
        let cfg = BatchDispatcherConfig {
            indexemptydirs: true,
            replacepath: vec![],
            batchsize: 1,
            adaptive: true,
            startsize: 1,
            maxsize: 5,
            stepsize: 1,
            adaptivebatch_maxfiles: usize::MAX,
        };
        let mut d = BatchDispatcher::new(cfg, &broker);
        d.accept(plain("/t/a", 1)).unwrap();
        // broker still holds the job we just enqueued, so depth > 0 -> grow
        assert!(d.current_batchsize() >= 1 && d.current_batchsize() <= 5);
        broker.take_crawl_jobs();
        d.accept(plain("/t/b", 1)).unwrap();
        // queue now empty after drain -> shrink, clamped at startsize
        assert!(d.current_batchsize() >= 1);
    }

    #[test]
    fn replace_path_rewrites_prefix() {
        assert_eq!(
            replace_path("/mnt/data/proj", &[("/mnt/data".to_string(), "/export".to_string())]),
            "/export/proj"
        );
        assert_eq!(replace_path("/other", &[("/mnt".to_string(), "/x".to_string())]), "/other");
    }
}
