//! `JobBroker` trait and its HTTP-backed implementation. The broker itself
//! is an external collaborator; this models only the client-facing
//! interface the dispatcher needs: three named queues, enqueue, and the
//! busy/queue-depth checks the progress monitor polls.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::model::{CrawlJob, RollupJob};

/// One of the three named queues on the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueName {
    General,
    Crawl,
    Rollup,
}

impl QueueName {
    fn as_str(&self) -> &'static str {
        match self {
            QueueName::General => "general",
            QueueName::Crawl => "crawl",
            QueueName::Rollup => "rollup",
        }
    }
}

/// Producer-only interface to the broker. The dispatcher never reads job
/// results back; all worker output lands in the search index instead.
pub trait JobBroker: Send + Sync {
    fn enqueue_crawl(&self, job: CrawlJob) -> Result<()>;
    fn enqueue_rollup(&self, job: RollupJob) -> Result<()>;
    fn queue_depth(&self, queue: QueueName) -> Result<usize>;
    fn workers_busy(&self) -> Result<bool>;
}

/// Talks to a generic HTTP queue-admin endpoint, mirroring the way the
/// search index client talks to its own external service.
pub struct HttpJobBroker {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpJobBroker {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl JobBroker for HttpJobBroker {
    fn enqueue_crawl(&self, job: CrawlJob) -> Result<()> {
        self.client
            .post(self.url("queues/crawl/enqueue"))
            .json(&job)
            .send()
            .context("broker unreachable enqueuing crawl job")?
            .error_for_status()
            .context("broker rejected crawl job")?;
        Ok(())
    }

    fn enqueue_rollup(&self, job: RollupJob) -> Result<()> {
        self.client
            .post(self.url("queues/rollup/enqueue"))
            .json(&job)
            .send()
            .context("broker unreachable enqueuing rollup job")?
            .error_for_status()
            .context("broker rejected rollup job")?;
        Ok(())
    }

    fn queue_depth(&self, queue: QueueName) -> Result<usize> {
        #[derive(serde::Deserialize)]
        struct DepthResponse {
            depth: usize,
        }
        let resp: DepthResponse = self
            .client
            .get(self.url(&format!("queues/{}/depth", queue.as_str())))
            .send()
            .context("broker unreachable checking queue depth")?
            .error_for_status()?
            .json()?;
        Ok(resp.depth)
    }

    fn workers_busy(&self) -> Result<bool> {
        #[derive(serde::Deserialize)]
        struct BusyResponse {
            busy: bool,
        }
        let resp: BusyResponse = self
            .client
            .get(self.url("workers/busy"))
            .send()
            .context("broker unreachable checking worker busy-state")?
            .error_for_status()?
            .json()?;
        Ok(resp.busy)
    }
}
