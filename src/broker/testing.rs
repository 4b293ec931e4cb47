//! In-memory broker fake used by the test suite, standing in for a live
//! Redis/RQ-style broker with a real in-process implementation instead of
//! mocking at the HTTP layer.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::client::{JobBroker, QueueName};
use crate::model::{CrawlJob, RollupJob};

#[derive(Default)]
pub struct FakeJobBroker {
    crawl_queue: Mutex<Vec<CrawlJob>>,
    rollup_queue: Mutex<Vec<RollupJob>>,
    /// Jobs that have been popped from a queue but whose worker hasn't
    /// finished yet, letting tests simulate `workers_busy` independently of
    /// queue depth.
    in_flight: Mutex<usize>,
}

impl FakeJobBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain all enqueued crawl jobs, as a worker pool consuming the queue
    /// would, marking them in-flight until `complete_in_flight` is called.
    pub fn take_crawl_jobs(&self) -> Vec<CrawlJob> {
        let mut q = self.crawl_queue.lock().unwrap();
        let jobs = std::mem::take(&mut *q);
        *self.in_flight.lock().unwrap() += jobs.len();
        jobs
    }

    pub fn take_rollup_jobs(&self) -> Vec<RollupJob> {
        let mut q = self.rollup_queue.lock().unwrap();
        let jobs = std::mem::take(&mut *q);
        *self.in_flight.lock().unwrap() += jobs.len();
        jobs
    }

    pub fn complete_in_flight(&self, n: usize) {
        let mut f = self.in_flight.lock().unwrap();
        *f = f.saturating_sub(n);
    }

    pub fn crawl_len(&self) -> usize {
        self.crawl_queue.lock().unwrap().len()
    }

    pub fn rollup_len(&self) -> usize {
        self.rollup_queue.lock().unwrap().len()
    }
}

/// Jobs drained from a `FakeJobBroker` by `spawn_auto_drain`, kept around so
/// a test can inspect what the simulated worker pool actually saw.
#[derive(Default)]
pub struct DrainedJobs {
    pub crawl: Mutex<Vec<CrawlJob>>,
    pub rollup: Mutex<Vec<RollupJob>>,
}

/// Spawns a background thread that stands in for the worker pool: it
/// drains both queues as soon as jobs land and immediately marks them
/// complete, so tests calling `wait_for_drain` against a `FakeJobBroker`
/// don't block forever waiting on workers that don't exist. Stop it with
/// the returned flag before joining the handle; drained jobs accumulate in
/// the returned `DrainedJobs` for later inspection.
pub fn spawn_auto_drain(broker: Arc<FakeJobBroker>) -> (Arc<AtomicBool>, Arc<DrainedJobs>, JoinHandle<()>) {
    let stop = Arc::new(AtomicBool::new(false));
    let drained = Arc::new(DrainedJobs::default());
    let stop_handle = stop.clone();
    let drained_handle = drained.clone();
    let handle = std::thread::spawn(move || {
        while !stop_handle.load(Ordering::SeqCst) {
            let crawl = broker.take_crawl_jobs();
            broker.complete_in_flight(crawl.len());
            if !crawl.is_empty() {
                drained_handle.crawl.lock().unwrap().extend(crawl);
            }
            let rollup = broker.take_rollup_jobs();
            broker.complete_in_flight(rollup.len());
            if !rollup.is_empty() {
                drained_handle.rollup.lock().unwrap().extend(rollup);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    });
    (stop, drained, handle)
}

impl JobBroker for FakeJobBroker {
    fn enqueue_crawl(&self, job: CrawlJob) -> Result<()> {
        self.crawl_queue.lock().unwrap().push(job);
        Ok(())
    }

    fn enqueue_rollup(&self, job: RollupJob) -> Result<()> {
        self.rollup_queue.lock().unwrap().push(job);
        Ok(())
    }

    fn queue_depth(&self, queue: QueueName) -> Result<usize> {
        Ok(match queue {
            QueueName::General => 0,
            QueueName::Crawl => self.crawl_len(),
            QueueName::Rollup => self.rollup_queue.lock().unwrap().len(),
        })
    }

    fn workers_busy(&self) -> Result<bool> {
        let in_flight = *self.in_flight.lock().unwrap();
        Ok(in_flight > 0 || self.crawl_len() > 0 || self.rollup_len() > 0)
    }
}
