//! Job broker client: the `crawl`/`rollup`/`general` queues and the
//! queue-monitor logic that answers "are the workers still busy".

pub mod client;
pub mod testing;

pub use client::{HttpJobBroker, JobBroker};
