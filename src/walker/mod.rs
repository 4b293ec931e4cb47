//! Tree walking: directory backends, exclusion rules, the multithreaded
//! walker pool, and the batch dispatcher.

pub mod dispatcher;
pub mod exclude;
pub mod pool;
pub mod reader;

pub use dispatcher::BatchDispatcher;
pub use exclude::ExclusionFilter;
pub use pool::{CancellationToken, WalkerPool};
pub use reader::{AgentDirReader, DirEntry, DirReader, HttpApiDirReader, LocalDirReader};
