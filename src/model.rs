//! Data types shared across the crawl dispatcher: configuration records and
//! the envelopes/jobs that flow from the tree walker through to the broker.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Immutable for the lifetime of one run. Mirrors the sections of
/// `diskover.cfg`: excludes/includes, ownership display policy, batching
/// knobs, search-engine and broker endpoints, auto-tag rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    #[serde(default)]
    pub excludes: ExcludeConfig,
    #[serde(default)]
    pub includes: IncludeConfig,
    #[serde(default)]
    pub ownersgroups: OwnersGroupsConfig,
    #[serde(default)]
    pub autotag: AutotagConfig,
    #[serde(default)]
    pub searchindex: SearchIndexConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub adaptivebatch: AdaptiveBatchConfig,
    #[serde(default)]
    pub dupescheck: DupesCheckConfig,
    #[serde(default)]
    pub crawlapi: CrawlApiConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            excludes: ExcludeConfig::default(),
            includes: IncludeConfig::default(),
            ownersgroups: OwnersGroupsConfig::default(),
            autotag: AutotagConfig::default(),
            searchindex: SearchIndexConfig::default(),
            broker: BrokerConfig::default(),
            adaptivebatch: AdaptiveBatchConfig::default(),
            dupescheck: DupesCheckConfig::default(),
            crawlapi: CrawlApiConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludeConfig {
    #[serde(default)]
    pub dirs: HashSet<String>,
    #[serde(default)]
    pub files: HashSet<String>,
}

impl Default for ExcludeConfig {
    fn default() -> Self {
        Self {
            dirs: [".snapshot", ".git", ".*"].iter().map(|s| s.to_string()).collect(),
            files: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeConfig {
    #[serde(default)]
    pub dirs: HashSet<String>,
    #[serde(default)]
    pub files: HashSet<String>,
}

/// Owner/group display policy forwarded to workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnersGroupsConfig {
    #[serde(default)]
    pub uidgidonly: bool,
    #[serde(default)]
    pub domain: bool,
    #[serde(default = "default_domainsep")]
    pub domainsep: String,
    #[serde(default)]
    pub keepdomain: bool,
}

fn default_domainsep() -> String {
    "\\".to_string()
}

impl Default for OwnersGroupsConfig {
    fn default() -> Self {
        Self {
            uidgidonly: false,
            domain: false,
            domainsep: default_domainsep(),
            keepdomain: false,
        }
    }
}

/// Auto-tag rule sets, forwarded to workers as part of `RunArgs`. Rules may
/// be declared inline or loaded from a referenced JSON file
/// (`autotag_files_path` / `autotag_dirs_path`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutotagConfig {
    #[serde(default)]
    pub autotag_files: Vec<AutotagRule>,
    #[serde(default)]
    pub autotag_dirs: Vec<AutotagRule>,
    #[serde(default)]
    pub autotag_files_path: Option<String>,
    #[serde(default)]
    pub autotag_dirs_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutotagRule {
    pub pattern: String,
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIndexConfig {
    #[serde(default = "default_search_url")]
    pub url: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_scrollsize")]
    pub scrollsize: usize,
    #[serde(default = "default_number_of_shards")]
    pub number_of_shards: u32,
    #[serde(default = "default_number_of_replicas")]
    pub number_of_replicas: u32,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,
    #[serde(default = "default_translog_flush_threshold")]
    pub translog_flush_threshold_size: String,
    #[serde(default)]
    pub disable_replicas: bool,
}

fn default_search_url() -> String {
    "http://localhost:9200".to_string()
}
fn default_chunk_size() -> usize {
    500
}
fn default_request_timeout() -> u64 {
    30
}
fn default_scrollsize() -> usize {
    1000
}
fn default_number_of_shards() -> u32 {
    1
}
fn default_number_of_replicas() -> u32 {
    1
}
fn default_refresh_interval() -> String {
    "30s".to_string()
}
fn default_translog_flush_threshold() -> String {
    "512mb".to_string()
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            chunk_size: default_chunk_size(),
            request_timeout_secs: default_request_timeout(),
            scrollsize: default_scrollsize(),
            number_of_shards: default_number_of_shards(),
            number_of_replicas: default_number_of_replicas(),
            refresh_interval: default_refresh_interval(),
            translog_flush_threshold_size: default_translog_flush_threshold(),
            disable_replicas: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_url")]
    pub url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_broker_url() -> String {
    "http://localhost:6380".to_string()
}
fn default_poll_interval() -> u64 {
    1
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveBatchConfig {
    #[serde(default = "default_startsize")]
    pub startsize: usize,
    #[serde(default = "default_maxsize")]
    pub adaptivebatch_maxsize: usize,
    #[serde(default = "default_stepsize")]
    pub stepsize: usize,
    #[serde(default = "default_maxfiles")]
    pub adaptivebatch_maxfiles: usize,
}

fn default_startsize() -> usize {
    50
}
fn default_maxsize() -> usize {
    500
}
fn default_stepsize() -> usize {
    10
}
fn default_maxfiles() -> usize {
    2000
}

impl Default for AdaptiveBatchConfig {
    fn default() -> Self {
        Self {
            startsize: default_startsize(),
            adaptivebatch_maxsize: default_maxsize(),
            stepsize: default_stepsize(),
            adaptivebatch_maxfiles: default_maxfiles(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DupesCheckConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub hash_algorithm: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlApiConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub storagent_hosts: Vec<String>,
}

impl Default for CrawlApiConfig {
    fn default() -> Self {
        Self {
            url: None,
            storagent_hosts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub replacepath: Vec<(String, String)>,
}

/// Which backend services directory listings for the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Local,
    CrawlApi,
    StorAgent,
}

/// Per-invocation options, the Rust equivalent of the CLI surface.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub rootdir: String,
    pub index: String,
    pub mtime_days: Option<i64>,
    pub minsize_bytes: Option<u64>,
    pub indexemptydirs: bool,
    pub maxdepth: u32,
    pub maxdcdepth: u32,
    pub batchsize: usize,
    pub adaptivebatch: bool,
    pub walkthreads: usize,
    pub autotag: bool,
    pub sizeondisk: bool,
    pub blocksize: u64,
    pub reindex: bool,
    pub reindexrecursive: bool,
    pub forcedropexisting: bool,
    pub finddupes: bool,
    pub copytags: Option<String>,
    pub hotdirs: Option<String>,
    pub splitfiles: Option<usize>,
    pub chunkfiles: Option<usize>,
    pub nowait: bool,
    pub backend: Backend,
    pub dircalcsonly: bool,
    pub optimizeindex: bool,
}

impl RunArgs {
    /// Effective max depth, clamped to 1 under reindex mode.
    pub fn effective_maxdepth(&self) -> u32 {
        if self.reindex || self.reindexrecursive {
            1
        } else {
            self.maxdepth
        }
    }
}

/// Tags captured before a reindex so workers can reapply them to new docs.
#[derive(Debug, Clone, Default)]
pub struct ReindexCarryover {
    pub files: HashMap<String, (String, String)>,
    pub directories: HashMap<String, (String, String)>,
}

/// One `(directory, subdirs, files)` tuple emitted by the tree walker, or a
/// file-chunk continuation of one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PathEnvelope {
    Plain {
        path: String,
        dirs: Vec<String>,
        files: Vec<String>,
    },
    Chunk {
        path: String,
        dirs: Vec<String>,
        files_chunk: Vec<String>,
    },
}

impl PathEnvelope {
    pub fn path(&self) -> &str {
        match self {
            PathEnvelope::Plain { path, .. } => path,
            PathEnvelope::Chunk { path, .. } => path,
        }
    }

    pub fn file_count(&self) -> usize {
        match self {
            PathEnvelope::Plain { files, .. } => files.len(),
            PathEnvelope::Chunk { files_chunk, .. } => files_chunk.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            PathEnvelope::Plain { dirs, files, .. } => dirs.is_empty() && files.is_empty(),
            PathEnvelope::Chunk { .. } => false,
        }
    }
}

/// Placed on the `crawl` queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub envelopes: Vec<PathEnvelope>,
}

/// One row of rollup input: `(doc_id, full_path, mtime, atime, ctime)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupEntry {
    pub doc_id: String,
    pub full_path: String,
    pub mtime: f64,
    pub atime: f64,
    pub ctime: f64,
}

/// Placed on the `rollup` queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupJob {
    pub entries: Vec<RollupEntry>,
}

/// `directory` index document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryDoc {
    pub filename: String,
    pub path_parent: String,
    pub filesize: u64,
    pub items: u64,
    pub items_files: u64,
    pub items_subdirs: u64,
    pub owner: String,
    pub group: String,
    pub last_modified: String,
    pub last_access: String,
    pub last_change: String,
    pub hardlinks: u32,
    pub inode: String,
    pub tag: String,
    pub tag_custom: String,
    pub crawl_time: f64,
    pub worker_name: String,
    pub indexing_date: String,
}

/// `file` index document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDoc {
    pub filename: String,
    pub extension: String,
    pub path_parent: String,
    pub filesize: u64,
    pub owner: String,
    pub group: String,
    pub last_modified: String,
    pub last_access: String,
    pub last_change: String,
    pub hardlinks: u32,
    pub inode: String,
    pub filehash: Option<String>,
    pub tag: String,
    pub tag_custom: String,
    pub dupe_md5: Option<String>,
    pub worker_name: String,
    pub indexing_date: String,
}

/// `diskspace` index document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskspaceDoc {
    pub path: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub available: u64,
    pub indexing_date: String,
}

/// `crawlstat` index document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    Running,
    FinishedCrawl,
    FinishedDircalc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlstatDoc {
    pub path: String,
    pub state: CrawlState,
    pub crawl_time: f64,
    pub indexing_date: String,
}

/// `worker` index document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerDoc {
    pub worker_name: String,
    pub dir_count: u64,
    pub file_count: u64,
    pub bulk_time: f64,
    pub crawl_time: f64,
    pub indexing_date: String,
}
