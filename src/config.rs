//! Configuration loading: TOML config file (`CrawlConfig`) plus CLI
//! argument parsing (`RunArgs`), following a `from_file` /
//! `from_default_locations` search order.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use crate::model::{Backend, CrawlConfig, RunArgs};

impl CrawlConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: CrawlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Search order: `CONFIG_PATH` env var, `./diskover.toml`, then the user
    /// config directory.
    pub fn from_default_locations() -> Result<Option<(Self, PathBuf)>> {
        if let Ok(env_path) = std::env::var("CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                let config = Self::from_file(&path)?;
                return Ok(Some((config, path)));
            }
        }

        let local_path = PathBuf::from("diskover.toml");
        if local_path.exists() {
            let config = Self::from_file(&local_path)?;
            return Ok(Some((config, local_path)));
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_path = config_dir.join("diskover").join("diskover.toml");
            if user_path.exists() {
                let config = Self::from_file(&user_path)?;
                return Ok(Some((config, user_path)));
            }
        }

        Ok(None)
    }

    /// Generate a template configuration file.
    pub fn generate_template() -> String {
        r#"# diskover_dispatcher configuration
# Generated template - customize as needed

[excludes]
dirs = [".snapshot", ".git", ".*"]
files = []

[includes]
dirs = []
files = []

[ownersgroups]
uidgidonly = false
domain = false
domainsep = "\\"
keepdomain = false

[autotag]
autotag_files = []
autotag_dirs = []

[searchindex]
url = "http://localhost:9200"
chunk_size = 500
request_timeout_secs = 30
scrollsize = 1000
number_of_shards = 1
number_of_replicas = 1
refresh_interval = "30s"
translog_flush_threshold_size = "512mb"
disable_replicas = false

[broker]
url = "http://localhost:6380"
poll_interval_secs = 1

[adaptivebatch]
startsize = 50
adaptivebatch_maxsize = 500
stepsize = 10
adaptivebatch_maxfiles = 2000

[dupescheck]
enabled = false

[crawlapi]
storagent_hosts = []

[paths]
replacepath = []
"#
        .to_string()
    }

    pub fn write_template(path: &Path) -> Result<()> {
        let template = Self::generate_template();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        std::fs::write(path, template)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// CLI surface.
#[derive(Parser, Debug)]
#[command(
    name = "diskover_dispatcher",
    author,
    version,
    about = "Multithreaded filesystem crawl dispatcher"
)]
pub struct Cli {
    /// Root directory to crawl.
    #[arg(short = 'd', long = "rootdir")]
    pub rootdir: String,

    /// Target index name, must match diskover-*.
    #[arg(short = 'i', long = "index")]
    pub index: String,

    /// Only crawl files modified within this many days.
    #[arg(short = 'm', long = "mtime")]
    pub mtime: Option<i64>,

    /// Only crawl files at least this many bytes.
    #[arg(short = 's', long = "minsize")]
    pub minsize: Option<u64>,

    /// Index directories even if they contain nothing.
    #[arg(short = 'e', long = "indexemptydirs", default_value_t = false)]
    pub indexemptydirs: bool,

    /// Maximum walk depth.
    #[arg(short = 'M', long = "maxdepth", default_value_t = u32::MAX)]
    pub maxdepth: u32,

    /// Maximum depth for directory-size rollup.
    #[arg(short = 'c', long = "maxdcdepth", default_value_t = u32::MAX)]
    pub maxdcdepth: u32,

    /// Initial crawl batch size.
    #[arg(short = 'b', long = "batchsize", default_value_t = 50)]
    pub batchsize: usize,

    /// Enable adaptive batch sizing.
    #[arg(short = 'a', long = "adaptivebatch", default_value_t = false)]
    pub adaptivebatch: bool,

    /// Number of walker threads (default: 2 x logical CPUs).
    #[arg(short = 'T', long = "walkthreads")]
    pub walkthreads: Option<usize>,

    /// Enable auto-tagging.
    #[arg(short = 'A', long = "autotag", default_value_t = false)]
    pub autotag: bool,

    /// Report size-on-disk rather than apparent size.
    #[arg(short = 'S', long = "sizeondisk", default_value_t = false)]
    pub sizeondisk: bool,

    /// Block size used for size-on-disk accounting.
    #[arg(short = 'B', long = "blocksize", default_value_t = 512)]
    pub blocksize: u64,

    /// Reindex mode: walk depth is clamped to 1.
    #[arg(short = 'r', long = "reindex", default_value_t = false)]
    pub reindex: bool,

    /// Recursive reindex mode.
    #[arg(short = 'R', long = "reindexrecursive", default_value_t = false)]
    pub reindexrecursive: bool,

    /// Drop and recreate the index if it already exists.
    #[arg(short = 'F', long = "forcedropexisting", default_value_t = false)]
    pub forcedropexisting: bool,

    /// Enable duplicate-file detection (forwarded to workers).
    #[arg(short = 'D', long = "finddupes", default_value_t = false)]
    pub finddupes: bool,

    /// Copy tags from another index.
    #[arg(short = 'C', long = "copytags")]
    pub copytags: Option<String>,

    /// Report hot directories from another index.
    #[arg(short = 'H', long = "hotdirs")]
    pub hotdirs: Option<String>,

    /// Split large files into chunks for hashing; optional chunk count.
    #[arg(long = "splitfiles")]
    pub splitfiles: Option<Option<usize>>,

    /// Split large directory listings into envelopes; optional file count.
    #[arg(long = "chunkfiles")]
    pub chunkfiles: Option<Option<usize>>,

    /// Don't wait for the worker pool to catch up before enqueueing.
    #[arg(long = "nowait", default_value_t = false)]
    pub nowait: bool,

    /// Use the HTTP crawl-API backend instead of the local filesystem.
    #[arg(long = "crawlapi", default_value_t = false)]
    pub crawlapi: bool,

    /// Use the storage-agent backend against the given hosts.
    #[arg(long = "storagent")]
    pub storagent: Option<String>,

    /// Only run the directory-size rollup phase, skipping the crawl.
    #[arg(long = "dircalcsonly", default_value_t = false)]
    pub dircalcsonly: bool,

    /// Force-merge down to a single segment on completion.
    #[arg(short = 'O', long = "optimizeindex", default_value_t = false)]
    pub optimizeindex: bool,

    /// Quiet: only warnings and errors.
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    pub quiet: bool,

    /// Verbose: info-level logging.
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    pub verbose: bool,

    /// Debug: per-directory listing detail.
    #[arg(long = "debug", default_value_t = false)]
    pub debug: bool,
}

impl Cli {
    pub fn to_run_args(&self) -> RunArgs {
        let backend = if self.crawlapi {
            Backend::CrawlApi
        } else if self.storagent.is_some() {
            Backend::StorAgent
        } else {
            Backend::Local
        };

        let chunkfiles = self.chunkfiles.as_ref().map(|inner| inner.unwrap_or(1000));
        let splitfiles = self.splitfiles.as_ref().map(|inner| inner.unwrap_or(100));

        RunArgs {
            rootdir: self.rootdir.clone(),
            index: self.index.clone(),
            mtime_days: self.mtime,
            minsize_bytes: self.minsize,
            indexemptydirs: self.indexemptydirs,
            maxdepth: self.maxdepth,
            maxdcdepth: self.maxdcdepth,
            batchsize: self.batchsize,
            adaptivebatch: self.adaptivebatch,
            walkthreads: self.walkthreads.unwrap_or_else(default_walkthreads),
            autotag: self.autotag,
            sizeondisk: self.sizeondisk,
            blocksize: self.blocksize,
            reindex: self.reindex,
            reindexrecursive: self.reindexrecursive,
            forcedropexisting: self.forcedropexisting,
            finddupes: self.finddupes,
            copytags: self.copytags.clone(),
            hotdirs: self.hotdirs.clone(),
            splitfiles,
            chunkfiles,
            nowait: self.nowait,
            backend,
            dircalcsonly: self.dircalcsonly,
            optimizeindex: self.optimizeindex,
        }
    }

    pub fn log_level(&self) -> tracing::Level {
        if self.debug {
            tracing::Level::DEBUG
        } else if self.verbose {
            tracing::Level::INFO
        } else if self.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::WARN
        }
    }
}

fn default_walkthreads() -> usize {
    2 * std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_excludes() {
        let config = CrawlConfig::default();
        assert!(config.excludes.dirs.contains(".*"));
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[searchindex]
url = "http://es:9200"
"#;
        let config: CrawlConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.searchindex.url, "http://es:9200");
        assert_eq!(config.searchindex.chunk_size, 500);
    }

    #[test]
    fn generate_template_has_all_sections() {
        let template = CrawlConfig::generate_template();
        for section in ["[excludes]", "[searchindex]", "[broker]", "[adaptivebatch]"] {
            assert!(template.contains(section));
        }
    }

    #[test]
    fn cli_parses_required_args() {
        let cli = Cli::parse_from(["diskover_dispatcher", "-d", "/data", "-i", "diskover-test"]);
        assert_eq!(cli.rootdir, "/data");
        assert_eq!(cli.index, "diskover-test");
        let args = cli.to_run_args();
        assert_eq!(args.walkthreads, default_walkthreads());
    }

    #[test]
    fn reindex_clamps_effective_maxdepth() {
        let cli = Cli::parse_from([
            "diskover_dispatcher",
            "-d",
            "/data",
            "-i",
            "diskover-test",
            "-r",
            "-M",
            "99",
        ]);
        let args = cli.to_run_args();
        assert_eq!(args.effective_maxdepth(), 1);
    }
}
