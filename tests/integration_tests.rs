//! End-to-end tests for the crawl dispatcher: real filesystem trees walked
//! through the tree walker pool and batch dispatcher, landing on in-memory
//! fakes standing in for the broker and search engine.

use std::collections::HashSet;
use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use diskover_dispatcher::broker::testing::{spawn_auto_drain, FakeJobBroker};
use diskover_dispatcher::index::testing::FakeSearchIndex;
use diskover_dispatcher::index::client::SearchIndexClient;
use diskover_dispatcher::model::{Backend, CrawlConfig, PathEnvelope, RunArgs};
use diskover_dispatcher::run::{self, RuntimeContext};
use diskover_dispatcher::walker::dispatcher::{BatchDispatcher, BatchDispatcherConfig};
use diskover_dispatcher::walker::exclude::ExclusionFilter;
use diskover_dispatcher::walker::pool::{CancellationToken, WalkerPool};
use diskover_dispatcher::walker::reader::LocalDirReader;
use tempfile::TempDir;

fn plain_dispatcher_config() -> BatchDispatcherConfig {
    BatchDispatcherConfig {
        indexemptydirs: true,
        replacepath: vec![],
        batchsize: 50,
        adaptive: false,
        startsize: 50,
        maxsize: 500,
        stepsize: 10,
        adaptivebatch_maxfiles: 2000,
    }
}

fn base_run_args(rootdir: String, index: String) -> RunArgs {
    RunArgs {
        rootdir,
        index,
        mtime_days: None,
        minsize_bytes: None,
        indexemptydirs: true,
        maxdepth: u32::MAX,
        maxdcdepth: u32::MAX,
        batchsize: 50,
        adaptivebatch: false,
        walkthreads: 3,
        autotag: false,
        sizeondisk: false,
        blocksize: 512,
        reindex: false,
        reindexrecursive: false,
        forcedropexisting: true,
        finddupes: false,
        copytags: None,
        hotdirs: None,
        splitfiles: None,
        chunkfiles: None,
        nowait: true,
        backend: Backend::Local,
        dircalcsonly: false,
        optimizeindex: false,
    }
}

/// Builds a small multi-level tree:
/// root/a/file1.txt, root/a/b/file2.txt, root/c/.git/ignored, root/skipme/x
fn build_tree(root: &std::path::Path) {
    fs::create_dir_all(root.join("a/b")).unwrap();
    fs::create_dir_all(root.join("c/.git")).unwrap();
    fs::create_dir_all(root.join("skipme")).unwrap();
    fs::write(root.join("a/file1.txt"), "one").unwrap();
    fs::write(root.join("a/b/file2.txt"), "two").unwrap();
    fs::write(root.join("c/.git/ignored"), "noise").unwrap();
    fs::write(root.join("skipme/x"), "x").unwrap();
}

/// Every real file and non-excluded directory under the tree shows up
/// exactly once across the dispatched crawl jobs, and excluded subtrees
/// never appear at all.
#[test]
fn crawl_is_complete_and_respects_exclusion() {
    let tmp = TempDir::new().unwrap();
    build_tree(tmp.path());

    let includes = HashSet::new();
    let excludes: HashSet<String> = ["skipme", ".git"].iter().map(|s| s.to_string()).collect();
    let filter = Arc::new(ExclusionFilter::new(&includes, &excludes));
    let reader = Arc::new(LocalDirReader);
    let cancel = CancellationToken::new();

    let pool = WalkerPool::spawn(
        tmp.path().to_str().unwrap().to_string(),
        u32::MAX,
        3,
        reader,
        filter,
        None,
        cancel,
    );

    let broker = FakeJobBroker::new();
    let mut dispatcher = BatchDispatcher::new(plain_dispatcher_config(), &broker);
    dispatcher.drain(pool.results()).unwrap();
    pool.join();

    let mut seen_dirs = HashSet::new();
    let mut seen_files = HashSet::new();
    for job in broker.take_crawl_jobs() {
        for envelope in job.envelopes {
            match envelope {
                PathEnvelope::Plain { path, dirs, files } => {
                    seen_dirs.insert(path);
                    for f in files {
                        seen_files.insert(f);
                    }
                    let _ = dirs;
                }
                PathEnvelope::Chunk { path, files_chunk, .. } => {
                    seen_dirs.insert(path);
                    for f in files_chunk {
                        seen_files.insert(f);
                    }
                }
            }
        }
    }

    assert!(seen_files.contains("file1.txt"));
    assert!(seen_files.contains("file2.txt"));
    assert!(!seen_files.contains("ignored"));
    assert!(!seen_files.contains("x"));

    let skipme = tmp.path().join("skipme").to_str().unwrap().to_string();
    let gitdir = tmp.path().join("c/.git").to_str().unwrap().to_string();
    assert!(!seen_dirs.contains(&skipme));
    assert!(!seen_dirs.contains(&gitdir));
}

/// A depth limit of 1 stops the walk at the root's immediate children;
/// nothing under `a/b` is visited.
#[test]
fn maxdepth_one_stops_at_immediate_children() {
    let tmp = TempDir::new().unwrap();
    build_tree(tmp.path());

    let filter = Arc::new(ExclusionFilter::new(&HashSet::new(), &HashSet::new()));
    let reader = Arc::new(LocalDirReader);
    let cancel = CancellationToken::new();

    let pool = WalkerPool::spawn(tmp.path().to_str().unwrap().to_string(), 1, 2, reader, filter, None, cancel);

    let broker = FakeJobBroker::new();
    let mut dispatcher = BatchDispatcher::new(plain_dispatcher_config(), &broker);
    dispatcher.drain(pool.results()).unwrap();
    pool.join();

    let mut seen_files = HashSet::new();
    for job in broker.take_crawl_jobs() {
        for envelope in job.envelopes {
            if let PathEnvelope::Plain { files, .. } = envelope {
                for f in files {
                    seen_files.insert(f);
                }
            }
        }
    }

    assert!(!seen_files.contains("file2.txt"), "file2.txt lives two levels down, past maxdepth 1");
}

/// The full orchestration runs crawl then rollup then restore, against a
/// small real tree, using fakes for both external collaborators.
#[test]
fn full_run_progresses_through_crawl_and_rollup() {
    let tmp = TempDir::new().unwrap();
    build_tree(tmp.path());

    let index = FakeSearchIndex::new();
    let broker = Arc::new(FakeJobBroker::new());
    let (stop, _drained, worker) = spawn_auto_drain(broker.clone());
    let crawl_config = CrawlConfig::default();
    let cancel = CancellationToken::new();

    let ctx = RuntimeContext {
        index_client: &index,
        broker: broker.as_ref(),
        crawl_config: &crawl_config,
        cancel,
    };
    let run_args = base_run_args(tmp.path().to_str().unwrap().to_string(), "diskover-integration".to_string());

    run::run(&ctx, &run_args).unwrap();
    stop.store(true, Ordering::SeqCst);
    worker.join().unwrap();

    assert!(index.index_exists("diskover-integration").unwrap());
    assert!(index.doc_count("diskover-integration") >= 3, "expects at least diskspace + two crawlstat docs");
    assert_eq!(broker.crawl_len(), 0);
    assert_eq!(broker.rollup_len(), 0);
}

/// Reindex mode clamps the walk depth to 1 regardless of the configured
/// maxdepth.
#[test]
fn reindex_mode_clamps_depth_even_with_deep_maxdepth() {
    let args = base_run_args("/tmp/whatever".to_string(), "diskover-x".to_string());
    let mut reindex_args = args.clone();
    reindex_args.reindex = true;
    reindex_args.maxdepth = 50;
    assert_eq!(reindex_args.effective_maxdepth(), 1);

    let mut plain_args = args;
    plain_args.maxdepth = 50;
    assert_eq!(plain_args.effective_maxdepth(), 50);
}
