//! A single-producer-per-thread, multi-consumer BFS walk over the tree,
//! driven by N OS threads sharing three FIFOs. Grounded in the
//! `std::thread` + channel discovery pattern from `background_indexer.rs`,
//! generalized here to N symmetric walker threads instead of one discovery
//! thread plus a rayon batch stage.

use crate::model::PathEnvelope;
use crate::walker::exclude::ExclusionFilter;
use crate::walker::reader::DirReader;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Path separator used for depth accounting, matching the host platform.
#[cfg(windows)]
const SEP: char = '\\';
#[cfg(not(windows))]
const SEP: char = '/';

const QUIESCE_DELAY: Duration = Duration::from_millis(500);
const POLL_DELAY: Duration = Duration::from_millis(20);

/// Explicit cancellation signal, replacing reliance on `KeyboardInterrupt`
///. Checked at each blocking wait point.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct PendingEntry {
    path: String,
    depth: u32,
}

struct SharedState {
    pending: Mutex<VecDeque<PendingEntry>>,
    in_progress: AtomicUsize,
}

/// Runs the multithreaded BFS and exposes the emitted envelopes as a
/// single-pass, non-restartable iterator over `results` (/// "generators become iterators").
pub struct WalkerPool {
    handles: Vec<thread::JoinHandle<()>>,
    results_rx: Receiver<PathEnvelope>,
}

impl WalkerPool {
    /// Spawns `num_threads` walker threads rooted at `root`, bounded by
    /// `max_depth` (0 = root only) and the given exclusion filter. Reports
    /// emitted envelopes through the returned iterator.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        root: String,
        max_depth: u32,
        num_threads: usize,
        reader: Arc<dyn DirReader>,
        filter: Arc<ExclusionFilter>,
        chunkfiles: Option<usize>,
        cancel: CancellationToken,
    ) -> Self {
        let num_threads = num_threads.max(1);
        let (results_tx, results_rx) = mpsc::channel();

        let root_sep_count = root.matches(SEP).count();
        let state = Arc::new(SharedState {
            pending: Mutex::new({
                let mut dq = VecDeque::new();
                dq.push_back(PendingEntry { path: root, depth: 0 });
                dq
            }),
            in_progress: AtomicUsize::new(0),
        });

        let mut handles = Vec::with_capacity(num_threads);
        for _ in 0..num_threads {
            let state = Arc::clone(&state);
            let reader = Arc::clone(&reader);
            let filter = Arc::clone(&filter);
            let results_tx = results_tx.clone();
            let cancel = cancel.clone();

            handles.push(thread::spawn(move || {
                walker_thread_loop(
                    state,
                    reader,
                    filter,
                    results_tx,
                    max_depth,
                    root_sep_count,
                    chunkfiles,
                    cancel,
                )
            }));
        }
        drop(results_tx);

        Self { handles, results_rx }
    }

    /// Blocks until every walker thread has observed completion. Call after
    /// draining `results()` to release the threads cleanly.
    pub fn join(self) {
        for h in self.handles {
            let _ = h.join();
        }
    }

    /// Single-pass iterator over emitted envelopes; exhausts once all walker
    /// threads have terminated and drained their sends.
    pub fn results(&self) -> &Receiver<PathEnvelope> {
        &self.results_rx
    }
}

#[allow(clippy::too_many_arguments)]
fn walker_thread_loop(
    state: Arc<SharedState>,
    reader: Arc<dyn DirReader>,
    filter: Arc<ExclusionFilter>,
    results_tx: mpsc::Sender<PathEnvelope>,
    max_depth: u32,
    root_sep_count: usize,
    chunkfiles: Option<usize>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let entry = {
            let mut pending = state.pending.lock().unwrap();
            pending.pop_front()
        };

        let Some(entry) = entry else {
            // Nothing to do right now. Quiesce and recheck: another thread
            // may be mid-listing and about to push new work.
            thread::sleep(POLL_DELAY);
            if state.in_progress.load(Ordering::SeqCst) == 0 {
                thread::sleep(QUIESCE_DELAY);
                let still_empty = state.pending.lock().unwrap().is_empty();
                if still_empty && state.in_progress.load(Ordering::SeqCst) == 0 {
                    return;
                }
            }
            continue;
        };

        state.in_progress.fetch_add(1, Ordering::SeqCst);
        let depth = entry.depth;

        let listdir_result = reader.listdir(&entry.path);
        let (canonical, dir_entries, file_entries) = match listdir_result {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %entry.path, error = %e, "unexpected walker error, terminating thread");
                state.in_progress.fetch_sub(1, Ordering::SeqCst);
                return;
            }
        };

        let mut kept_dirs = Vec::new();
        for d in &dir_entries {
            let child_path = join_path(&canonical, &d.name);
            if filter.is_excluded(&d.name, &child_path) {
                continue;
            }
            kept_dirs.push(d.name.clone());
            if depth + 1 <= max_depth {
                state.pending.lock().unwrap().push_back(PendingEntry {
                    path: child_path,
                    depth: depth + 1,
                });
            }
        }

        let mut kept_files: Vec<String> = Vec::new();
        for f in &file_entries {
            let child_path = join_path(&canonical, &f.name);
            if filter.is_excluded(&f.name, &child_path) {
                continue;
            }
            kept_files.push(f.name.clone());

            if let Some(chunk_size) = chunkfiles {
                if kept_files.len() >= chunk_size {
                    let chunk = std::mem::take(&mut kept_files);
                    let envelope = PathEnvelope::Chunk {
                        path: canonical.clone(),
                        dirs: kept_dirs.clone(),
                        files_chunk: chunk,
                    };
                    if results_tx.send(envelope).is_err() {
                        state.in_progress.fetch_sub(1, Ordering::SeqCst);
                        return;
                    }
                }
            }
        }

        let envelope = PathEnvelope::Plain {
            path: canonical,
            dirs: kept_dirs,
            files: kept_files,
        };
        if results_tx.send(envelope).is_err() {
            state.in_progress.fetch_sub(1, Ordering::SeqCst);
            return;
        }

        state.in_progress.fetch_sub(1, Ordering::SeqCst);
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with(SEP) {
        format!("{parent}{name}")
    } else {
        format!("{parent}{SEP}{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::reader::LocalDirReader;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn drain(pool: WalkerPool) -> Vec<PathEnvelope> {
        let mut out = Vec::new();
        while let Ok(env) = pool.results().recv() {
            out.push(env);
        }
        pool.join();
        out
    }

    #[test]
    fn empty_tree_emits_one_empty_plain_envelope() {
        let tmp = TempDir::new().unwrap();
        let filter = Arc::new(ExclusionFilter::new(&HashSet::new(), &HashSet::new()));
        let pool = WalkerPool::spawn(
            tmp.path().to_str().unwrap().to_string(),
            99,
            2,
            Arc::new(LocalDirReader),
            filter,
            None,
            CancellationToken::new(),
        );
        let envelopes = drain(pool);
        assert_eq!(envelopes.len(), 1);
        assert!(envelopes[0].is_empty());
    }

    #[test]
    fn wildcard_exclude_prunes_subtree() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("node_modules")).unwrap();
        fs::create_dir(tmp.path().join("src")).unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();
        fs::write(tmp.path().join("node_modules/x.js"), "x").unwrap();
        fs::write(tmp.path().join("src/main.rs"), "fn main(){}").unwrap();

        let excludes: HashSet<String> = ["*modules*", ".*"].iter().map(|s| s.to_string()).collect();
        let filter = Arc::new(ExclusionFilter::new(&HashSet::new(), &excludes));
        let pool = WalkerPool::spawn(
            tmp.path().to_str().unwrap().to_string(),
            99,
            2,
            Arc::new(LocalDirReader),
            filter,
            None,
            CancellationToken::new(),
        );
        let envelopes = drain(pool);
        let paths: Vec<&str> = envelopes.iter().map(|e| e.path()).collect();
        assert!(paths.iter().any(|p| p.ends_with("src")));
        assert!(!paths.iter().any(|p| p.contains("node_modules")));
        assert!(!paths.iter().any(|p| p.contains(".git")));
    }

    #[test]
    fn depth_clamp_limits_recursion() {
        let tmp = TempDir::new().unwrap();
        let mut cur = tmp.path().to_path_buf();
        for i in 0..5 {
            cur = cur.join(format!("lvl{i}"));
            fs::create_dir(&cur).unwrap();
        }
        let filter = Arc::new(ExclusionFilter::new(&HashSet::new(), &HashSet::new()));
        let pool = WalkerPool::spawn(
            tmp.path().to_str().unwrap().to_string(),
            2,
            2,
            Arc::new(LocalDirReader),
            filter,
            None,
            CancellationToken::new(),
        );
        let envelopes = drain(pool);
        // root (depth 0), lvl0 (depth 1), lvl1 (depth 2) = 3 directories emitted;
        // lvl2 is discovered but never listed because depth + 1 > max_depth.
        assert_eq!(envelopes.len(), 3);
    }

    #[test]
    fn chunking_splits_large_directory() {
        let tmp = TempDir::new().unwrap();
        for i in 0..2500 {
            fs::write(tmp.path().join(format!("f{i}.txt")), "x").unwrap();
        }
        let filter = Arc::new(ExclusionFilter::new(&HashSet::new(), &HashSet::new()));
        let pool = WalkerPool::spawn(
            tmp.path().to_str().unwrap().to_string(),
            99,
            1,
            Arc::new(LocalDirReader),
            filter,
            Some(1000),
            CancellationToken::new(),
        );
        let envelopes = drain(pool);
        assert_eq!(envelopes.len(), 3);
        let total_files: usize = envelopes.iter().map(|e| e.file_count()).sum();
        assert_eq!(total_files, 2500);
        assert!(matches!(envelopes[0], PathEnvelope::Chunk { .. }));
        assert!(matches!(envelopes[1], PathEnvelope::Chunk { .. }));
        assert!(matches!(envelopes[2], PathEnvelope::Plain { .. }));
    }
}
