//! Index lifecycle management plus the `SearchIndexClient` trait every
//! other index component is built on. The search engine itself is an
//! external collaborator; this models its REST surface only.

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

/// One bulk action. `_op_type` distinguishes update from index/delete so
/// C10 can retry only the updates on a version conflict.
#[derive(Debug, Clone)]
pub enum BulkAction {
    Index { id: String, doc: Value },
    Update { id: String, doc: Value },
    Delete { id: String },
}

impl BulkAction {
    pub fn id(&self) -> &str {
        match self {
            BulkAction::Index { id, .. } => id,
            BulkAction::Update { id, .. } => id,
            BulkAction::Delete { id } => id,
        }
    }

    pub fn is_update(&self) -> bool {
        matches!(self, BulkAction::Update { .. })
    }
}

/// Result of one hit returned from a scroll.
#[derive(Debug, Clone)]
pub struct ScrollHit {
    pub id: String,
    pub source: Value,
}

/// Outcome of one bulk call: which actions hit a version conflict.
#[derive(Debug, Clone, Default)]
pub struct BulkResult {
    pub conflicts: Vec<BulkAction>,
}

/// Index name validation: must match `diskover-*` and never
/// equal the literal `diskover`.
pub fn validate_index_name(name: &str) -> Result<()> {
    if name == "diskover" || !name.starts_with("diskover-") {
        bail!("index name {name:?} must match diskover-* and must not be the literal 'diskover'");
    }
    Ok(())
}

/// Client-facing interface to the external full-text search engine.
pub trait SearchIndexClient: Send + Sync {
    fn index_exists(&self, name: &str) -> Result<bool>;
    fn create_index(&self, name: &str, mapping: Value, shards: u32, replicas: u32) -> Result<()>;
    fn delete_index(&self, name: &str) -> Result<()>;
    fn update_settings(&self, name: &str, settings: Value) -> Result<()>;
    fn force_merge(&self, name: &str, max_num_segments: Option<u32>) -> Result<()>;
    fn bulk(&self, name: &str, actions: Vec<BulkAction>) -> Result<BulkResult>;

    /// Scans the index with a server-side scroll cursor, invoking
    /// `on_batch` once per page until exhausted.
    fn scroll(
        &self,
        name: &str,
        query: Value,
        sort: Option<Value>,
        scroll_size: usize,
        on_batch: &mut dyn FnMut(Vec<ScrollHit>) -> Result<()>,
    ) -> Result<()>;

    /// Blocks until the cluster reaches at least `level` health
    /// (`"yellow"`/`"green"`). Default no-op for clients against engines
    /// without a cluster-health concept.
    fn wait_for_health(&self, _level: &str) -> Result<()> {
        Ok(())
    }
}

/// The fixed schema mapping from , with the single plugin extension
/// point from (`extend_mapping`).
pub fn base_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "doctype": { "type": "keyword" },
                "full_path": { "type": "keyword" },
                "filename": { "type": "keyword" },
                "extension": { "type": "keyword" },
                "path_parent": { "type": "keyword" },
                "filesize": { "type": "long" },
                "items": { "type": "long" },
                "items_files": { "type": "long" },
                "items_subdirs": { "type": "long" },
                "owner": { "type": "keyword" },
                "group": { "type": "keyword" },
                "last_modified": { "type": "date" },
                "last_access": { "type": "date" },
                "last_change": { "type": "date" },
                "hardlinks": { "type": "integer" },
                "inode": { "type": "keyword" },
                "filehash": { "type": "keyword" },
                "tag": { "type": "keyword" },
                "tag_custom": { "type": "keyword" },
                "dupe_md5": { "type": "keyword" },
                "crawl_time": { "type": "float" },
                "change_percent_filesize": { "type": "float" },
                "change_percent_items": { "type": "float" },
                "change_percent_items_files": { "type": "float" },
                "change_percent_items_subdirs": { "type": "float" },
                "worker_name": { "type": "keyword" },
                "indexing_date": { "type": "date" },
                "path": { "type": "keyword" },
                "total": { "type": "long" },
                "used": { "type": "long" },
                "free": { "type": "long" },
                "available": { "type": "long" },
                "state": { "type": "keyword" },
                "dir_count": { "type": "long" },
                "file_count": { "type": "long" },
                "bulk_time": { "type": "float" }
            }
        }
    })
}

/// Applies the single plugin hook from `extend_mapping(mapping)
/// -> mapping`. No other plugin behavior is pulled into the core.
pub fn extend_mapping(mapping: Value, extend: Option<&dyn Fn(Value) -> Value>) -> Value {
    match extend {
        Some(f) => f(mapping),
        None => mapping,
    }
}

/// Talks to an Elasticsearch-compatible REST API over `reqwest`.
pub struct HttpSearchIndexClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpSearchIndexClient {
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

impl SearchIndexClient for HttpSearchIndexClient {
    fn wait_for_health(&self, level: &str) -> Result<()> {
        self.client
            .get(self.url(&format!("_cluster/health?wait_for_status={level}&timeout=30s")))
            .send()
            .context("search engine unreachable waiting for cluster health")?
            .error_for_status()
            .context("search engine reported unhealthy cluster")?;
        Ok(())
    }

    fn index_exists(&self, name: &str) -> Result<bool> {
        let resp = self
            .client
            .head(self.url(name))
            .send()
            .context("search engine unreachable checking index existence")?;
        Ok(resp.status().is_success())
    }

    fn create_index(&self, name: &str, mapping: Value, shards: u32, replicas: u32) -> Result<()> {
        validate_index_name(name)?;
        let mut body = mapping;
        body["settings"] = json!({
            "number_of_shards": shards,
            "number_of_replicas": replicas,
        });
        self.client
            .put(self.url(name))
            .json(&body)
            .send()
            .context("search engine unreachable creating index")?
            .error_for_status()
            .context("search engine rejected index creation")?;
        info!(index = name, "index created");
        Ok(())
    }

    fn delete_index(&self, name: &str) -> Result<()> {
        self.client
            .delete(self.url(name))
            .send()
            .context("search engine unreachable deleting index")?
            .error_for_status()
            .context("search engine rejected index deletion")?;
        Ok(())
    }

    fn update_settings(&self, name: &str, settings: Value) -> Result<()> {
        self.client
            .put(self.url(&format!("{name}/_settings")))
            .json(&json!({ "index": settings }))
            .send()
            .context("search engine unreachable updating settings")?
            .error_for_status()
            .context("search engine rejected settings update")?;
        Ok(())
    }

    fn force_merge(&self, name: &str, max_num_segments: Option<u32>) -> Result<()> {
        let mut url = self.url(&format!("{name}/_forcemerge"));
        if let Some(n) = max_num_segments {
            url = format!("{url}?max_num_segments={n}");
        }
        match self.client.post(&url).send() {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => {
                warn!(index = name, status = %resp.status(), "force-merge returned an error status, treating as non-fatal");
                Ok(())
            }
            Err(e) => {
                warn!(index = name, error = %e, "force-merge timed out, treating as success (engine completes in background)");
                Ok(())
            }
        }
    }

    fn bulk(&self, name: &str, actions: Vec<BulkAction>) -> Result<BulkResult> {
        let mut body = String::new();
        for action in &actions {
            let (action_line, doc_line) = match action {
                BulkAction::Index { id, doc } => (
                    json!({ "index": { "_index": name, "_id": id } }).to_string(),
                    Some(doc.to_string()),
                ),
                BulkAction::Update { id, doc } => (
                    json!({ "update": { "_index": name, "_id": id } }).to_string(),
                    Some(json!({ "doc": doc }).to_string()),
                ),
                BulkAction::Delete { id } => (
                    json!({ "delete": { "_index": name, "_id": id } }).to_string(),
                    None,
                ),
            };
            body.push_str(&action_line);
            body.push('\n');
            if let Some(doc_line) = doc_line {
                body.push_str(&doc_line);
                body.push('\n');
            }
        }

        let resp: Value = self
            .client
            .post(self.url("_bulk"))
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .context("search engine unreachable during bulk write")?
            .error_for_status()
            .context("search engine rejected bulk request")?
            .json()
            .context("invalid bulk response body")?;

        let mut conflicts = Vec::new();
        if let Some(items) = resp.get("items").and_then(|v| v.as_array()) {
            for (item, action) in items.iter().zip(actions.into_iter()) {
                let status = item
                    .values()
                    .next()
                    .and_then(|v| v.get("status"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(200);
                if status == 409 {
                    conflicts.push(action);
                }
            }
        }
        Ok(BulkResult { conflicts })
    }

    fn scroll(
        &self,
        name: &str,
        query: Value,
        sort: Option<Value>,
        scroll_size: usize,
        on_batch: &mut dyn FnMut(Vec<ScrollHit>) -> Result<()>,
    ) -> Result<()> {
        let mut body = json!({ "size": scroll_size, "query": query });
        if let Some(sort) = sort {
            body["sort"] = sort;
        }

        #[derive(serde::Deserialize)]
        struct Hit {
            #[serde(rename = "_id")]
            id: String,
            #[serde(rename = "_source")]
            source: Value,
        }
        #[derive(serde::Deserialize)]
        struct HitsWrapper {
            hits: Vec<Hit>,
        }
        #[derive(serde::Deserialize)]
        struct SearchResponse {
            #[serde(rename = "_scroll_id")]
            scroll_id: Option<String>,
            hits: HitsWrapper,
        }

        let mut resp: SearchResponse = self
            .client
            .post(self.url(&format!("{name}/_search?scroll=1m")))
            .json(&body)
            .send()
            .context("search engine unreachable starting scroll")?
            .error_for_status()?
            .json()?;

        loop {
            if resp.hits.hits.is_empty() {
                break;
            }
            let batch = resp
                .hits
                .hits
                .iter()
                .map(|h| ScrollHit {
                    id: h.id.clone(),
                    source: h.source.clone(),
                })
                .collect();
            on_batch(batch)?;

            let Some(scroll_id) = resp.scroll_id.clone() else {
                break;
            };
            resp = self
                .client
                .post(self.url("_search/scroll"))
                .json(&json!({ "scroll": "1m", "scroll_id": scroll_id }))
                .send()
                .context("search engine unreachable continuing scroll")?
                .error_for_status()?
                .json()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_name_must_match_prefix() {
        assert!(validate_index_name("diskover-prod").is_ok());
        assert!(validate_index_name("diskover").is_err());
        assert!(validate_index_name("other-index").is_err());
    }
}
