//! In-memory search index fake, standing in for a live Elasticsearch-
//! compatible engine the way `FakeJobBroker` stands in for the broker.

use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::client::{BulkAction, ScrollHit, SearchIndexClient};

#[derive(Default)]
struct IndexState {
    docs: HashMap<String, Value>,
    settings: Value,
    /// ids whose next bulk write should be reported as a version conflict,
    /// consumed one at a time so a test can force exactly one retry.
    force_conflict_once: Vec<String>,
}

#[derive(Default)]
pub struct FakeSearchIndex {
    indices: Mutex<HashMap<String, IndexState>>,
}

impl FakeSearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn doc(&self, index: &str, id: &str) -> Option<Value> {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .and_then(|s| s.docs.get(id).cloned())
    }

    pub fn doc_count(&self, index: &str) -> usize {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .map(|s| s.docs.len())
            .unwrap_or(0)
    }

    /// Arranges for the next bulk write touching `id` to be reported as a
    /// version conflict, exactly once (used by the bulk-retry test).
    pub fn force_conflict_once(&self, index: &str, id: &str) {
        self.indices
            .lock()
            .unwrap()
            .entry(index.to_string())
            .or_default()
            .force_conflict_once
            .push(id.to_string());
    }
}

impl SearchIndexClient for FakeSearchIndex {
    fn index_exists(&self, name: &str) -> Result<bool> {
        Ok(self.indices.lock().unwrap().contains_key(name))
    }

    fn create_index(&self, name: &str, _mapping: Value, _shards: u32, _replicas: u32) -> Result<()> {
        super::client::validate_index_name(name)?;
        self.indices.lock().unwrap().entry(name.to_string()).or_default();
        Ok(())
    }

    fn delete_index(&self, name: &str) -> Result<()> {
        self.indices.lock().unwrap().remove(name);
        Ok(())
    }

    fn update_settings(&self, name: &str, settings: Value) -> Result<()> {
        self.indices
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .settings = settings;
        Ok(())
    }

    fn force_merge(&self, _name: &str, _max_num_segments: Option<u32>) -> Result<()> {
        Ok(())
    }

    fn bulk(&self, name: &str, actions: Vec<BulkAction>) -> Result<super::client::BulkResult> {
        let mut indices = self.indices.lock().unwrap();
        let state = indices.entry(name.to_string()).or_default();
        let mut conflicts = Vec::new();

        for action in actions {
            if let Some(pos) = state.force_conflict_once.iter().position(|id| id == action.id()) {
                state.force_conflict_once.remove(pos);
                conflicts.push(action);
                continue;
            }
            match action {
                BulkAction::Index { id, doc } | BulkAction::Update { id, doc } => {
                    state.docs.insert(id, doc);
                }
                BulkAction::Delete { id } => {
                    state.docs.remove(&id);
                }
            }
        }
        Ok(super::client::BulkResult { conflicts })
    }

    fn scroll(
        &self,
        name: &str,
        _query: Value,
        sort: Option<Value>,
        scroll_size: usize,
        on_batch: &mut dyn FnMut(Vec<ScrollHit>) -> Result<()>,
    ) -> Result<()> {
        let mut hits: Vec<ScrollHit> = {
            let indices = self.indices.lock().unwrap();
            match indices.get(name) {
                Some(state) => state
                    .docs
                    .iter()
                    .map(|(id, doc)| ScrollHit {
                        id: id.clone(),
                        source: doc.clone(),
                    })
                    .collect(),
                None => Vec::new(),
            }
        };

        if sort.is_some() {
            hits.sort_by(|a, b| {
                let pa = a.source.get("path_parent").and_then(|v| v.as_str()).unwrap_or("");
                let pb = b.source.get("path_parent").and_then(|v| v.as_str()).unwrap_or("");
                pb.cmp(pa) // descending, deepest first
            });
        }

        for batch in hits.chunks(scroll_size.max(1)) {
            on_batch(batch.to_vec())?;
        }
        Ok(())
    }
}
