//! Index lifecycle: create/drop, tune-for-write, restore defaults, and
//! force-merge on completion.

use anyhow::{bail, Result};
use serde_json::json;
use std::io::Write;
use tracing::{info, warn};

use crate::index::client::{base_mapping, extend_mapping, validate_index_name, SearchIndexClient};
use crate::model::SearchIndexConfig;

/// What to do when the target index already exists and we're not in
/// reindex mode.
pub enum ExistingIndexPolicy {
    ForceDrop,
    Prompt,
}

/// Creates the index, or hands off to the reindex path / force-drop path
/// when it already exists.
pub fn ensure_index(
    client: &dyn SearchIndexClient,
    index_name: &str,
    config: &SearchIndexConfig,
    reindex_mode: bool,
    policy: ExistingIndexPolicy,
) -> Result<()> {
    validate_index_name(index_name)?;

    if client.index_exists(index_name)? {
        if reindex_mode {
            info!(index = index_name, "index exists, reindex mode keeps it");
            return Ok(());
        }
        match policy {
            ExistingIndexPolicy::ForceDrop => {
                warn!(index = index_name, "forcedropexisting set, deleting and recreating index");
                client.delete_index(index_name)?;
            }
            ExistingIndexPolicy::Prompt => {
                if !confirm_recreate(index_name)? {
                    bail!("index {index_name} already exists, user declined to continue");
                }
                client.delete_index(index_name)?;
            }
        }
    }

    let mapping = extend_mapping(base_mapping(), None);
    client.create_index(
        index_name,
        mapping,
        config.number_of_shards,
        config.number_of_replicas,
    )?;
    Ok(())
}

fn confirm_recreate(index_name: &str) -> Result<bool> {
    print!("Index {index_name} already exists. Delete and recreate? [y/N] ");
    std::io::stdout().flush().ok();
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

/// Applies write-time settings before the walk begins.
pub fn tune_for_crawl(client: &dyn SearchIndexClient, index_name: &str, config: &SearchIndexConfig) -> Result<()> {
    let replicas = if config.disable_replicas { 0 } else { config.number_of_replicas };
    client.update_settings(
        index_name,
        json!({
            "refresh_interval": config.refresh_interval,
            "number_of_replicas": replicas,
            "translog.flush_threshold_size": config.translog_flush_threshold_size,
        }),
    )
}

/// Restores default settings and force-merges after the crawl (and rollup)
/// complete. Optimize timeouts are non-fatal; the engine completes
/// the merge in the background.
pub fn restore_after_crawl(
    client: &dyn SearchIndexClient,
    index_name: &str,
    config: &SearchIndexConfig,
    optimize: bool,
) -> Result<()> {
    client.update_settings(
        index_name,
        json!({
            "refresh_interval": "1s",
            "number_of_replicas": config.number_of_replicas,
        }),
    )?;

    let max_num_segments = if optimize { Some(1) } else { None };
    client.force_merge(index_name, max_num_segments)?;
    Ok(())
}
