//! One generic scan-with-scroll with four output shapes, grounded in
//! `diskover.py`'s `_index_get_docs_data`.

use anyhow::Result;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::escape::escape_query;
use crate::index::client::SearchIndexClient;
use crate::utils::parse_epoch_secs;

/// Optional scoping shared by all four shapes.
#[derive(Debug, Clone, Default)]
pub struct ScrollOptions {
    pub path_scope: Option<String>,
    /// `(root_depth, maxdepth)`; when set, restricts to `path_parent`
    /// matching `(/[^/]+){1,n}|/?` where `n = root_depth + maxdepth - 1`.
    pub max_depth: Option<(u32, u32)>,
    /// Deepest-first by `path_parent`, required for bottom-up rollups.
    pub descending_sort: bool,
}

fn maxdepth_regex(root_depth: u32, maxdepth: u32) -> String {
    let n = root_depth + maxdepth - 1;
    format!("(/[^/]+){{1,{n}}}|/?")
}

fn build_query(doctype: &str, opts: &ScrollOptions) -> Value {
    let mut filter = vec![json!({ "term": { "doctype": doctype } })];
    if let Some(ref scope) = opts.path_scope {
        let escaped = escape_query(scope);
        filter.push(json!({
            "bool": {
                "should": [
                    {
                        "query_string": {
                            "default_field": "path_parent",
                            "query": escaped,
                            "analyze_wildcard": true,
                        }
                    },
                    {
                        "query_string": {
                            "default_field": "path_parent",
                            "query": format!("{escaped}/*"),
                            "analyze_wildcard": true,
                        }
                    },
                ],
                "minimum_should_match": 1,
            }
        }));
    }
    if let Some((root_depth, maxdepth)) = opts.max_depth {
        filter.push(json!({
            "regexp": { "path_parent": maxdepth_regex(root_depth, maxdepth) }
        }));
    }
    json!({ "bool": { "filter": filter } })
}

fn build_sort(opts: &ScrollOptions) -> Option<Value> {
    if opts.descending_sort {
        Some(json!([{ "path_parent": "desc" }]))
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct RollupInputRow {
    pub id: String,
    pub full_path: String,
    pub mtime: f64,
    pub atime: f64,
    pub ctime: f64,
    pub doctype: String,
}

fn epoch_field(source: &Value, field: &str) -> f64 {
    source
        .get(field)
        .and_then(|v| v.as_str())
        .map(parse_epoch_secs)
        .unwrap_or(0.0)
}

/// Rollup-input shape: `(id, full_path, mtime, atime, ctime, doctype)`,
/// sorted deepest `path_parent` first so leaf directories are processed
/// before parents. `mtime`/`atime`/`ctime` come from the indexed
/// `last_modified`/`last_access`/`last_change` date strings, converted to
/// Unix epoch seconds.
pub fn scroll_rollup_input(
    client: &dyn SearchIndexClient,
    index: &str,
    opts: &ScrollOptions,
    scroll_size: usize,
) -> Result<Vec<RollupInputRow>> {
    let query = build_query("directory", opts);
    let mut sort_opts = opts.clone();
    sort_opts.descending_sort = true;
    let sort = build_sort(&sort_opts);

    let mut rows = Vec::new();
    client.scroll(index, query, sort, scroll_size, &mut |hits| {
        for hit in hits {
            rows.push(RollupInputRow {
                id: hit.id,
                full_path: hit
                    .source
                    .get("full_path")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                mtime: epoch_field(&hit.source, "last_modified"),
                atime: epoch_field(&hit.source, "last_access"),
                ctime: epoch_field(&hit.source, "last_change"),
                doctype: "directory".to_string(),
            });
        }
        Ok(())
    })?;
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct TagCopyRow {
    pub full_path: String,
    pub tag: String,
    pub tag_custom: String,
    pub doctype: String,
}

/// Tag-copy shape: `(full_path, tag, tag_custom, doctype)`, used by
/// `-C copytags`.
pub fn scroll_tag_copy(
    client: &dyn SearchIndexClient,
    index: &str,
    doctype: &str,
    opts: &ScrollOptions,
    scroll_size: usize,
) -> Result<Vec<TagCopyRow>> {
    let query = build_query(doctype, opts);
    let sort = build_sort(opts);
    let mut rows = Vec::new();
    client.scroll(index, query, sort, scroll_size, &mut |hits| {
        for hit in hits {
            rows.push(TagCopyRow {
                full_path: hit
                    .source
                    .get("full_path")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                tag: hit.source.get("tag").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                tag_custom: hit
                    .source
                    .get("tag_custom")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                doctype: doctype.to_string(),
            });
        }
        Ok(())
    })?;
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct HotDirsRow {
    pub id: String,
    pub path: String,
    pub filesize: u64,
    pub items: u64,
    pub items_files: u64,
    pub items_subdirs: u64,
}

/// Hot-dirs shape: `(id, path, filesize, items, items_files, items_subdirs)`,
/// used by `-H hotdirs`.
pub fn scroll_hot_dirs(
    client: &dyn SearchIndexClient,
    index: &str,
    opts: &ScrollOptions,
    scroll_size: usize,
) -> Result<Vec<HotDirsRow>> {
    let query = build_query("directory", opts);
    let sort = Some(json!([{ "filesize": "desc" }]));
    let mut rows = Vec::new();
    client.scroll(index, query, sort, scroll_size, &mut |hits| {
        for hit in hits {
            let get_u64 = |field: &str| hit.source.get(field).and_then(|v| v.as_u64()).unwrap_or(0);
            rows.push(HotDirsRow {
                id: hit.id,
                path: hit
                    .source
                    .get("full_path")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                filesize: get_u64("filesize"),
                items: get_u64("items"),
                items_files: get_u64("items_files"),
                items_subdirs: get_u64("items_subdirs"),
            });
        }
        Ok(())
    })?;
    Ok(rows)
}

/// Path-to-id shape: `{rel_path: id}`, used to resolve `fullpath` joins for
/// hot-dirs output).
pub fn scroll_path_to_id(
    client: &dyn SearchIndexClient,
    index: &str,
    doctype: &str,
    opts: &ScrollOptions,
    scroll_size: usize,
) -> Result<HashMap<String, String>> {
    let query = build_query(doctype, opts);
    let mut map = HashMap::new();
    client.scroll(index, query, None, scroll_size, &mut |hits| {
        for hit in hits {
            if let Some(path) = hit.source.get("full_path").and_then(|v| v.as_str()) {
                map.insert(path.to_string(), hit.id);
            }
        }
        Ok(())
    })?;
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maxdepth_regex_matches_expected_pattern() {
        assert_eq!(maxdepth_regex(2, 3), "(/[^/]+){1,4}|/?");
    }

    #[test]
    fn path_scope_uses_query_string_not_term() {
        let opts = ScrollOptions {
            path_scope: Some("/t".to_string()),
            max_depth: None,
            descending_sort: false,
        };
        let query = build_query("directory", &opts).to_string();
        assert!(query.contains("query_string"));
        assert!(!query.contains(r#""term":{"path_parent""#));
        assert!(query.contains("/t/*"));
    }
}
