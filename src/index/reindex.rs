//! For `reindex`/`reindex-recursive` modes, captures tags on existing docs
//! under a path and bulk-deletes them before the re-crawl, grounded in
//! `diskover.py`'s `index_delete_path`.

use anyhow::Result;
use serde_json::{json, Value};

use crate::escape::escape_query;
use crate::index::client::{BulkAction, SearchIndexClient};
use crate::model::ReindexCarryover;

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn dirname(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

/// A `query_string` clause against `path_parent`, with wildcard expansion
/// turned on since `value` may carry a trailing `/*`. `term` can't be used
/// here: it matches the exact stored keyword, never the escaped/wildcarded
/// form this crate builds.
fn path_parent_query_string(value: &str) -> Value {
    json!({
        "query_string": {
            "default_field": "path_parent",
            "query": value,
            "analyze_wildcard": true,
        }
    })
}

fn field_query_string(field: &str, value: &str) -> Value {
    json!({
        "query_string": {
            "default_field": field,
            "query": value,
        }
    })
}

/// Builds the query matching every doc under `path`, plus the directory
/// doc for `path` itself when recursive.
fn build_query(path: &str, recursive: bool, doctype: &str) -> Value {
    let escaped = escape_query(path);
    let mut should = vec![path_parent_query_string(&escaped)];
    if recursive {
        should.push(path_parent_query_string(&format!("{escaped}/*")));
        if doctype == "directory" {
            should.push(json!({
                "bool": {
                    "must": [
                        field_query_string("filename", &escape_query(basename(path))),
                        field_query_string("path_parent", &escape_query(&dirname(path))),
                    ]
                }
            }));
        }
    }
    json!({
        "bool": {
            "filter": [{ "term": { "doctype": doctype } }],
            "should": should,
            "minimum_should_match": 1,
        }
    })
}

/// Scrolls and deletes file and directory docs under `path`, returning the
/// `ReindexCarryover` consumed by workers during the re-crawl. Only paths
/// actually present before the rewalk get a carryover entry.
pub fn delete_path(
    client: &dyn SearchIndexClient,
    index: &str,
    path: &str,
    recursive: bool,
    bulk_chunk_size: usize,
) -> Result<ReindexCarryover> {
    let mut carryover = ReindexCarryover::default();

    for doctype in ["file", "directory"] {
        let query = build_query(path, recursive, doctype);
        let mut to_delete: Vec<BulkAction> = Vec::new();

        client.scroll(index, query, None, 1000, &mut |hits| {
            for hit in hits {
                let full_path = hit
                    .source
                    .get("full_path")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let tag = hit
                    .source
                    .get("tag")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let tag_custom = hit
                    .source
                    .get("tag_custom")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();

                if doctype == "file" {
                    carryover.files.insert(full_path, (tag, tag_custom));
                } else {
                    carryover.directories.insert(full_path, (tag, tag_custom));
                }
                to_delete.push(BulkAction::Delete { id: hit.id });
            }
            Ok(())
        })?;

        for chunk in to_delete.chunks(bulk_chunk_size.max(1)) {
            client.bulk(index, chunk.to_vec())?;
        }
    }

    Ok(carryover)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::testing::FakeSearchIndex;
    use serde_json::json;

    fn seed_file(index: &FakeSearchIndex, name: &str, id: &str, full_path: &str, tag: &str) {
        index
            .bulk(
                name,
                vec![BulkAction::Index {
                    id: id.to_string(),
                    doc: json!({
                        "doctype": "file",
                        "full_path": full_path,
                        "path_parent": dirname(full_path),
                        "filename": basename(full_path),
                        "tag": tag,
                        "tag_custom": "",
                    }),
                }],
            )
            .unwrap();
    }

    #[test]
    fn reindex_preserves_tags_and_deletes_docs() {
        let index = FakeSearchIndex::new();
        index.create_index("diskover-test", json!({}), 1, 1).unwrap();
        seed_file(&index, "diskover-test", "f1", "/t/a.txt", "keep");

        let carryover = delete_path(&index, "diskover-test", "/t", false, 500).unwrap();

        assert_eq!(
            carryover.files.get("/t/a.txt"),
            Some(&("keep".to_string(), "".to_string()))
        );
        assert_eq!(index.doc_count("diskover-test"), 0);
    }

    #[test]
    fn no_carryover_for_paths_absent_before_reindex() {
        let index = FakeSearchIndex::new();
        index.create_index("diskover-test", json!({}), 1, 1).unwrap();
        seed_file(&index, "diskover-test", "f1", "/t/a.txt", "keep");

        let carryover = delete_path(&index, "diskover-test", "/t", false, 500).unwrap();
        assert!(!carryover.files.contains_key("/t/new.txt"));
    }

    #[test]
    fn path_parent_clauses_use_query_string_not_term() {
        let query = build_query("/t", true, "directory");
        let rendered = query.to_string();
        assert!(rendered.contains("query_string"));
        assert!(!rendered.contains(r#""term":{"path_parent""#));
        assert!(rendered.contains("/t/*"));
    }
}
