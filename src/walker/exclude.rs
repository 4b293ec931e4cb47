//! First-match-wins decision over include/exclude sets, grounded in
//! `diskover.py`'s `dir_excluded`.

use regex::Regex;
use std::collections::HashSet;

/// Decides, for one basename/path pair, whether to skip it during the walk.
pub struct ExclusionFilter {
    include_names: HashSet<String>,
    exclude_names: HashSet<String>,
    exclude_dotfiles: bool,
    wildcard_patterns: Vec<String>,
}

impl ExclusionFilter {
    pub fn new(includes: &HashSet<String>, excludes: &HashSet<String>) -> Self {
        let exclude_dotfiles = excludes.contains(".*");
        let wildcard_patterns = excludes
            .iter()
            .filter(|p| p.as_str() != ".*")
            .cloned()
            .collect();

        Self {
            include_names: includes.clone(),
            exclude_names: excludes.clone(),
            exclude_dotfiles,
            wildcard_patterns,
        }
    }

    /// Rules evaluated in order, first match wins.
    pub fn is_excluded(&self, basename: &str, full_path: &str) -> bool {
        if self.include_names.contains(basename) || self.include_names.contains(full_path) {
            return false;
        }
        if self.exclude_names.contains(basename) || self.exclude_names.contains(full_path) {
            return true;
        }
        if self.exclude_dotfiles && basename.starts_with('.') {
            return true;
        }
        for pattern in &self.wildcard_patterns {
            if matches_pattern(pattern, basename) || matches_pattern(pattern, full_path) {
                return true;
            }
        }
        false
    }
}

fn matches_pattern(pattern: &str, candidate: &str) -> bool {
    let starts = pattern.starts_with('*');
    let ends = pattern.ends_with('*');

    if starts && ends && pattern.len() >= 2 {
        let inner = &pattern[1..pattern.len() - 1];
        let re = Regex::new(&regex::escape(inner)).expect("escaped pattern is always valid");
        re.is_match(candidate)
    } else if starts {
        let suffix = &pattern[1..];
        candidate.ends_with(suffix)
    } else if ends {
        let prefix = &pattern[..pattern.len() - 1];
        candidate.starts_with(prefix)
    } else {
        candidate == pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(includes: &[&str], excludes: &[&str]) -> ExclusionFilter {
        ExclusionFilter::new(
            &includes.iter().map(|s| s.to_string()).collect(),
            &excludes.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn include_beats_exclude() {
        let f = filter(&["node_modules"], &["node_modules", "*modules*"]);
        assert!(!f.is_excluded("node_modules", "/t/node_modules"));
    }

    #[test]
    fn literal_exclude_before_wildcard() {
        let f = filter(&[], &["build"]);
        assert!(f.is_excluded("build", "/t/build"));
    }

    #[test]
    fn dotfile_rule_requires_dot_star_token() {
        let f = filter(&[], &[".*"]);
        assert!(f.is_excluded(".git", "/t/.git"));
        assert!(!f.is_excluded("git", "/t/git"));
    }

    #[test]
    fn wildcard_substring() {
        let f = filter(&[], &["*modules*"]);
        assert!(f.is_excluded("node_modules", "/t/node_modules"));
        assert!(!f.is_excluded("src", "/t/src"));
    }

    #[test]
    fn wildcard_suffix_and_prefix() {
        let f = filter(&[], &["*.tmp", "cache*"]);
        assert!(f.is_excluded("foo.tmp", "/t/foo.tmp"));
        assert!(f.is_excluded("cachedir", "/t/cachedir"));
        assert!(!f.is_excluded("tmpfoo", "/t/tmpfoo"));
    }

    #[test]
    fn exact_match_requires_no_wildcards() {
        let f = filter(&[], &["logs"]);
        assert!(f.is_excluded("logs", "/t/logs"));
        assert!(!f.is_excluded("logsdir", "/t/logsdir"));
    }
}
