//! query-string escaping for interpolation into the search engine's
//! query grammar. Backslash is escaped first so later escapes aren't
//! themselves re-escaped.

const SPECIAL_CHARS: &[char] = &[
    '\\', '\n', '\t', '/', '(', ')', '[', ']', '$', ' ', '&', '<', '>', '+', '-', '|', '!', '{',
    '}', '^', '~', '?', ':', '=', '\'', '"', '@', '.', '#', '*', '\u{3000}',
];

/// Backslash-escape every character in `SPECIAL_CHARS` found in `s`.
pub fn escape_query(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if SPECIAL_CHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_every_special_character() {
        for &c in SPECIAL_CHARS {
            let input = format!("a{c}b");
            let escaped = escape_query(&input);
            assert_eq!(escaped, format!("a\\{c}b"), "failed for {c:?}");
        }
    }

    #[test]
    fn backslash_escaped_first_and_not_double_escaped() {
        let escaped = escape_query("a\\b");
        assert_eq!(escaped, "a\\\\b");
    }

    #[test]
    fn plain_text_untouched() {
        assert_eq!(escape_query("hello"), "hello");
    }
}
