//! Parsing and serialization of keyed (KEY=VALUE) files.
//!
//! The keyed model is deliberately lossy about layout: comments and blank
//! lines are skipped on parse, and serialization emits keys in lexical
//! order. Values are never lossy: everything after the first `=` is kept
//! verbatim, and an empty value (`KEY=`) is a present value, distinct from
//! an absent key.

use std::collections::BTreeMap;

use crate::errors::EnvFileError;

/// Parse a KEY=VALUE document into a key-ordered mapping.
///
/// Rules:
/// - blank lines and lines starting with `#` are skipped;
/// - a leading `export ` prefix is stripped (shell-style env files);
/// - the key is everything before the first `=`, trimmed;
/// - the value is everything after the first `=`, verbatim;
/// - a non-comment line without `=`, or a duplicate key, is an error;
///   content is never silently dropped.
pub fn parse(file_name: &str, content: &str) -> Result<BTreeMap<String, String>, EnvFileError> {
    let mut map = BTreeMap::new();

    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim_start();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((key, value)) = line.split_once('=') else {
            return Err(EnvFileError::MalformedLine {
                file: file_name.to_string(),
                line: idx + 1,
            });
        };

        let key = key.trim().to_string();
        if map.contains_key(&key) {
            return Err(EnvFileError::DuplicateKey {
                file: file_name.to_string(),
                key,
                line: idx + 1,
            });
        }
        map.insert(key, value.to_string());
    }

    Ok(map)
}

/// Serialize a mapping back to KEY=VALUE lines.
///
/// Keys are emitted in lexical order (the map's iteration order) so output
/// is deterministic and diff-friendly. An empty mapping serializes to the
/// empty string.
#[must_use]
pub fn serialize(map: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in map {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let content = "DATABASE_URL=postgres://localhost/db\nAPI_KEY=secret\n";
        let map = parse(".env", content).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get("DATABASE_URL").map(String::as_str),
            Some("postgres://localhost/db")
        );
        assert_eq!(map.get("API_KEY").map(String::as_str), Some("secret"));
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let content = "# production settings\n\nA=1\n   # indented comment\nB=2\n";
        let map = parse(".env", content).unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_parse_export_prefix() {
        let map = parse(".env", "export PATH_EXTRA=/opt/bin\n").unwrap();
        assert_eq!(map.get("PATH_EXTRA").map(String::as_str), Some("/opt/bin"));
    }

    #[test]
    fn test_parse_value_kept_verbatim() {
        // Equals signs, quotes, and spaces after the first '=' are content.
        let map = parse(".env", "OPTS=\"a=b c=d\" \n").unwrap();
        assert_eq!(map.get("OPTS").map(String::as_str), Some("\"a=b c=d\" "));
    }

    #[test]
    fn test_empty_value_is_present() {
        let map = parse(".env", "EMPTY=\n").unwrap();
        assert_eq!(map.get("EMPTY").map(String::as_str), Some(""));
    }

    #[test]
    fn test_malformed_line_is_error() {
        let err = parse(".env", "A=1\nnot a pair\n").unwrap_err();
        assert!(matches!(
            err,
            EnvFileError::MalformedLine { line: 2, .. }
        ));
    }

    #[test]
    fn test_duplicate_key_is_error() {
        let err = parse(".env", "A=1\nA=2\n").unwrap_err();
        assert!(matches!(
            err,
            EnvFileError::DuplicateKey { ref key, line: 2, .. } if key == "A"
        ));
    }

    #[test]
    fn test_serialize_sorted_with_trailing_newline() {
        let mut map = BTreeMap::new();
        map.insert("ZED".to_string(), "26".to_string());
        map.insert("ALPHA".to_string(), "1".to_string());
        assert_eq!(serialize(&map), "ALPHA=1\nZED=26\n");
    }

    #[test]
    fn test_serialize_empty() {
        assert_eq!(serialize(&BTreeMap::new()), "");
    }

    #[test]
    fn test_round_trip_values() {
        let original = "B=two words\nA=1\nC=\n";
        let map = parse(".env", original).unwrap();
        let rendered = serialize(&map);
        assert_eq!(rendered, "A=1\nB=two words\nC=\n");
        assert_eq!(parse(".env", &rendered).unwrap(), map);
    }
}
