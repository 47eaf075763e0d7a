//! Tracked-file discovery.
//!
//! Walks the configured root directory and classifies each file against the
//! keyed, opaque, and ignore glob patterns. Names are `/`-separated paths
//! relative to the root, so the same file has the same identity on every
//! machine regardless of platform path separators.

use std::fs;
use std::path::Path;

use glob_match::glob_match;
use tracing::{debug, warn};

use crate::errors::DiscoveryError;
use crate::merge::FileKind;
use crate::models::TrackedFile;

/// Glob rules deciding which files are tracked and how they merge.
///
/// Ignore patterns win over everything; keyed patterns win over opaque when
/// both match. A file matching no pattern is not tracked.
#[derive(Debug, Clone, Default)]
pub struct TrackRules {
    pub keyed: Vec<String>,
    pub opaque: Vec<String>,
    pub ignore: Vec<String>,
}

impl TrackRules {
    /// Classify a relative file name. `None` means the file is not tracked.
    #[must_use]
    pub fn classify(&self, name: &str) -> Option<FileKind> {
        if self.ignore.iter().any(|p| glob_match(p, name)) {
            return None;
        }
        if self.keyed.iter().any(|p| glob_match(p, name)) {
            return Some(FileKind::Keyed);
        }
        if self.opaque.iter().any(|p| glob_match(p, name)) {
            return Some(FileKind::Opaque);
        }
        None
    }
}

/// Walk `root` and return every tracked file, sorted by name.
pub fn discover(root: &Path, rules: &TrackRules) -> Result<Vec<TrackedFile>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::RootNotFound(root.display().to_string()));
    }

    let mut files = Vec::new();
    walk(root, root, rules, &mut files)?;
    files.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(root = %root.display(), count = files.len(), "discovered tracked files");
    Ok(files)
}

fn walk(
    root: &Path,
    dir: &Path,
    rules: &TrackRules,
    out: &mut Vec<TrackedFile>,
) -> Result<(), DiscoveryError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            walk(root, &path, rules, out)?;
            continue;
        }

        let name = relative_name(root, &path);
        let Some(kind) = rules.classify(&name) else {
            continue;
        };

        let bytes = fs::read(&path)?;
        let content = String::from_utf8(bytes).map_err(|_| {
            warn!(name = %name, "tracked file is not UTF-8 text");
            DiscoveryError::NotText(name.clone())
        })?;

        out.push(TrackedFile {
            name,
            kind,
            content,
        });
    }
    Ok(())
}

/// Relative `/`-separated name of `path` under `root`.
fn relative_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> TrackRules {
        TrackRules {
            keyed: vec!["**/.env".into(), "**/*.env".into()],
            opaque: vec!["**/*.json".into(), "**/*.toml".into()],
            ignore: vec![".git/**".into(), "**/*.local".into()],
        }
    }

    fn write(root: &Path, name: &str, content: &[u8]) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_classify_precedence() {
        let rules = rules();
        assert_eq!(rules.classify(".env"), Some(FileKind::Keyed));
        assert_eq!(rules.classify("app/settings.json"), Some(FileKind::Opaque));
        assert_eq!(rules.classify("prod.env.local"), None);
        assert_eq!(rules.classify(".git/config"), None);
        assert_eq!(rules.classify("README.md"), None);
    }

    #[test]
    fn test_discover_sorted_relative_names() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.env", b"B=1\n");
        write(dir.path(), "app/config.json", b"{}\n");
        write(dir.path(), "notes.txt", b"untracked\n");

        let files = discover(dir.path(), &rules()).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["app/config.json", "b.env"]);
        assert_eq!(files[0].kind, FileKind::Opaque);
        assert_eq!(files[1].kind, FileKind::Keyed);
        assert_eq!(files[1].content, "B=1\n");
    }

    #[test]
    fn test_ignored_directory_files_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".git/objects/pack.env", b"X=1\n");
        write(dir.path(), "real.env", b"A=1\n");

        let files = discover(dir.path(), &rules()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "real.env");
    }

    #[test]
    fn test_missing_root_is_error() {
        let err = discover(Path::new("/definitely/not/here"), &rules()).unwrap_err();
        assert!(matches!(err, DiscoveryError::RootNotFound(_)));
    }

    #[test]
    fn test_non_utf8_tracked_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.env", &[0xff, 0xfe, 0x00]);

        let err = discover(dir.path(), &rules()).unwrap_err();
        assert!(matches!(err, DiscoveryError::NotText(name) if name == "bad.env"));
    }
}
