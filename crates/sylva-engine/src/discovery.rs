//! Source discovery.

use crate::config::Config;
use std::path::{Component, Path, PathBuf};
use sylva_core::SourceLanguage;
use tracing::{debug, warn};

/// A source file selected for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Workspace-relative, `/`-separated. This is the file tag in the graph.
    pub relative: String,
    pub language: SourceLanguage,
    pub size: u64,
    /// blake3 hex digest, filled in by the indexing phase.
    pub hash: Option<String>,
}

/// Files found under a root, plus what was passed over.
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<SourceFile>,
    pub too_large: usize,
    pub ignored: usize,
    pub unreadable: usize,
}

/// Converts a path under `root` to its graph file tag.
pub fn relative_tag(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Walks `root`, honoring `.gitignore` files and the configured filters.
///
/// Results are sorted by tag so every run sees the same order.
pub fn discover(root: &Path, config: &Config) -> Discovery {
    let mut discovery = Discovery::default();

    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_exclude(true)
        .require_git(false)
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                discovery.unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().map_or(false, |t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        let Some(relative) = relative_tag(root, path) else {
            continue;
        };
        if relative
            .split('/')
            .any(|part| config.ignore.iter().any(|ignored| ignored == part))
        {
            discovery.ignored += 1;
            continue;
        }
        let Some(language) = config.language_of(path) else {
            continue;
        };
        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!("Cannot stat {}: {}", relative, e);
                discovery.unreadable += 1;
                continue;
            }
        };
        if size > config.max_file_size {
            debug!("Skipping {} ({} bytes)", relative, size);
            discovery.too_large += 1;
            continue;
        }
        discovery.files.push(SourceFile {
            path: path.to_path_buf(),
            relative,
            language,
            size,
            hash: None,
        });
    }

    discovery.files.sort_by(|a, b| a.relative.cmp(&b.relative));
    discovery
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/lib")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("src/b.ts"), "export const b = 1;").unwrap();
        fs::write(root.join("src/lib/a.js"), "export const a = 1;").unwrap();
        fs::write(root.join("src/readme.md"), "# hi").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "module.exports = 1;").unwrap();
        fs::write(root.join("big.js"), "x".repeat(64)).unwrap();

        let mut config = Config::default();
        config.max_file_size = 32;
        let discovery = discover(root, &config);

        let tags: Vec<_> = discovery.files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(tags, vec!["src/b.ts", "src/lib/a.js"]);
        assert_eq!(discovery.too_large, 1);
        assert_eq!(discovery.files[0].language, SourceLanguage::TypeScript);
    }

    #[test]
    fn test_gitignore_is_honored() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join(".gitignore"), "generated/\n").unwrap();
        fs::create_dir_all(root.join("generated")).unwrap();
        fs::write(root.join("generated/out.js"), "let x;").unwrap();
        fs::write(root.join("main.js"), "let y;").unwrap();

        let discovery = discover(root, &Config::default());
        let tags: Vec<_> = discovery.files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(tags, vec!["main.js"]);
    }

    #[test]
    fn test_relative_tag() {
        let root = Path::new("/work");
        assert_eq!(relative_tag(root, Path::new("/work/src/a.js")).as_deref(), Some("src/a.js"));
        assert_eq!(relative_tag(root, Path::new("/elsewhere/a.js")), None);
    }
}
