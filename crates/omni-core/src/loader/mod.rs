//! File loader (C1): walk a repository, apply include/exclude globs, read
//! file bytes, and detect language by extension.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::{Config, DEFAULT_EXCLUDE_DIRS};
use crate::error::{OmniError, OmniResult};
use crate::types::{FileInfo, Language};

/// List every relative path under `repo_root` (optionally scoped to
/// `sub_folder`) that the config's include/exclude rules select.
///
/// When `config.include_patterns` is non-empty, only those globs are
/// honoured and no other ignore list is applied. Otherwise a default glob
/// built from `config.file_extensions` is used together with the built-in
/// exclude list. Dotfiles are always excluded.
pub fn list_files(repo_root: &Path, sub_folder: Option<&Path>, config: &Config) -> OmniResult<Vec<PathBuf>> {
    let root = match sub_folder {
        Some(sub) => repo_root.join(sub),
        None => repo_root.to_path_buf(),
    };

    let includes = build_include_set(config)?;
    let strict = !config.include_patterns.is_empty();

    let mut out = Vec::new();
    walk(&root, repo_root, &includes, strict, &mut out)?;
    out.sort();
    Ok(out)
}

fn build_include_set(config: &Config) -> OmniResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    if config.include_patterns.is_empty() {
        for ext in &config.file_extensions {
            let glob = Glob::new(&format!("**/*.{ext}"))
                .map_err(|e| OmniError::Config { details: e.to_string() })?;
            builder.add(glob);
        }
    } else {
        for pattern in &config.include_patterns {
            let glob = Glob::new(pattern).map_err(|e| OmniError::Config { details: e.to_string() })?;
            builder.add(glob);
        }
    }
    builder.build().map_err(|e| OmniError::Config { details: e.to_string() })
}

fn walk(
    dir: &Path,
    repo_root: &Path,
    includes: &GlobSet,
    strict: bool,
    out: &mut Vec<PathBuf>,
) -> OmniResult<()> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Ok(());
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if name.starts_with('.') && name != "." && name != ".." {
            continue;
        }

        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };

        if file_type.is_dir() {
            if !strict && DEFAULT_EXCLUDE_DIRS.contains(&name.as_ref()) {
                continue;
            }
            walk(&path, repo_root, includes, strict, out)?;
            continue;
        }

        if !file_type.is_file() {
            continue;
        }

        let relative = path.strip_prefix(repo_root).unwrap_or(&path);
        if includes.is_match(relative) {
            out.push(relative.to_path_buf());
        }
    }

    Ok(())
}

/// Read a file's content and metadata into a [`FileInfo`].
pub fn load(repo_root: &Path, relative_path: &Path) -> OmniResult<FileInfo> {
    let absolute = repo_root.join(relative_path);
    let content = std::fs::read_to_string(&absolute)?;
    let metadata = std::fs::metadata(&absolute)?;
    let extension = relative_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    let last_modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    Ok(FileInfo {
        file_path: absolute,
        relative_path: relative_path.to_path_buf(),
        language: detect_language(extension),
        content,
        size: metadata.len(),
        last_modified,
    })
}

/// Map a file extension to a [`Language`] tag; unknown extensions map to
/// [`Language::Unknown`].
pub fn detect_language(extension: &str) -> Language {
    Language::from_extension(extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_list_files_default_extensions_excludes_build_dirs() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/main.rs", "fn main() {}");
        write(dir.path(), "node_modules/pkg/index.js", "module.exports = {}");
        write(dir.path(), ".git/HEAD", "ref: refs/heads/main");
        write(dir.path(), "README.md", "# hi");

        let config = Config::default();
        let files = list_files(dir.path(), None, &config).unwrap();

        assert!(files.contains(&PathBuf::from("src/main.rs")));
        assert!(files.contains(&PathBuf::from("README.md")));
        assert!(!files.iter().any(|p| p.starts_with("node_modules")));
        assert!(!files.iter().any(|p| p.starts_with(".git")));
    }

    #[test]
    fn test_include_patterns_strict_excludes_unmatched_extensions() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.rs", "fn main() {}");
        write(dir.path(), "b.xyz", "whatever");

        let mut config = Config::default();
        config.include_patterns = vec!["**/*.rs".to_string()];
        let files = list_files(dir.path(), None, &config).unwrap();

        assert_eq!(files, vec![PathBuf::from("a.rs")]);
    }

    #[test]
    fn test_dotfiles_always_excluded() {
        let dir = tempdir().unwrap();
        write(dir.path(), ".env.rs", "SECRET=1");
        write(dir.path(), "main.rs", "fn main() {}");

        let config = Config::default();
        let files = list_files(dir.path(), None, &config).unwrap();

        assert_eq!(files, vec![PathBuf::from("main.rs")]);
    }

    #[test]
    fn test_detect_language_unknown_extension() {
        assert_eq!(detect_language("xyz"), Language::Unknown);
        assert_eq!(detect_language("rs"), Language::Rust);
    }

    #[test]
    fn test_load_reads_content_and_metadata() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.rs", "fn main() {}");

        let info = load(dir.path(), Path::new("main.rs")).unwrap();
        assert_eq!(info.content, "fn main() {}");
        assert_eq!(info.language, Language::Rust);
        assert_eq!(info.relative_path, PathBuf::from("main.rs"));
    }
}
