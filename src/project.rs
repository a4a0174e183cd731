use std::io::Write;
use std::path::{Path, PathBuf};

use ignore::{DirEntry, WalkBuilder};

use crate::error::Error;
use crate::marker::{IgnoredMarker, MarkerRegistry};
use crate::rewrite::{MarkerPolicy, RewriteResult, rewrite, rewrite_source};

/// What happened to one `.rs` file that mentions the marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// Path relative to the project root.
    pub path: PathBuf,
    pub instrumented: Vec<String>,
    pub skipped: Vec<String>,
    pub ignored: Vec<IgnoredMarker>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectReport {
    /// Files that mention the marker, sorted by path.
    pub files: Vec<FileReport>,
    /// Files copied without being parsed.
    pub copied: usize,
}

impl ProjectReport {
    pub fn instrumented_count(&self) -> usize {
        self.files.iter().map(|f| f.instrumented.len()).sum()
    }
}

/// Copy the project at `project_root` into `out_dir`, rewriting every Rust
/// source file that mentions the marker.
///
/// Respects .gitignore, skips `target/` at the project root, and skips
/// `out_dir` itself when it lives inside the project. Files that never
/// mention the marker are copied byte-for-byte without being parsed.
pub fn rewrite_project(
    project_root: &Path,
    out_dir: &Path,
    registry: &MarkerRegistry,
    policy: MarkerPolicy,
) -> Result<ProjectReport, Error> {
    if !project_root.is_dir() {
        return Err(Error::NotFound(project_root.to_path_buf()));
    }
    if out_dir.exists() && std::fs::read_dir(out_dir)?.next().is_some() {
        return Err(Error::OutputNotEmpty(out_dir.to_path_buf()));
    }
    std::fs::create_dir_all(out_dir)?;

    let project_root = std::fs::canonicalize(project_root)?;
    let out_abs = std::fs::canonicalize(out_dir)?;

    let walker = WalkBuilder::new(&project_root)
        .hidden(false)
        .follow_links(true)
        .filter_entry(move |entry| !is_root_target(entry) && entry.path() != out_abs.as_path())
        .build();

    let mut report = ProjectReport::default();
    for entry in walker {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        let source = entry.path();
        let relative = source
            .strip_prefix(&project_root)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let dest = out_dir.join(relative);

        if entry.file_type().is_some_and(|ft| ft.is_dir()) {
            std::fs::create_dir_all(&dest)?;
        } else if entry.file_type().is_some_and(|ft| ft.is_file()) {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            if source.extension().is_some_and(|ext| ext == "rs") {
                match stage_source(source, &dest, relative, registry, policy)? {
                    Some(file_report) => report.files.push(file_report),
                    None => report.copied += 1,
                }
            } else {
                std::fs::copy(source, &dest)?;
                report.copied += 1;
            }
        }
    }

    report.files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(report)
}

/// Rewrite one source file into `dest`. Returns `None` when the file never
/// mentions the marker and was copied as-is.
fn stage_source(
    source: &Path,
    dest: &Path,
    relative: &Path,
    registry: &MarkerRegistry,
    policy: MarkerPolicy,
) -> Result<Option<FileReport>, Error> {
    let text = std::fs::read_to_string(source).map_err(|e| Error::ReadError {
        path: relative.to_path_buf(),
        source: e,
    })?;
    if !text.contains(registry.marker_kind().name()) {
        std::fs::write(dest, text)?;
        return Ok(None);
    }

    let file = syn::parse_file(&text).map_err(|e| Error::ParseError {
        path: relative.to_path_buf(),
        source: e,
    })?;
    let scan = registry.scan(&file);
    for ignored in &scan.ignored {
        tracing::warn!(
            file = %relative.display(),
            line = ignored.line,
            item = %ignored.item,
            "{}",
            ignored.reason
        );
    }
    let rewritten = rewrite(file, registry, policy);
    std::fs::write(dest, rewritten.render(&text))?;

    Ok(Some(FileReport {
        path: relative.to_path_buf(),
        instrumented: rewritten.instrumented,
        skipped: rewritten.skipped,
        ignored: scan.ignored,
    }))
}

/// Rewrite `path` in place. The new contents replace the file atomically
/// through a temporary file in the same directory; an unchanged file is not
/// touched.
pub fn rewrite_file_in_place(
    path: &Path,
    registry: &MarkerRegistry,
    policy: MarkerPolicy,
) -> Result<RewriteResult, Error> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let result = rewrite_source(&text, registry, policy).map_err(|source| Error::ParseError {
        path: path.to_path_buf(),
        source,
    })?;
    if result.source == text {
        return Ok(result);
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(result.source.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(result)
}

/// Skip target/ only at the walk root (depth 1).
fn is_root_target(entry: &DirEntry) -> bool {
    entry.depth() == 1 && entry.file_name().to_string_lossy() == "target"
}

/// Recursively find all `.rs` files under `dir`, honouring .gitignore and
/// skipping `target/` at the top level.
pub fn find_rust_files(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(dir)
        .hidden(false)
        .filter_entry(|entry| !is_root_target(entry))
        .build();
    for entry in walker {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        let path = entry.path();
        if entry.file_type().is_some_and(|ft| ft.is_file())
            && path.extension().is_some_and(|ext| ext == "rs")
        {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}
