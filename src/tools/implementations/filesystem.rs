//! Confined filesystem operations
//!
//! `RootedFs` is the only thing in the crate that touches the filesystem.
//! It is scoped to one root boundary and only ever opens paths produced by
//! its `PathConfiner` (or, for search, the root itself):
//! - read_file: whole contents of a file
//! - list_directory: immediate children of a directory
//! - search_files: recursive base-name glob search from the root
//! - get_file_info: metadata without reading contents

use crate::errors::{FsError, FsResult, Result};
use crate::tools::security::{build_confiner, ConfinementStrategy, PathConfiner, RootBoundary};
use crate::tools::types::{DirectoryEntry, DirectoryListing, FileContent, FileStat, SearchResult};
use chrono::{DateTime, Local, SecondsFormat};
use glob::{MatchOptions, Pattern};
use std::fs;
use std::io;
use std::path::{Component, Path};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

/// Base names only; `*` and `?` match leading dots so hidden files are found
const SEARCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Filesystem capability scoped to a root boundary
#[derive(Debug, Clone)]
pub struct RootedFs {
    confiner: Arc<dyn PathConfiner>,
}

impl RootedFs {
    pub fn new(confiner: Arc<dyn PathConfiner>) -> Self {
        Self { confiner }
    }

    /// Build the confiner for `strategy` and wrap it
    pub fn with_strategy(root: RootBoundary, strategy: ConfinementStrategy) -> Result<Self> {
        Ok(Self::new(build_confiner(strategy, root)?))
    }

    pub fn root(&self) -> &RootBoundary {
        self.confiner.root()
    }

    pub fn strategy(&self) -> ConfinementStrategy {
        self.confiner.strategy()
    }

    /// Read the entire file at `path`
    pub fn read_file(&self, path: &str) -> FsResult<FileContent> {
        let confined = self.confiner.confine(path)?;

        let is_dir = confined.is_root()
            || fs::metadata(confined.absolute())
                .map_err(|e| FsError::from_io(path, e))?
                .is_dir();
        if is_dir {
            return Err(FsError::IsADirectory {
                path: path.to_string(),
            });
        }

        let content = fs::read(confined.absolute()).map_err(|e| FsError::from_io(path, e))?;
        debug!(path = confined.relative(), bytes = content.len(), "read file");

        Ok(FileContent {
            path: path.to_string(),
            content,
        })
    }

    /// List the immediate children of the directory at `path`
    ///
    /// Entry metadata is taken without following symlinks.
    pub fn list_directory(&self, path: &str) -> FsResult<DirectoryListing> {
        let confined = self.confiner.confine(path)?;

        let metadata = fs::metadata(confined.absolute()).map_err(|e| FsError::from_io(path, e))?;
        if !metadata.is_dir() {
            return Err(FsError::NotADirectory {
                path: path.to_string(),
            });
        }

        let read_dir = fs::read_dir(confined.absolute()).map_err(|e| FsError::from_io(path, e))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| io_failure(path, e))?;
            let file_type = entry.file_type().map_err(|e| io_failure(path, e))?;

            let is_dir = file_type.is_dir();
            let size = if is_dir {
                0
            } else {
                entry.metadata().map_err(|e| io_failure(path, e))?.len()
            };

            entries.push(DirectoryEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size,
                is_dir,
            });
        }

        debug!(path = confined.relative(), entries = entries.len(), "listed directory");

        Ok(DirectoryListing {
            path: path.to_string(),
            count: entries.len(),
            entries,
        })
    }

    /// Walk the whole root and collect every non-directory entry whose base
    /// name matches `pattern`
    ///
    /// The pattern is compiled before the walk starts. Any walk error aborts
    /// the search; partial matches are dropped.
    pub fn search_files(&self, pattern: &str) -> FsResult<SearchResult> {
        let matcher = Pattern::new(&collapse_stars(pattern)).map_err(|e| FsError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.msg.to_string(),
        })?;

        let root = self.root().path();
        let mut matches = Vec::new();

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| walk_failure(root, e))?;
            if entry.file_type().is_dir() {
                continue;
            }

            if !matcher.matches_with(&entry.file_name().to_string_lossy(), SEARCH_OPTIONS) {
                continue;
            }

            let relative = entry.path().strip_prefix(root).map_err(|_| FsError::IoFailure {
                path: pattern.to_string(),
                source: io::Error::new(io::ErrorKind::Other, "walk left the root boundary"),
            })?;
            matches.push(to_slash(relative));
        }

        debug!(pattern, matches = matches.len(), "searched files");

        Ok(SearchResult {
            pattern: pattern.to_string(),
            count: matches.len(),
            matches,
        })
    }

    /// Metadata for `path`; the empty path reports the root itself
    pub fn get_file_info(&self, path: &str) -> FsResult<FileStat> {
        let confined = self.confiner.confine(path)?;

        let metadata = fs::metadata(confined.absolute()).map_err(|e| FsError::from_io(path, e))?;
        let modified = metadata.modified().map_err(|e| io_failure(path, e))?;
        let is_dir = metadata.is_dir();

        Ok(FileStat {
            path: path.to_string(),
            size: if is_dir { 0 } else { metadata.len() },
            is_dir,
            mod_time: format_mod_time(modified),
            mode: mode_string(&metadata),
        })
    }
}

/// Runs of `*` mean the same as one `*` within a base name. `glob` would
/// otherwise read `**` as a recursive wildcard and reject `a**b`.
fn collapse_stars(pattern: &str) -> String {
    let mut collapsed = String::with_capacity(pattern.len());
    let mut prev_star = false;
    for c in pattern.chars() {
        if c == '*' && prev_star {
            continue;
        }
        prev_star = c == '*';
        collapsed.push(c);
    }
    collapsed
}

fn io_failure(path: &str, source: io::Error) -> FsError {
    FsError::IoFailure {
        path: path.to_string(),
        source,
    }
}

/// Walk errors report the root-relative path only
fn walk_failure(root: &Path, err: walkdir::Error) -> FsError {
    let path = err
        .path()
        .and_then(|p| p.strip_prefix(root).ok())
        .map(to_slash)
        .unwrap_or_default();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop detected"));
    FsError::IoFailure { path, source }
}

/// Join normal components with `/` regardless of platform
fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// RFC 3339 in local time, `Z` when the offset is zero
pub fn format_mod_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Type letters followed by `rwx` triplets, e.g. `drwxr-xr-x`
#[cfg(unix)]
pub fn mode_string(metadata: &fs::Metadata) -> String {
    use std::os::unix::fs::{FileTypeExt, PermissionsExt};

    let mode = metadata.permissions().mode();
    let file_type = metadata.file_type();
    let mut out = String::with_capacity(12);

    if file_type.is_dir() {
        out.push('d');
    }
    if file_type.is_symlink() {
        out.push('L');
    }
    if file_type.is_block_device() || file_type.is_char_device() {
        out.push('D');
    }
    if file_type.is_fifo() {
        out.push('p');
    }
    if file_type.is_socket() {
        out.push('S');
    }
    if mode & 0o4000 != 0 {
        out.push('u');
    }
    if mode & 0o2000 != 0 {
        out.push('g');
    }
    if file_type.is_char_device() {
        out.push('c');
    }
    if mode & 0o1000 != 0 {
        out.push('t');
    }
    if out.is_empty() {
        out.push('-');
    }

    push_permission_bits(&mut out, mode);
    out
}

/// Only the read-only flag is available; mirror it onto every class
#[cfg(not(unix))]
pub fn mode_string(metadata: &fs::Metadata) -> String {
    let is_dir = metadata.is_dir();
    let mut mode = if metadata.permissions().readonly() { 0o444 } else { 0o666 };
    if is_dir {
        mode |= 0o111;
    }

    let mut out = String::from(if is_dir { "d" } else { "-" });
    push_permission_bits(&mut out, mode);
    out
}

fn push_permission_bits(out: &mut String, mode: u32) {
    for (i, c) in "rwxrwxrwx".chars().enumerate() {
        if mode & (1 << (8 - i)) != 0 {
            out.push(c);
        } else {
            out.push('-');
        }
    }
}
