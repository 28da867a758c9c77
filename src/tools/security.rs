//! Path confinement for the root boundary
//!
//! Every caller path is resolved through a `PathConfiner` before any
//! filesystem operation runs. Two implementations:
//! - `LexicalConfiner`: normalize, then separator-aware prefix check
//! - `ResolvingConfiner`: lexical check, then resolve symlinks against the
//!   real filesystem and check again

use crate::errors::{FsError, FsResult, Result, ServerError};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;
use tracing::warn;

/// The single directory all operations are confined to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootBoundary {
    root: PathBuf,
}

impl RootBoundary {
    /// Create a boundary from an absolute path to an existing directory.
    ///
    /// The path is kept as given; symlinks in it are not resolved.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();

        if !root.is_absolute() {
            return Err(ServerError::InvalidRoot {
                path: root.display().to_string(),
                reason: "path must be absolute".to_string(),
            });
        }

        let metadata = std::fs::metadata(root).map_err(|e| ServerError::InvalidRoot {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;

        if !metadata.is_dir() {
            return Err(ServerError::InvalidRoot {
                path: root.display().to_string(),
                reason: "not a directory".to_string(),
            });
        }

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Same boundary with every symlink in it resolved
    pub fn canonicalize(&self) -> Result<Self> {
        let root = self.root.canonicalize().map_err(|e| ServerError::InvalidRoot {
            path: self.root.display().to_string(),
            reason: format!("failed to canonicalize: {}", e),
        })?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }
}

/// A caller path that has been proven to lie inside the root boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfinedPath {
    absolute: PathBuf,
    relative: String,
}

impl ConfinedPath {
    /// Location on disk; only handed to filesystem calls, never to callers
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// Cleaned, `/`-separated path relative to the root ("" for the root)
    pub fn relative(&self) -> &str {
        &self.relative
    }

    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }
}

/// Confinement strategy selectable from the command line or config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConfinementStrategy {
    /// Normalize-and-prefix-check, no filesystem access
    Lexical,
    /// Lexical check plus symlink resolution against the filesystem
    Resolving,
}

impl ConfinementStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfinementStrategy::Lexical => "lexical",
            ConfinementStrategy::Resolving => "resolving",
        }
    }
}

impl Default for ConfinementStrategy {
    fn default() -> Self {
        ConfinementStrategy::Resolving
    }
}

impl fmt::Display for ConfinementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves untrusted caller paths against a fixed root
pub trait PathConfiner: Send + Sync + fmt::Debug {
    /// Boundary every confined path lies under
    fn root(&self) -> &RootBoundary;

    /// Resolve `caller` or fail with `FsError::PathRejected` on escape
    fn confine(&self, caller: &str) -> FsResult<ConfinedPath>;

    fn strategy(&self) -> ConfinementStrategy;
}

/// Build the confiner for `strategy`, shared across all operations
pub fn build_confiner(
    strategy: ConfinementStrategy,
    root: RootBoundary,
) -> Result<Arc<dyn PathConfiner>> {
    Ok(match strategy {
        ConfinementStrategy::Lexical => Arc::new(LexicalConfiner::new(root)),
        ConfinementStrategy::Resolving => Arc::new(ResolvingConfiner::new(root)?),
    })
}

/// Check that `candidate` is `root` itself or lies below it.
///
/// Compares raw path bytes. A bare prefix match is not enough: the byte
/// after the root must be a separator, otherwise `/home/mike` would accept
/// `/home/mike2`.
pub fn is_within(root: &Path, candidate: &Path) -> bool {
    let root = root.as_os_str().as_encoded_bytes();
    let candidate = candidate.as_os_str().as_encoded_bytes();

    if candidate == root {
        return true;
    }

    let sep = MAIN_SEPARATOR as u8;
    let trimmed = match root.last() {
        Some(&last) if last == sep => &root[..root.len() - 1],
        _ => root,
    };

    candidate.len() > trimmed.len()
        && candidate.starts_with(trimmed)
        && candidate[trimmed.len()] == sep
}

/// Split a caller path into clean normal segments.
///
/// `\` counts as a separator on every platform. Empty and `.` segments are
/// dropped and `..` pops; popping past the start is an escape.
fn clean_segments(caller: &str) -> FsResult<Vec<String>> {
    if caller.contains('\0') {
        return Err(FsError::rejected(caller));
    }

    let normalized = caller.replace('\\', "/");
    if normalized.starts_with('/') || has_drive_prefix(&normalized) {
        return Err(FsError::rejected(caller));
    }

    let as_path = Path::new(caller);
    if as_path.is_absolute() || as_path.has_root() {
        return Err(FsError::rejected(caller));
    }

    let mut segments: Vec<String> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    return Err(FsError::rejected(caller));
                }
            }
            name => {
                // Platform-specific prefixes (e.g. `C:` on Windows) are not plain names
                let mut components = Path::new(name).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => segments.push(name.to_string()),
                    _ => return Err(FsError::rejected(caller)),
                }
            }
        }
    }

    Ok(segments)
}

/// `C:` and `C:\` are drive-relative and absolute on Windows
#[cfg(windows)]
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// A colon is an ordinary file name character elsewhere
#[cfg(not(windows))]
fn has_drive_prefix(_path: &str) -> bool {
    false
}

/// Strategy A: purely lexical confinement
#[derive(Debug, Clone)]
pub struct LexicalConfiner {
    root: RootBoundary,
}

impl LexicalConfiner {
    pub fn new(root: RootBoundary) -> Self {
        Self { root }
    }
}

impl PathConfiner for LexicalConfiner {
    fn root(&self) -> &RootBoundary {
        &self.root
    }

    fn confine(&self, caller: &str) -> FsResult<ConfinedPath> {
        let segments = clean_segments(caller).map_err(|e| {
            warn!(path = caller, "rejected caller path");
            e
        })?;

        let mut absolute = self.root.path().to_path_buf();
        for segment in &segments {
            absolute.push(segment);
        }

        if !is_within(self.root.path(), &absolute) {
            warn!(path = caller, "joined path left the root boundary");
            return Err(FsError::rejected(caller));
        }

        Ok(ConfinedPath {
            absolute,
            relative: segments.join("/"),
        })
    }

    fn strategy(&self) -> ConfinementStrategy {
        ConfinementStrategy::Lexical
    }
}

/// Strategy B: lexical check, then resolution against the real filesystem.
///
/// The root is canonicalized once. Each candidate is canonicalized too (or,
/// when it does not exist yet, its deepest existing ancestor is), so a
/// symlink pointing outside the root is rejected.
#[derive(Debug, Clone)]
pub struct ResolvingConfiner {
    lexical: LexicalConfiner,
}

impl ResolvingConfiner {
    pub fn new(root: RootBoundary) -> Result<Self> {
        Ok(Self {
            lexical: LexicalConfiner::new(root.canonicalize()?),
        })
    }
}

impl PathConfiner for ResolvingConfiner {
    fn root(&self) -> &RootBoundary {
        self.lexical.root()
    }

    fn confine(&self, caller: &str) -> FsResult<ConfinedPath> {
        let lexical = self.lexical.confine(caller)?;

        let resolved =
            resolve_existing(lexical.absolute()).map_err(|e| FsError::from_io(caller, e))?;

        if !is_within(self.root().path(), &resolved) {
            warn!(path = caller, "symlink resolves outside the root boundary");
            return Err(FsError::rejected(caller));
        }

        Ok(ConfinedPath {
            absolute: resolved,
            relative: lexical.relative,
        })
    }

    fn strategy(&self) -> ConfinementStrategy {
        ConfinementStrategy::Resolving
    }
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the
/// components below it
fn resolve_existing(path: &Path) -> io::Result<PathBuf> {
    let mut missing: Vec<OsString> = Vec::new();
    let mut current = path;

    loop {
        match current.canonicalize() {
            Ok(mut resolved) => {
                for name in missing.iter().rev() {
                    resolved.push(name);
                }
                return Ok(resolved);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                match (current.parent(), current.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name.to_os_string());
                        current = parent;
                    }
                    _ => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup_root() -> (RootBoundary, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = RootBoundary::new(temp_dir.path()).unwrap();
        (root, temp_dir)
    }

    fn confiners(root: &RootBoundary) -> Vec<Box<dyn PathConfiner>> {
        vec![
            Box::new(LexicalConfiner::new(root.clone())),
            Box::new(ResolvingConfiner::new(root.clone()).unwrap()),
        ]
    }

    #[test]
    fn test_root_creation_nonexistent() {
        assert!(RootBoundary::new("/nonexistent/path/12345").is_err());
    }

    #[test]
    fn test_root_must_be_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "test").unwrap();
        assert!(RootBoundary::new(&file).is_err());
    }

    #[test]
    fn test_root_must_be_absolute() {
        assert!(RootBoundary::new("relative/dir").is_err());
    }

    #[test]
    fn test_empty_and_dot_are_root() {
        let (root, _temp) = setup_root();

        for confiner in confiners(&root) {
            for caller in ["", ".", "./", "./.", "a/.."] {
                let confined = confiner.confine(caller).unwrap();
                assert!(confined.is_root(), "{} should be the root", caller);
                assert_eq!(confined.absolute(), confiner.root().path());
            }
        }
    }

    #[test]
    fn test_nested_paths_confine() {
        let (root, temp_dir) = setup_root();
        fs::create_dir_all(temp_dir.path().join("a/b/c")).unwrap();
        fs::write(temp_dir.path().join("a/b/c/file.txt"), "test").unwrap();

        for confiner in confiners(&root) {
            let confined = confiner.confine("a/b/c/file.txt").unwrap();
            assert_eq!(confined.relative(), "a/b/c/file.txt");
            assert!(confined.absolute().starts_with(confiner.root().path()));

            let confined = confiner.confine("a//b/./c/../c/file.txt").unwrap();
            assert_eq!(confined.relative(), "a/b/c/file.txt");
        }
    }

    #[test]
    fn test_reject_absolute_paths() {
        let (root, _temp) = setup_root();

        for confiner in confiners(&root) {
            for caller in ["/", "/etc/passwd", "//server/share", "\\etc\\passwd"] {
                let err = confiner.confine(caller).unwrap_err();
                assert_eq!(err.kind(), "path_rejected", "{} should be rejected", caller);
            }
        }
    }

    #[cfg(windows)]
    #[test]
    fn test_reject_drive_prefixes() {
        let (root, _temp) = setup_root();

        for confiner in confiners(&root) {
            for caller in ["C:\\Windows", "c:foo", "C:/Windows"] {
                let err = confiner.confine(caller).unwrap_err();
                assert_eq!(err.kind(), "path_rejected", "{} should be rejected", caller);
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_colon_names_are_plain_files() {
        let (root, temp_dir) = setup_root();
        fs::write(temp_dir.path().join("c:notes.txt"), "colon").unwrap();

        for confiner in confiners(&root) {
            let confined = confiner.confine("c:notes.txt").unwrap();
            assert_eq!(confined.relative(), "c:notes.txt");
            assert_eq!(confined.absolute(), confiner.root().path().join("c:notes.txt"));
        }
    }

    #[test]
    fn test_security_multiple_escape_attempts() {
        let (root, _temp) = setup_root();

        let escape_attempts = [
            "..",
            "../..",
            "../../../etc/passwd",
            "./../../../",
            "subdir/../../escape",
            "subdir/../../..",
            "a/b/../../../outside.txt",
            "..\\outside.txt",
            "./../outside.txt",
            "a\0b",
        ];

        for confiner in confiners(&root) {
            for attempt in escape_attempts {
                let err = confiner.confine(attempt).unwrap_err();
                assert_eq!(err.kind(), "path_rejected", "Escape attempt should fail: {:?}", attempt);
            }
        }
    }

    #[test]
    fn test_sibling_with_shared_prefix_rejected() {
        let parent = tempfile::tempdir().unwrap();
        let boundary = parent.path().join("b");
        let sibling = parent.path().join("b2");
        fs::create_dir(&boundary).unwrap();
        fs::create_dir(&sibling).unwrap();
        fs::write(sibling.join("secret.txt"), "secret").unwrap();

        let root = RootBoundary::new(&boundary).unwrap();
        for confiner in confiners(&root) {
            assert!(confiner.confine("../b2/secret.txt").is_err());
            assert!(confiner.confine("../b2").is_err());
        }

        assert!(!is_within(&boundary, &sibling));
        assert!(!is_within(Path::new("/a/b"), Path::new("/a/b2")));
        assert!(!is_within(Path::new("/home/mike"), Path::new("/home/mike2/x")));
    }

    #[test]
    fn test_is_within() {
        assert!(is_within(Path::new("/a/b"), Path::new("/a/b")));
        assert!(is_within(Path::new("/a/b"), Path::new("/a/b/c")));
        assert!(is_within(Path::new("/a/b/"), Path::new("/a/b/c")));
        assert!(is_within(Path::new("/"), Path::new("/etc")));
        assert!(!is_within(Path::new("/a/b"), Path::new("/a")));
        assert!(!is_within(Path::new("/a/b"), Path::new("/a/bc")));
    }

    #[test]
    fn test_nonexistent_path_in_root() {
        let (root, _temp) = setup_root();

        for confiner in confiners(&root) {
            let confined = confiner.confine("missing/dir/file.txt").unwrap();
            assert_eq!(confined.relative(), "missing/dir/file.txt");
            assert!(confined.absolute().ends_with("missing/dir/file.txt"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_resolving_rejects_symlink_escape() {
        let parent = tempfile::tempdir().unwrap();
        let boundary = parent.path().join("root");
        let outside = parent.path().join("outside");
        fs::create_dir(&boundary).unwrap();
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(&outside, boundary.join("escape")).unwrap();

        let root = RootBoundary::new(&boundary).unwrap();
        let confiner = ResolvingConfiner::new(root.clone()).unwrap();

        let err = confiner.confine("escape/secret.txt").unwrap_err();
        assert_eq!(err.kind(), "path_rejected");
        let err = confiner.confine("escape/not-there-yet.txt").unwrap_err();
        assert_eq!(err.kind(), "path_rejected");

        // Lexical strategy cannot see the link
        let lexical = LexicalConfiner::new(root);
        assert!(lexical.confine("escape/secret.txt").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolving_allows_internal_symlink() {
        let (root, temp_dir) = setup_root();
        fs::create_dir(temp_dir.path().join("real")).unwrap();
        fs::write(temp_dir.path().join("real/file.txt"), "x").unwrap();
        std::os::unix::fs::symlink(temp_dir.path().join("real"), temp_dir.path().join("link"))
            .unwrap();

        let confiner = ResolvingConfiner::new(root).unwrap();
        let confined = confiner.confine("link/file.txt").unwrap();
        assert!(confined.absolute().ends_with("real/file.txt"));
        assert_eq!(confined.relative(), "link/file.txt");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_root_is_canonicalized() {
        let parent = tempfile::tempdir().unwrap();
        let real = parent.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = parent.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let root = RootBoundary::new(&link).unwrap();
        assert_eq!(root.path(), link.as_path());

        let confiner = ResolvingConfiner::new(root).unwrap();
        assert_eq!(confiner.root().path(), real.canonicalize().unwrap());
    }

    #[test]
    fn test_build_confiner_strategy() {
        let (root, _temp) = setup_root();

        let lexical = build_confiner(ConfinementStrategy::Lexical, root.clone()).unwrap();
        assert_eq!(lexical.strategy(), ConfinementStrategy::Lexical);

        let resolving = build_confiner(ConfinementStrategy::Resolving, root).unwrap();
        assert_eq!(resolving.strategy(), ConfinementStrategy::Resolving);
        assert_eq!(ConfinementStrategy::default(), ConfinementStrategy::Resolving);
    }
}
