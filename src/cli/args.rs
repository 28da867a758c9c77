//! Command-line argument parsing for filemcp
//!
//! Provides clap-based CLI and root directory resolution.

use crate::errors::{Result, ServerError};
use crate::tools::security::ConfinementStrategy;
use clap::Parser;
use std::path::{Component, Path, PathBuf};

/// filemcp - read-only filesystem tools confined to one root directory
#[derive(Parser, Debug)]
#[command(name = "filemcp")]
#[command(version)]
#[command(about = "Serve read-only filesystem tools confined to a root directory", long_about = None)]
pub struct Args {
    /// Root directory all tools are confined to (home directory by default)
    #[arg(value_name = "ROOT")]
    pub root: Option<PathBuf>,

    /// Use the stdio transport
    #[arg(long)]
    pub stdio: bool,

    /// Enable logging
    #[arg(long)]
    pub log: bool,

    /// Log file path, used with --log (stderr otherwise)
    #[arg(long, value_name = "PATH")]
    pub logfile: Option<PathBuf>,

    /// Protocol log file path
    #[arg(long, value_name = "PATH")]
    pub logproto: Option<PathBuf>,

    /// Path confinement strategy
    #[arg(long, value_enum)]
    pub strategy: Option<ConfinementStrategy>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -v (debug), -vv (trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Check that a transport was selected
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.stdio {
            return Err("--stdio must be specified".to_string());
        }
        Ok(())
    }

    /// Resolve the root directory argument
    pub fn root_dir(&self) -> Result<PathBuf> {
        resolve_root(self.root.as_deref())
    }
}

/// Turn the root argument into an absolute path to an existing directory.
///
/// Without an argument the home directory is used, falling back to the
/// current directory. Relative paths are made absolute against the current
/// directory and cleaned lexically; symlinks are left in place.
pub fn resolve_root(arg: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;

    let requested = match arg {
        Some(path) => path.to_path_buf(),
        None => dirs::home_dir().unwrap_or_else(|| cwd.clone()),
    };

    let absolute = lexical_absolute(&cwd, &requested);

    let metadata = std::fs::metadata(&absolute).map_err(|e| ServerError::InvalidRoot {
        path: absolute.display().to_string(),
        reason: e.to_string(),
    })?;

    if !metadata.is_dir() {
        return Err(ServerError::InvalidRoot {
            path: absolute.display().to_string(),
            reason: "not a directory".to_string(),
        });
    }

    Ok(absolute)
}

fn lexical_absolute(cwd: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let mut cleaned = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}
