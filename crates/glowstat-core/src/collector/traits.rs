//! Abstractions over the host interfaces the collector depends on.
//!
//! The `FileSystem` trait covers reads from the `/proc` and `/sys` pseudo
//! filesystems, and `CommandRunner` covers the external enumeration and
//! vendor query utilities (`lsblk`, `nvidia-smi`, `vcgencmd`). Both have an
//! in-memory double in [`crate::collector::mock`] so collection logic can be
//! tested without a Linux host.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Creates a new `RealFs` instance.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }
}

/// Abstraction for invoking external utilities and capturing their stdout.
///
/// A non-zero exit status is reported as an error; callers treat any error
/// as "this utility is unavailable" and degrade accordingly.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args`, returning captured stdout on success.
    fn run(&self, program: &str, args: &[&str]) -> io::Result<String>;
}

/// Real command runner built on `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealRunner;

impl RealRunner {
    /// Creates a new `RealRunner` instance.
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for RealRunner {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<String> {
        let output = Command::new(program).args(args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(io::Error::other(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn real_fs_read_to_string() {
        let fs = RealFs::new();
        let cargo_toml = env::current_dir().unwrap().join("Cargo.toml");
        let content = fs.read_to_string(&cargo_toml).unwrap();
        assert!(content.contains("[package]"));
    }

    #[test]
    fn real_fs_exists() {
        let fs = RealFs::new();
        let cargo_toml = env::current_dir().unwrap().join("Cargo.toml");
        assert!(fs.exists(&cargo_toml));
        assert!(!fs.exists(Path::new("/nonexistent/path/12345")));
    }

    #[test]
    fn real_fs_read_dir() {
        let fs = RealFs::new();
        let src_dir = env::current_dir().unwrap().join("src");
        let entries = fs.read_dir(&src_dir).unwrap();
        assert!(!entries.is_empty());
    }
}
