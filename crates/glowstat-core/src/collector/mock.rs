//! In-memory doubles for [`FileSystem`] and [`CommandRunner`].
//!
//! `MockFs` simulates the `/proc` and `/sys` trees in memory, and
//! `MockRunner` serves canned utility output, so collector tests run on any
//! platform. Clones share the same backing store: a test can hold one clone
//! and mutate files between ticks while the collector reads through another.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::collector::traits::{CommandRunner, FileSystem};

#[derive(Debug, Default)]
struct MockFsInner {
    files: HashMap<PathBuf, String>,
    directories: HashSet<PathBuf>,
}

/// In-memory filesystem for testing.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    inner: Arc<RwLock<MockFsInner>>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content. Parent directories are created
    /// automatically.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        let mut inner = self.inner.write().unwrap();

        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                inner.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }

        inner.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut inner = self.inner.write().unwrap();

        inner.directories.insert(path.clone());
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                inner.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }

    /// Removes a file, simulating a source that disappeared between ticks.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.inner.write().unwrap().files.remove(path.as_ref());
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.inner
            .read()
            .unwrap()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display()))
            })
    }

    fn exists(&self, path: &Path) -> bool {
        let inner = self.inner.read().unwrap();
        inner.files.contains_key(path) || inner.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let inner = self.inner.read().unwrap();
        if !inner.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}", path.display()),
            ));
        }

        let mut entries: Vec<PathBuf> = inner
            .files
            .keys()
            .chain(inner.directories.iter())
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        entries.sort();
        entries.dedup();
        Ok(entries)
    }
}

/// Canned response store for external utility invocations, keyed by program
/// name.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    responses: Arc<RwLock<HashMap<String, Result<String, String>>>>,
}

impl MockRunner {
    /// Creates a new runner with no configured programs. Every invocation
    /// fails with "not found" until a response is registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers successful stdout for a program.
    pub fn respond(&self, program: &str, stdout: impl Into<String>) {
        self.responses
            .write()
            .unwrap()
            .insert(program.to_string(), Ok(stdout.into()));
    }

    /// Registers a failure for a program.
    pub fn fail(&self, program: &str, message: impl Into<String>) {
        self.responses
            .write()
            .unwrap()
            .insert(program.to_string(), Err(message.into()));
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &str, _args: &[&str]) -> io::Result<String> {
        match self.responses.read().unwrap().get(program) {
            Some(Ok(stdout)) => Ok(stdout.clone()),
            Some(Err(message)) => Err(io::Error::other(message.clone())),
            None => Err(io::Error::new(io::ErrorKind::NotFound, program.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_fs_read_and_exists() {
        let fs = MockFs::new();
        fs.add_file("/proc/loadavg", "0.10 0.20 0.30 1/100 999\n");

        assert!(fs.exists(Path::new("/proc/loadavg")));
        assert!(fs.exists(Path::new("/proc")));
        assert_eq!(
            fs.read_to_string(Path::new("/proc/loadavg")).unwrap(),
            "0.10 0.20 0.30 1/100 999\n"
        );
        assert!(fs.read_to_string(Path::new("/proc/uptime")).is_err());
    }

    #[test]
    fn mock_fs_clones_share_storage() {
        let fs = MockFs::new();
        let reader = fs.clone();
        fs.add_file("/sys/class/thermal/thermal_zone0/type", "x86_pkg_temp\n");

        assert!(reader.exists(Path::new("/sys/class/thermal/thermal_zone0/type")));

        fs.remove_file("/sys/class/thermal/thermal_zone0/type");
        assert!(!reader.exists(Path::new("/sys/class/thermal/thermal_zone0/type")));
    }

    #[test]
    fn mock_fs_read_dir_lists_children() {
        let fs = MockFs::new();
        fs.add_file("/sys/class/nvme/nvme0/hwmon2/temp1_input", "35000\n");
        fs.add_dir("/sys/class/nvme/nvme0/power");

        let entries = fs.read_dir(Path::new("/sys/class/nvme/nvme0")).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&PathBuf::from("/sys/class/nvme/nvme0/hwmon2")));
        assert!(entries.contains(&PathBuf::from("/sys/class/nvme/nvme0/power")));
    }

    #[test]
    fn mock_runner_dispatches_by_program() {
        let runner = MockRunner::new();
        runner.respond("vcgencmd", "temp=48.3'C\n");
        runner.fail("nvidia-smi", "driver not loaded");

        assert_eq!(runner.run("vcgencmd", &["measure_temp"]).unwrap(), "temp=48.3'C\n");
        assert!(runner.run("nvidia-smi", &[]).is_err());
        assert!(runner.run("lsblk", &["-J"]).is_err());
    }
}
