use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{Result, CALIBRATION_FILE, THREAD_FILE_PREFIX};

/// Filesystem operations used by benchmark writers
pub trait DiskIO: Send + Sync {
    /// Open or create a file for writing, truncating existing content
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn TargetFile>>;
}

/// Write handle for one benchmark target file
pub trait TargetFile: Send {
    /// Write one portion, returning the number of bytes transferred
    fn write_portion(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Force synchronization to disk
    fn sync_all(&mut self) -> io::Result<()>;
}

/// Buffered writes through the OS page cache, matching a plain `fwrite` loop
#[derive(Debug, Clone, Default)]
pub struct PlatformDiskIO;

impl PlatformDiskIO {
    pub fn new() -> Self {
        Self
    }
}

struct PlatformFile {
    file: File,
}

impl TargetFile for PlatformFile {
    fn write_portion(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn sync_all(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}

impl DiskIO for PlatformDiskIO {
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn TargetFile>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Box::new(PlatformFile { file }))
    }
}

/// Path of the file written by the `index`-th (1-based) writer of a phase
pub fn thread_file_path(target_dir: &Path, index: usize) -> PathBuf {
    target_dir.join(format!("{}{}", THREAD_FILE_PREFIX, index))
}

/// Path of the calibration pass file
pub fn calibration_file_path(target_dir: &Path) -> PathBuf {
    target_dir.join(CALIBRATION_FILE)
}

fn is_benchmark_file(name: &str) -> bool {
    if name == CALIBRATION_FILE {
        return true;
    }
    match name.strip_prefix(THREAD_FILE_PREFIX) {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Directory holding the transient benchmark files, cleaned up on drop
pub struct ScratchDir {
    path: PathBuf,
    created: bool,
    cleanup_on_drop: bool,
}

impl ScratchDir {
    /// Use `path` as the benchmark directory, creating it if missing
    pub fn prepare(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let created = if path.is_dir() {
            false
        } else {
            fs::create_dir_all(&path)?;
            debug!("Created scratch directory {}", path.display());
            true
        };

        Ok(Self {
            path,
            created,
            cleanup_on_drop: true,
        })
    }

    /// Disable automatic cleanup (for inspecting written files)
    pub fn keep_on_drop(&mut self) {
        self.cleanup_on_drop = false;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the directory did not exist before `prepare`
    pub fn was_created(&self) -> bool {
        self.created
    }

    /// Remove benchmark files, and the directory itself if we created it
    pub fn cleanup(&self) -> io::Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_str().map(is_benchmark_file).unwrap_or(false) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        if self.created {
            fs::remove_dir(&self.path)?;
        }
        Ok(removed)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.cleanup_on_drop {
            match self.cleanup() {
                Ok(removed) => debug!("Removed {} benchmark files from {}", removed, self.path.display()),
                Err(e) => warn!("Failed to clean up {}: {}", self.path.display(), e),
            }
        }
    }
}
