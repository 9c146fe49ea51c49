//! Destination file lifecycle for one transfer.
//!
//! Bytes go to `<destination>.part`; only a complete, synced body is renamed
//! to the destination path, so the destination never holds a truncated file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Suffix of the in-progress file.
pub const PART_SUFFIX: &str = ".part";

/// `clip.mp4` → `clip.mp4.part`.
pub fn part_path(destination: &Path) -> PathBuf {
    let mut o = destination.as_os_str().to_owned();
    o.push(PART_SUFFIX);
    PathBuf::from(o)
}

/// Delete `path`, treating "already gone" as success. Other failures are logged.
pub(crate) fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "could not remove partial file: {}", e),
    }
}

/// Exclusively owned writer for a transfer's `.part` file.
pub struct PartFile {
    writer: BufWriter<File>,
    part_path: PathBuf,
    destination: PathBuf,
    written: u64,
}

impl PartFile {
    /// Create parent directories and open a fresh `.part` file.
    /// An existing destination is left alone; `commit` replaces it.
    pub fn create(destination: &Path) -> io::Result<Self> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let part_path = part_path(destination);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&part_path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            part_path,
            destination: destination.to_path_buf(),
            written: 0,
        })
    }

    pub fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush, sync, close and rename onto the destination. Returns the byte count.
    /// On failure the `.part` file is removed.
    pub fn commit(self) -> io::Result<u64> {
        let PartFile {
            writer,
            part_path,
            destination,
            written,
        } = self;
        let result = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .and_then(|file| {
                file.sync_all()?;
                drop(file);
                fs::rename(&part_path, &destination)
            });
        match result {
            Ok(()) => Ok(written),
            Err(e) => {
                remove_quietly(&part_path);
                Err(e)
            }
        }
    }

    /// Close and delete the `.part` file (best-effort).
    pub fn discard(self) {
        let PartFile {
            writer, part_path, ..
        } = self;
        drop(writer);
        remove_quietly(&part_path);
    }
}
