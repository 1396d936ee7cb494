//! Newline-delimited submission file.
//!
//! The file may be read by the scheduler while it is still being written,
//! so every record is appended as one line and flushed immediately.

use fnflow_core::Job;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Append-only writer of job records.
pub struct SubmissionFile {
    path: PathBuf,
    file: File,
    records: usize,
}

impl SubmissionFile {
    /// Start a fresh file at `path`, discarding any earlier content.
    pub async fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Self::with_options(path.as_ref(), OpenOptions::new().write(true).truncate(true)).await
    }

    /// Open `path` for appending, keeping existing records.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Self::with_options(path.as_ref(), OpenOptions::new().append(true)).await
    }

    async fn with_options(path: &Path, options: &mut OpenOptions) -> std::io::Result<Self> {
        let path = path.to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file = options.create(true).open(&path).await?;

        Ok(Self {
            path,
            file,
            records: 0,
        })
    }

    /// Append one record and flush it.
    pub async fn append(&mut self, job: &Job) -> std::io::Result<()> {
        let mut line = job.to_line()?;
        line.push('\n');
        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await?;
        self.records += 1;
        Ok(())
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written through this handle.
    pub fn records(&self) -> usize {
        self.records
    }
}
