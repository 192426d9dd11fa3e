//! Append-only corpus output.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use textcrawl_shared::{Result, TextCrawlError};

/// Writes one fragment per line, straight through to the underlying writer.
pub struct CorpusSink<W: Write> {
    writer: W,
    path: PathBuf,
    lines_written: usize,
}

impl CorpusSink<File> {
    /// Open `path` for appending, creating it and its parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TextCrawlError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| TextCrawlError::io(path, e))?;

        Ok(Self {
            writer: file,
            path: path.to_path_buf(),
            lines_written: 0,
        })
    }
}

impl<W: Write> CorpusSink<W> {
    /// Wrap an arbitrary writer; `label` is only used in error messages.
    pub fn new(writer: W, label: impl Into<PathBuf>) -> Self {
        Self {
            writer,
            path: label.into(),
            lines_written: 0,
        }
    }

    /// Append `text` followed by a newline.
    pub fn append(&mut self, text: &str) -> Result<()> {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .map_err(|e| TextCrawlError::io(&self.path, e))?;
        self.lines_written += 1;
        Ok(())
    }

    /// Lines appended through this sink (not counting prior file content).
    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer
            .flush()
            .map_err(|e| TextCrawlError::io(&self.path, e))?;
        Ok(self.writer)
    }
}
