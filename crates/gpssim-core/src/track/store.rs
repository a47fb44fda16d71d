//! Sequential track file reader
//!
//! The store owns the open track file exclusively. It reads one data row per
//! [`TrackStore::next`] call and reports exhaustion explicitly with
//! [`TrackRead::EndOfData`]; reopening is the caller's decision.

use super::fix::NavigationFix;
use super::schema::parse_line;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading or reading a track
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("Track file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to open track file {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed track line: {0}")]
    MalformedLine(String),
}

/// Result of advancing the cursor
#[derive(Debug, Clone, PartialEq)]
pub enum TrackRead {
    /// The next row, parsed (may be invalid)
    Fix(NavigationFix),
    /// No rows remain
    EndOfData,
}

/// Read position within the loaded track
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrackCursor {
    /// Data rows consumed since the header (0 right after open)
    pub line: usize,
    /// Set once a read hits the end of the file
    pub end_of_data: bool,
}

/// Owner of the track file and its cursor
#[derive(Debug, Default)]
pub struct TrackStore {
    path: Option<PathBuf>,
    reader: Option<BufReader<File>>,
    cursor: TrackCursor,
    /// Reused line buffer
    buffer: Vec<u8>,
}

impl TrackStore {
    /// Create an empty store with no track loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a track file and skip its header line
    ///
    /// Any previously open track is closed first, even if opening the new one fails.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), TrackError> {
        let path = path.as_ref();
        self.close();

        if !path.exists() {
            return Err(TrackError::NotFound(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|source| TrackError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);

        // Header row
        self.buffer.clear();
        reader
            .read_until(b'\n', &mut self.buffer)
            .map_err(|source| TrackError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;

        self.reader = Some(reader);
        self.path = Some(path.to_path_buf());
        self.cursor = TrackCursor::default();

        tracing::info!(path = %path.display(), "Track loaded");
        Ok(())
    }

    /// Reopen the current track from the first data row
    pub fn rewind(&mut self) -> Result<(), TrackError> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| TrackError::NotFound(PathBuf::new()))?;
        tracing::debug!(path = %path.display(), "Rewinding track");
        self.open(path)
    }

    /// Read the next data row
    ///
    /// Blank lines are skipped. A read error is logged and treated as end of data.
    pub fn next(&mut self) -> TrackRead {
        let Some(reader) = self.reader.as_mut() else {
            return TrackRead::EndOfData;
        };

        loop {
            self.buffer.clear();
            match reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => {
                    self.cursor.end_of_data = true;
                    return TrackRead::EndOfData;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&self.buffer);
                    if line.trim().is_empty() {
                        continue;
                    }
                    self.cursor.line += 1;
                    let fix = parse_line(&line);
                    if !fix.is_valid() {
                        tracing::debug!(line = self.cursor.line, "Track row has no valid fix");
                    }
                    return TrackRead::Fix(fix);
                }
                Err(e) => {
                    tracing::warn!(error = %e, line = self.cursor.line, "Track read failed");
                    self.cursor.end_of_data = true;
                    return TrackRead::EndOfData;
                }
            }
        }
    }

    /// Release the file
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!("Track closed");
        }
        self.path = None;
        self.cursor = TrackCursor::default();
    }

    /// Whether a track file is open
    pub fn is_loaded(&self) -> bool {
        self.reader.is_some()
    }

    /// Path of the open track
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn cursor(&self) -> TrackCursor {
        self.cursor
    }

    /// Data rows consumed since the last open
    pub fn current_line(&self) -> usize {
        self.cursor.line
    }
}
