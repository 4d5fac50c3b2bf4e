// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Follows a log file as it grows, `tail -F` style.
//!
//! # Behavior
//!
//! ```text
//!   read_until('\n') ──> complete line ──> yield
//!         │
//!         v (EOF)
//!   stat(path) ──┬── same file, same size  ──> sleep(poll_interval)
//!                ├── same file, shorter     ──> truncated: rewind to 0
//!                ├── different file         ──> rotated: drain old handle, reopen path
//!                └── missing                ──> keep waiting on the old handle
//! ```
//!
//! Only newline-terminated lines are yielded; a trailing fragment is held until the rest
//! of the line is written. Read errors never end the stream: the handle is dropped and the
//! path reopened on the next poll.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::Stream;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::OpenError;

/// Where a freshly opened source starts reading. Rotated files are always read from the start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TailStart {
    /// Replay the whole file.
    Beginning,
    /// Only yield lines written after the source was opened.
    #[default]
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailOptions {
    pub poll_interval: Duration,
    pub start: TailStart,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            start: TailStart::End,
        }
    }
}

/// One line read from the monitored file, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    /// 1-based line number within the current file generation.
    pub number: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(meta: &std::fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_meta: &std::fs::Metadata) -> Option<Self> {
        None
    }
}

/// Position in the monitored file plus the identity of the file it refers to.
///
/// The offset only moves forward, except when truncation or rotation is detected; it is
/// then reset to the start of the new file generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailCursor {
    consumed: u64,
    identity: Option<FileIdentity>,
    generation: u64,
}

impl TailCursor {
    /// Bytes of the current file already turned into lines (or deliberately skipped).
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.consumed
    }

    /// Incremented every time the source restarts at the start of a file.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

enum FileChange {
    Unchanged,
    Truncated,
    Rotated,
}

pub struct LineSource {
    path: PathBuf,
    options: TailOptions,
    reader: Option<BufReader<File>>,
    cursor: TailCursor,
    pending: Vec<u8>,
    line_number: u64,
    // Opened at the end of a file whose last line was still being written.
    skip_partial: bool,
    // The path names a different file now; finish the old handle, then switch.
    rotated: bool,
    consecutive_errors: u32,
}

impl LineSource {
    /// Opens `path` for tailing.
    ///
    /// Fails with [`OpenError`] if the path does not exist, is not readable, or is a
    /// directory.
    pub async fn open(path: impl Into<PathBuf>, options: TailOptions) -> Result<Self, OpenError> {
        let path = path.into();
        let open_error = |source| OpenError {
            path: path.clone(),
            source,
        };

        let mut file = File::open(&path).await.map_err(open_error)?;
        let meta = file.metadata().await.map_err(open_error)?;
        if meta.is_dir() {
            return Err(open_error(std::io::Error::new(
                ErrorKind::InvalidInput,
                "path is a directory",
            )));
        }

        let mut consumed = 0;
        let mut skip_partial = false;
        if options.start == TailStart::End && meta.len() > 0 {
            file.seek(SeekFrom::Start(meta.len() - 1))
                .await
                .map_err(open_error)?;
            let last = file.read_u8().await.map_err(open_error)?;
            skip_partial = last != b'\n';
            consumed = meta.len();
        }

        debug!(
            "TAIL | Opened {} at offset {consumed} ({:?})",
            path.display(),
            options.start
        );

        Ok(Self {
            path,
            options,
            reader: Some(BufReader::new(file)),
            cursor: TailCursor {
                consumed,
                identity: FileIdentity::of(&meta),
                generation: 0,
            },
            pending: Vec::new(),
            line_number: 0,
            skip_partial,
            rotated: false,
            consecutive_errors: 0,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn cursor(&self) -> TailCursor {
        self.cursor
    }

    /// Waits for and returns the next complete line. Never ends.
    ///
    /// Cancel safe: dropping the future loses no data, partially read bytes stay buffered.
    pub async fn next_line(&mut self) -> Line {
        loop {
            match self.poll_line().await {
                Ok(Some(line)) => {
                    self.consecutive_errors = 0;
                    return line;
                }
                Ok(None) => {
                    self.consecutive_errors = 0;
                }
                Err(e) => {
                    self.consecutive_errors += 1;
                    if self.consecutive_errors == 1 {
                        warn!(
                            "TAIL | Error reading {}, will reopen: {e}",
                            self.path.display()
                        );
                    } else {
                        debug!(
                            "TAIL | Still unable to read {} ({} attempts): {e}",
                            self.path.display(),
                            self.consecutive_errors
                        );
                    }
                    self.reader = None;
                }
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }

    /// Consumes the source as an infinite stream of lines.
    pub fn into_stream(self) -> impl Stream<Item = Line> {
        futures::stream::unfold(self, |mut source| async move {
            let line = source.next_line().await;
            Some((line, source))
        })
    }

    /// Releases the file handle.
    pub fn close(mut self) {
        self.reader = None;
        debug!("TAIL | Closed {}", self.path.display());
    }

    /// Returns the next buffered line, or `None` when there is nothing to read right now.
    async fn poll_line(&mut self) -> std::io::Result<Option<Line>> {
        if self.reader.is_none() {
            self.reopen().await?;
        }

        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };
            let read = reader.read_until(b'\n', &mut self.pending).await?;

            if read > 0 {
                if self.pending.ends_with(b"\n") {
                    let line = self.take_line();
                    if std::mem::take(&mut self.skip_partial) {
                        continue;
                    }
                    return Ok(Some(line));
                }
                continue;
            }

            if self.rotated {
                self.rotated = false;
                self.reader = None;
                if let Some(line) = self.take_remainder() {
                    // The next poll opens the new file.
                    return Ok(Some(line));
                }
                self.reopen().await?;
                continue;
            }

            match self.check_file().await? {
                FileChange::Unchanged => return Ok(None),
                FileChange::Rotated => {
                    info!(
                        "TAIL | {} was rotated, finishing previous file",
                        self.path.display()
                    );
                    // One more pass over the old handle picks up late writes.
                    self.rotated = true;
                }
                FileChange::Truncated => {
                    info!(
                        "TAIL | {} was truncated, restarting at offset 0",
                        self.path.display()
                    );
                    if let Some(reader) = self.reader.as_mut() {
                        reader.seek(SeekFrom::Start(0)).await?;
                    }
                    self.reset(self.cursor.identity);
                }
            }
        }
    }

    async fn check_file(&self) -> std::io::Result<FileChange> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            // Moved away and not recreated yet; the old handle is still valid.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(FileChange::Unchanged),
            Err(e) => return Err(e),
        };

        let identity = FileIdentity::of(&meta);
        if identity.is_some() && identity != self.cursor.identity {
            return Ok(FileChange::Rotated);
        }
        if meta.len() < self.position() {
            return Ok(FileChange::Truncated);
        }
        Ok(FileChange::Unchanged)
    }

    /// Opens the path again. Resumes at the cursor when it is still the same file, otherwise
    /// starts a new generation at offset 0.
    async fn reopen(&mut self) -> std::io::Result<()> {
        let mut file = File::open(&self.path).await?;
        let meta = file.metadata().await?;
        let identity = FileIdentity::of(&meta);

        self.pending.clear();
        let same_file = identity.is_some() && identity == self.cursor.identity;
        if same_file && meta.len() >= self.cursor.consumed {
            file.seek(SeekFrom::Start(self.cursor.consumed)).await?;
            debug!(
                "TAIL | Reopened {} at offset {}",
                self.path.display(),
                self.cursor.consumed
            );
        } else {
            self.reset(identity);
            info!("TAIL | Following new file at {}", self.path.display());
        }

        self.reader = Some(BufReader::new(file));
        Ok(())
    }

    fn reset(&mut self, identity: Option<FileIdentity>) {
        self.cursor = TailCursor {
            consumed: 0,
            identity,
            generation: self.cursor.generation + 1,
        };
        self.pending.clear();
        self.line_number = 0;
        self.skip_partial = false;
    }

    fn position(&self) -> u64 {
        self.cursor.consumed + self.pending.len() as u64
    }

    fn take_line(&mut self) -> Line {
        self.cursor.consumed += self.pending.len() as u64;
        let mut end = self.pending.len();
        if self.pending[..end].ends_with(b"\n") {
            end -= 1;
        }
        if self.pending[..end].ends_with(b"\r") {
            end -= 1;
        }
        let text = String::from_utf8_lossy(&self.pending[..end]).into_owned();
        self.pending.clear();
        self.line_number += 1;
        Line {
            text,
            number: self.line_number,
        }
    }

    // Unterminated last line of a file that was rotated away.
    fn take_remainder(&mut self) -> Option<Line> {
        if self.pending.is_empty() {
            return None;
        }
        let line = self.take_line();
        if std::mem::take(&mut self.skip_partial) {
            return None;
        }
        Some(line)
    }
}

impl std::fmt::Debug for LineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineSource")
            .field("path", &self.path)
            .field("cursor", &self.cursor)
            .field("pending", &self.pending.len())
            .field("open", &self.reader.is_some())
            .finish()
    }
}
