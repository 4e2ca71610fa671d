//! Backward chunked tail reading for append-only log files.
//!
//! The reader walks a file from its end toward its start in fixed-size
//! chunks, reassembling logical lines (LF-terminated; the final line may be
//! unterminated) without ever reading the file from the front. A scan that
//! stops early hands back a [`Cursor`] that resumes the walk with no gap and
//! no overlap. Bytes are treated as single-byte code units; multi-byte
//! encodings are out of scope and non-UTF-8 bytes are replaced on output.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

mod cursor;

pub use cursor::{Cursor, CursorDecodeError};

pub const DEFAULT_CHUNK_CAPACITY: usize = 64 * 1024;

/// One tail query against a file.
#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub path: PathBuf,
    /// Keep a line only if it contains this substring.
    pub filter: Option<String>,
    /// Resume point from a previous read. When set, `skip` is ignored:
    /// the cursor and the skip count are mutually exclusive ways of
    /// positioning the scan, and the cursor wins.
    pub cursor: Option<Cursor>,
    /// Number of line boundaries to cross before collecting starts.
    pub skip: u64,
    /// Maximum number of lines to return.
    pub want: usize,
}

impl ReadRequest {
    pub fn new(path: impl Into<PathBuf>, want: usize) -> Self {
        Self {
            path: path.into(),
            filter: None,
            cursor: None,
            skip: 0,
            want,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResult {
    /// Collected lines, newest first.
    pub lines: Vec<String>,
    /// Present iff the scan stopped before reaching byte 0 of the file.
    pub next_cursor: Option<Cursor>,
}

impl ReadResult {
    fn empty() -> Self {
        Self {
            lines: Vec::new(),
            next_cursor: None,
        }
    }
}

#[derive(Debug)]
pub enum TailError {
    NotFound(PathBuf),
    Io { path: PathBuf, source: io::Error },
    InvalidCursor(String),
}

impl TailError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::Io { path, source } => {
                write!(f, "error reading {}: {source}", path.display())
            }
            Self::InvalidCursor(message) => write!(f, "invalid cursor: {message}"),
        }
    }
}

impl std::error::Error for TailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Reads the last N logical lines of a file by scanning backward in chunks.
///
/// The reader itself is just configuration (the chunk capacity); every call
/// to [`TailReader::read`] opens its own handle and owns its own buffers, so
/// a single reader may serve concurrent calls.
#[derive(Debug, Clone)]
pub struct TailReader {
    chunk_capacity: usize,
}

impl Default for TailReader {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_CAPACITY)
    }
}

impl TailReader {
    /// Capacity is clamped to at least one byte; the algorithm is correct
    /// for any capacity, including capacities smaller than a single line.
    pub fn new(chunk_capacity: usize) -> Self {
        Self {
            chunk_capacity: chunk_capacity.max(1),
        }
    }

    pub fn read(&self, request: &ReadRequest) -> Result<ReadResult, TailError> {
        let path = request.path.as_path();
        let mut file = File::open(path).map_err(|err| TailError::from_io(path, err))?;
        // Size is snapshotted once; all offset arithmetic for this call
        // uses this value even if the file is appended to concurrently.
        let size = file
            .metadata()
            .map_err(|err| TailError::from_io(path, err))?
            .len();
        if size == 0 {
            return Ok(ReadResult::empty());
        }

        let remaining = match request.cursor {
            Some(cursor) if cursor.offset() > size => {
                return Err(TailError::InvalidCursor(format!(
                    "offset {} is past the end of the file ({size} bytes)",
                    cursor.offset()
                )));
            }
            Some(cursor) => cursor.offset(),
            None => size,
        };
        if remaining == 0 {
            return Ok(ReadResult::empty());
        }

        let skip = if request.cursor.is_some() {
            0
        } else {
            request.skip
        };

        let mut chunk = vec![0u8; self.chunk_capacity];
        let mut lines: Vec<String> = Vec::new();
        // Bytes of a line whose terminator has been seen but whose start has
        // not, accumulated in reverse. A line may straddle any number of
        // chunk boundaries, so this lives outside the chunk loop.
        let mut partial: Vec<u8> = Vec::new();
        let mut bytes_consumed: u64 = 0;
        let mut lines_seen: u64 = 0;
        let mut stop_boundary: Option<u64> = None;

        'chunks: while bytes_consumed < remaining && lines.len() < request.want {
            let left = remaining - bytes_consumed;
            // The final chunk shrinks so no byte is read twice in one call.
            let read_len = u64::min(left, self.chunk_capacity as u64) as usize;
            let chunk_start = left - read_len as u64;
            file.seek(SeekFrom::Start(chunk_start))
                .map_err(|err| TailError::from_io(path, err))?;
            file.read_exact(&mut chunk[..read_len])
                .map_err(|err| TailError::from_io(path, err))?;
            bytes_consumed += read_len as u64;

            for i in (0..read_len).rev() {
                let offset = chunk_start + i as u64;
                if chunk[i] == b'\n' {
                    if offset + 1 == remaining {
                        // The very first byte scanned: either the file's
                        // trailing terminator or, on resume, the terminator
                        // the cursor points just past. No line lives after
                        // it, so it is not a boundary.
                        continue;
                    }
                    lines_seen += 1;
                    if lines_seen > skip {
                        flush(&mut partial, request.filter.as_deref(), &mut lines);
                        if lines.len() == request.want {
                            stop_boundary = Some(offset);
                            break 'chunks;
                        }
                    }
                } else if lines_seen >= skip {
                    partial.push(chunk[i]);
                }
            }

            if chunk_start == 0 && !partial.is_empty() {
                // Reached the physical start of the file with an
                // unterminated first line.
                flush(&mut partial, request.filter.as_deref(), &mut lines);
            }
        }

        // A boundary at offset 0 leaves nothing upstream but its own
        // terminator; resuming there could never deliver another line.
        let next_cursor = stop_boundary
            .filter(|&offset| offset > 0)
            .map(|offset| Cursor::new(offset + 1));
        Ok(ReadResult { lines, next_cursor })
    }
}

/// Completes the line accumulated in `partial` and appends it to `lines` if
/// it passes the filter. The buffer is cleared either way.
fn flush(partial: &mut Vec<u8>, filter: Option<&str>, lines: &mut Vec<String>) {
    partial.reverse();
    let line = String::from_utf8_lossy(partial).into_owned();
    partial.clear();
    match filter {
        Some(needle) if !line.contains(needle) => {}
        _ => lines.push(line),
    }
}
