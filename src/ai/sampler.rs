//! Log file sampling.
//!
//! Two modes: a positional tail read bounded by a byte budget, and a
//! line-by-line keyword search with per-line and match caps. Both are
//! synchronous; callers run them on the blocking pool.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::domain::error::{DomainError, DomainResult};

/// Byte budget for a tail sample.
pub const AI_TAIL_BYTES: u64 = 2 * 1024 * 1024;

/// Upper bound on matches returned by a search.
pub const MAX_FILE_SEARCH_LINES: usize = 2000;

/// Per-line byte cap during a search; longer lines are cut at the cap.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Result of a tail read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailSample {
    pub lines: Vec<String>,
    /// True when the file was larger than the byte budget.
    pub truncated: bool,
}

/// Read the last `tail_bytes` of the file.
///
/// When the slice starts mid-file its first (possibly partial) line is
/// discarded. A NUL byte anywhere in the slice rejects the file as
/// non-text. Trailing CRs are stripped and a trailing empty line is
/// dropped.
pub fn tail_sample(path: &Path, tail_bytes: u64) -> DomainResult<TailSample> {
    let mut file = File::open(path)
        .map_err(|e| DomainError::invalid(format!("cannot open log file: {e}")))?;
    let len = file
        .metadata()
        .map_err(|e| DomainError::Storage(format!("stat failed: {e}")))?
        .len();

    let start = len.saturating_sub(tail_bytes);
    file.seek(SeekFrom::Start(start))
        .map_err(|e| DomainError::Storage(format!("seek failed: {e}")))?;

    let mut buf = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut buf)
        .map_err(|e| DomainError::Storage(format!("read failed: {e}")))?;

    if buf.contains(&0) {
        return Err(DomainError::invalid("file is not a text log; text only"));
    }

    let truncated = start > 0;
    let mut text = String::from_utf8_lossy(&buf).into_owned();
    if truncated {
        // The slice may begin mid-line; drop up to the first newline.
        match text.find('\n') {
            Some(pos) => {
                text.drain(..=pos);
            }
            None => text.clear(),
        }
    }

    let mut lines: Vec<String> = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
        .collect();
    if lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }

    Ok(TailSample { lines, truncated })
}

/// Scan the file for lines containing `query`.
///
/// An empty (post-trim) query yields an empty result, not an error; the
/// endpoint-level validation rejects it earlier. Stops after `limit`
/// matches, capped at [`MAX_FILE_SEARCH_LINES`].
pub fn search_sample(
    path: &Path,
    query: &str,
    limit: usize,
    case_sensitive: bool,
) -> DomainResult<Vec<String>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let limit = limit.clamp(1, MAX_FILE_SEARCH_LINES);
    let folded_query = if case_sensitive {
        query.to_string()
    } else {
        query.to_lowercase()
    };

    let file = File::open(path)
        .map_err(|e| DomainError::invalid(format!("cannot open log file: {e}")))?;
    let mut reader = BufReader::new(file);
    let mut buf: Vec<u8> = Vec::new();
    let mut matches = Vec::new();

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| DomainError::Storage(format!("read failed: {e}")))?;
        if n == 0 {
            break;
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        if buf.len() > MAX_LINE_BYTES {
            buf.truncate(MAX_LINE_BYTES);
        }

        let line = String::from_utf8_lossy(&buf);
        let hit = if case_sensitive {
            line.contains(query)
        } else {
            line.to_lowercase().contains(&folded_query)
        };
        if hit {
            matches.push(line.into_owned());
            if matches.len() >= limit {
                break;
            }
        }
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn tail_reads_whole_small_file() {
        let file = write_fixture(b"first\nsecond\nthird\n");
        let sample = tail_sample(file.path(), AI_TAIL_BYTES).unwrap();
        assert_eq!(sample.lines, vec!["first", "second", "third"]);
        assert!(!sample.truncated);
    }

    #[test]
    fn tail_strips_cr_and_trailing_empty_line() {
        let file = write_fixture(b"a\r\nb\r\n");
        let sample = tail_sample(file.path(), AI_TAIL_BYTES).unwrap();
        assert_eq!(sample.lines, vec!["a", "b"]);
    }

    #[test]
    fn tail_of_large_file_drops_partial_first_line() {
        let mut content = Vec::new();
        for i in 0..200 {
            content.extend_from_slice(format!("line number {i:04}\n").as_bytes());
        }
        let file = write_fixture(&content);

        // Budget of 64 bytes lands mid-line.
        let sample = tail_sample(file.path(), 64).unwrap();
        assert!(sample.truncated);
        assert!(!sample.lines.is_empty());
        // Every surviving line is complete.
        for line in &sample.lines {
            assert!(line.starts_with("line number "), "{line:?}");
        }
        assert_eq!(sample.lines.last().unwrap(), "line number 0199");
    }

    #[test]
    fn tail_rejects_binary_content() {
        let file = write_fixture(b"ok line\n\x00binary\n");
        let err = tail_sample(file.path(), AI_TAIL_BYTES).unwrap_err();
        assert!(err.to_string().contains("text only"), "{err}");
    }

    #[test]
    fn search_finds_matches_case_insensitively() {
        let file = write_fixture(b"INFO ok\nERROR disk full\nwarn error rate\nINFO done\n");
        let hits = search_sample(file.path(), "error", 100, false).unwrap();
        assert_eq!(hits, vec!["ERROR disk full", "warn error rate"]);
    }

    #[test]
    fn search_respects_case_flag() {
        let file = write_fixture(b"ERROR one\nerror two\n");
        let hits = search_sample(file.path(), "ERROR", 100, true).unwrap();
        assert_eq!(hits, vec!["ERROR one"]);
    }

    #[test]
    fn search_stops_at_limit() {
        let mut content = Vec::new();
        for i in 0..50 {
            content.extend_from_slice(format!("error {i}\n").as_bytes());
        }
        let file = write_fixture(&content);
        let hits = search_sample(file.path(), "error", 10, false).unwrap();
        assert_eq!(hits.len(), 10);
        assert_eq!(hits[0], "error 0");
    }

    #[test]
    fn search_empty_query_returns_empty_list() {
        let file = write_fixture(b"error\n");
        assert!(search_sample(file.path(), "  ", 10, false).unwrap().is_empty());
    }
}
