//! JSONL substrate: one JSON value per line.
//!
//! Shared by fact streams and plan stores. Blank lines and `#` comments are
//! skipped on read. Files are checked for NUL bytes and invalid UTF-8 before
//! parsing, and replaced atomically on write.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Read one value per non-blank, non-comment line, with its line number.
pub fn read_records<T: DeserializeOwned>(
    reader: impl BufRead,
) -> Result<Vec<(usize, T)>, JsonlError> {
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| JsonlError::Io(line_no + 1, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: T = serde_json::from_str(trimmed)
            .map_err(|e| JsonlError::Parse(line_no + 1, e.to_string()))?;
        records.push((line_no + 1, record));
    }
    Ok(records)
}

/// Write one value per line.
pub fn write_records<'a, T: Serialize + 'a>(
    writer: &mut impl Write,
    records: impl IntoIterator<Item = &'a T>,
) -> Result<(), JsonlError> {
    for record in records {
        let line =
            serde_json::to_string(record).map_err(|e| JsonlError::Serialize(e.to_string()))?;
        writeln!(writer, "{line}").map_err(|e| JsonlError::Write(e.to_string()))?;
    }
    Ok(())
}

/// Open a JSONL file after checking it is clean UTF-8 text.
pub fn open_checked(path: &Path) -> Result<BufReader<std::io::Cursor<Vec<u8>>>, JsonlError> {
    let bytes = fs::read(path).map_err(|e| file_error(path, e))?;
    validate_substrate_bytes(path, &bytes)?;
    Ok(BufReader::new(std::io::Cursor::new(bytes)))
}

/// Replace `path` with whatever `fill` writes: temp file, fsync, rename.
pub fn write_atomic(
    path: &Path,
    fill: impl FnOnce(&mut BufWriter<File>) -> Result<(), JsonlError>,
) -> Result<(), JsonlError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| file_error(parent, e))?;
    }

    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), JsonlError> {
        let file = File::create(&tmp_path).map_err(|e| file_error(&tmp_path, e))?;
        let mut writer = BufWriter::new(file);
        fill(&mut writer)?;
        writer.flush().map_err(|e| file_error(&tmp_path, e))?;
        let file = writer
            .into_inner()
            .map_err(|e| file_error(&tmp_path, e.into_error()))?;
        file.sync_all().map_err(|e| file_error(&tmp_path, e))?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        file_error(path, e)
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        let dir = File::open(parent).map_err(|e| file_error(parent, e))?;
        dir.sync_all().map_err(|e| file_error(parent, e))?;
    }

    Ok(())
}

fn file_error(path: &Path, source: std::io::Error) -> JsonlError {
    JsonlError::File {
        path: path.display().to_string(),
        source,
    }
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

fn validate_substrate_bytes(path: &Path, bytes: &[u8]) -> Result<(), JsonlError> {
    if bytes.contains(&0) {
        return Err(JsonlError::Corrupt(format!(
            "{}: contains NUL byte(s)",
            path.display()
        )));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(JsonlError::Corrupt(format!(
            "{}: contains non-UTF-8 byte sequence(s)",
            path.display()
        )));
    }
    Ok(())
}

/// Errors from JSONL operations.
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("line {0}: I/O error: {1}")]
    Io(usize, String),

    #[error("{path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("write error: {0}")]
    Write(String),

    #[error("line {0}: parse error: {1}")]
    Parse(usize, String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupted substrate: {0}")]
    Corrupt(String),
}
