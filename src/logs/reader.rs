use crate::error::{IocmanError, Result};
use std::collections::VecDeque;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Read the last N lines from a log artifact
///
/// # Arguments
/// * `file_path` - Path to the log file
/// * `lines` - Number of lines to read from the end
///
/// # Returns
/// * `Ok(Vec<String>)` - Lines in file order (empty if the file does not exist).
///   Bytes that are not valid UTF-8 are replaced with U+FFFD.
/// * `Err(IocmanError)` - Failed to read log file
pub async fn read_last_lines(file_path: &Path, lines: usize) -> Result<Vec<String>> {
    if !file_path.exists() || lines == 0 {
        return Ok(Vec::new());
    }

    let file = File::open(file_path)
        .await
        .map_err(|e| IocmanError::LogFileError(format!("Failed to open log file: {}", e)))?;

    let mut tail = VecDeque::with_capacity(lines.min(1024));
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| IocmanError::LogError(format!("Failed to read log line: {}", e)))?;
        if read == 0 {
            break;
        }

        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }

        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(String::from_utf8_lossy(&buf).into_owned());
    }

    Ok(tail.into_iter().collect())
}
