use crate::error::{IocmanError, Result};
use chrono::Local;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs::OpenOptions;

/// Upper bound on same-second disambiguators tried before giving up
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// LogSink creates one log artifact per launch inside a single directory.
///
/// The artifact reference handed out is the file's path, so any file-serving
/// layer can stream it without a separate lookup table.
#[derive(Debug, Clone)]
pub struct LogSink {
    /// Directory where all log files are stored
    log_dir: PathBuf,
}

/// An open log artifact ready to receive a child's combined output
#[derive(Debug)]
pub struct BoundLog {
    path: PathBuf,
    file: File,
}

impl LogSink {
    /// Create a new LogSink, creating the log directory if needed
    ///
    /// # Arguments
    /// * `log_dir` - Directory where log files will be stored
    ///
    /// # Returns
    /// * `Ok(LogSink)` - Successfully created log sink
    /// * `Err(IocmanError)` - Failed to create log directory
    pub async fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self> {
        let log_dir = log_dir.as_ref().to_path_buf();

        tokio::fs::create_dir_all(&log_dir)
            .await
            .map_err(|e| IocmanError::LogError(format!("Failed to create log directory: {}", e)))?;

        Ok(Self { log_dir })
    }

    /// Allocate a fresh, empty artifact for one launch of `unit_name`.
    ///
    /// Files are named `<unit>_<YYYY-MM-DD_HH-MM-SS>.log`; a second launch
    /// within the same second gets a `-N` suffix. The file is created with
    /// `create_new`, so concurrent allocations can never share an artifact.
    pub async fn allocate(&self, unit_name: &str) -> Result<PathBuf> {
        // The directory may have been removed under us since startup
        tokio::fs::create_dir_all(&self.log_dir)
            .await
            .map_err(|e| IocmanError::LogError(format!("Failed to create log directory: {}", e)))?;

        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = if attempt == 0 {
                format!("{}_{}.log", unit_name, timestamp)
            } else {
                format!("{}_{}-{}.log", unit_name, timestamp, attempt)
            };
            let path = self.log_dir.join(file_name);

            let created = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            match created {
                Ok(_) => return Ok(path),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(IocmanError::LogFileError(format!(
                        "Failed to create {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        Err(IocmanError::LogError(format!(
            "Exhausted log file names for {} at {}",
            unit_name, timestamp
        )))
    }

    /// Open an allocated artifact for appending
    pub async fn bind(&self, log_ref: &Path) -> Result<BoundLog> {
        let file = OpenOptions::new()
            .append(true)
            .open(log_ref)
            .await
            .map_err(|e| {
                IocmanError::LogFileError(format!("Failed to open {}: {}", log_ref.display(), e))
            })?;

        Ok(BoundLog {
            path: log_ref.to_path_buf(),
            file: file.into_std().await,
        })
    }

    /// Best-effort removal of an artifact whose launch never happened
    pub async fn discard(&self, log_ref: &Path) {
        if let Err(e) = tokio::fs::remove_file(log_ref).await {
            tracing::debug!(log = %log_ref.display(), "Failed to discard log file: {}", e);
        }
    }

    /// Map a bare file name (as served under `/logs/<file>`) to its artifact path
    pub fn resolve(&self, file_name: &str) -> Result<PathBuf> {
        if file_name.is_empty()
            || file_name == "."
            || file_name == ".."
            || file_name.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
        {
            return Err(IocmanError::LogNotFound(file_name.to_string()));
        }

        let path = self.log_dir.join(file_name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(IocmanError::LogNotFound(path.display().to_string()))
        }
    }

    /// Open an artifact for streaming its bytes
    pub async fn open_artifact(&self, log_ref: &Path) -> Result<tokio::fs::File> {
        if !log_ref.starts_with(&self.log_dir) {
            return Err(IocmanError::LogNotFound(log_ref.display().to_string()));
        }

        tokio::fs::File::open(log_ref).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => IocmanError::LogNotFound(log_ref.display().to_string()),
            _ => IocmanError::LogFileError(format!("Failed to open {}: {}", log_ref.display(), e)),
        })
    }

    /// Get the log directory path
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

impl BoundLog {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Split into stdout/stderr handles sharing one open file description.
    ///
    /// Both handles are owned by the spawn command and closed as soon as it
    /// is dropped, so the supervisor never buffers child output.
    pub fn into_stdio(self) -> Result<(Stdio, Stdio)> {
        let stderr = self.file.try_clone().map_err(|e| {
            IocmanError::LogFileError(format!(
                "Failed to duplicate handle for {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok((Stdio::from(self.file), Stdio::from(stderr)))
    }
}
