// IPC Server - Listens for client connections and handles requests

use crate::error::{IocmanError, Result};
use crate::ipc::{Command, Request, Response, ResponseData};
use std::os::unix::net::UnixListener as StdUnixListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Pause after a failed accept before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// IPC server for handling client connections
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<StdUnixListener>,
}

impl IpcServer {
    /// Create a new IPC server with the default socket path
    pub fn new() -> Self {
        Self::with_socket_path(super::DEFAULT_SOCKET_PATH)
    }

    /// Create a new IPC server with a custom socket path
    pub fn with_socket_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            socket_path: path.as_ref().to_path_buf(),
            listener: None,
        }
    }

    /// Bind the Unix socket, replacing a stale socket file left by a previous daemon
    pub fn start(&mut self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| {
                IocmanError::IpcError(format!("Failed to remove existing socket: {}", e))
            })?;
        }

        let listener = StdUnixListener::bind(&self.socket_path)
            .map_err(|e| IocmanError::IpcError(format!("Failed to bind to socket: {}", e)))?;

        // Set socket permissions to be accessible only by owner (0600)
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, permissions).map_err(|e| {
                IocmanError::IpcError(format!("Failed to set socket permissions: {}", e))
            })?;
        }

        self.listener = Some(listener);
        Ok(())
    }

    /// Run the accept loop, one task per connection. Returns only on listener failure.
    ///
    /// Handler errors are sent back to the client as `Err(message)`; they never
    /// terminate the loop.
    pub async fn run<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: Fn(Command) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<ResponseData>> + Send + 'static,
    {
        let listener = self.async_listener()?;
        let handler = Arc::new(handler);

        tracing::info!("IPC server listening on {}", self.socket_path.display());

        loop {
            let stream = match listener.accept().await {
                Ok((stream, _addr)) => stream,
                Err(e) => {
                    // Errors such as EMFILE persist until a descriptor is released
                    tracing::warn!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };

            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = Self::serve_connection(stream, handler.as_ref()).await {
                    tracing::warn!("IPC connection failed: {}", e);
                }
            });
        }
    }

    fn async_listener(&self) -> Result<UnixListener> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| IocmanError::IpcError("Server not started".to_string()))?
            .try_clone()?;
        listener.set_nonblocking(true)?;

        UnixListener::from_std(listener)
            .map_err(|e| IocmanError::IpcError(format!("Failed to register listener: {}", e)))
    }

    /// Read one request line, dispatch it, write one response line
    async fn serve_connection<F, Fut>(stream: UnixStream, handler: &F) -> Result<()>
    where
        F: Fn(Command) -> Fut,
        Fut: std::future::Future<Output = Result<ResponseData>>,
    {
        let (read_half, mut write_half) = stream.into_split();

        let mut reader = BufReader::new(read_half);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .await
            .map_err(|e| IocmanError::IpcError(format!("Failed to read request: {}", e)))?;

        let request: Request = serde_json::from_str(&request_line).map_err(|e| {
            IocmanError::DeserializationError(format!("Failed to deserialize request: {}", e))
        })?;

        tracing::debug!(id = request.id, command = ?request.command, "IPC request");

        let response = match handler(request.command).await {
            Ok(data) => Response::success(request.id, data),
            Err(e) => Response::error(request.id, e.to_string()),
        };

        let mut response_json = serde_json::to_string(&response).map_err(|e| {
            IocmanError::SerializationError(format!("Failed to serialize response: {}", e))
        })?;
        response_json.push('\n');

        write_half
            .write_all(response_json.as_bytes())
            .await
            .map_err(|e| IocmanError::IpcError(format!("Failed to write response: {}", e)))?;
        write_half
            .flush()
            .await
            .map_err(|e| IocmanError::IpcError(format!("Failed to flush stream: {}", e)))?;

        Ok(())
    }

    /// Stop the server and clean up the socket file
    pub fn stop(&mut self) -> Result<()> {
        self.listener = None;

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| {
                IocmanError::IpcError(format!("Failed to remove socket file: {}", e))
            })?;
        }

        Ok(())
    }

    /// Get the socket path being used
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Default for IpcServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        // Clean up socket file on drop
        let _ = self.stop();
    }
}
