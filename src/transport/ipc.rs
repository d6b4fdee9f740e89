//! Unix-domain-socket bus endpoints (`ipc://PATH`).
//!
//! The listener removes a stale socket file before binding and cleans the
//! file up again when dropped, so a stop/start cycle on the same endpoint
//! does not fail with "address in use".

use std::path::Path;

use tokio::net::{UnixListener, UnixStream};

use crate::error::{BusError, Result};

/// Listener side of a Unix-domain-socket endpoint.
pub struct IpcListener {
    listener: UnixListener,
    path: String,
}

impl IpcListener {
    /// Bind to a Unix socket path, removing any stale socket file first.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Bind`] if the path cannot be bound.
    pub fn bind(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            std::fs::remove_file(path).map_err(|e| BusError::Bind {
                endpoint: format!("ipc://{}", path),
                reason: format!("cannot remove stale socket: {}", e),
            })?;
        }

        let listener = UnixListener::bind(path).map_err(|e| BusError::Bind {
            endpoint: format!("ipc://{}", path),
            reason: e.to_string(),
        })?;

        Ok(Self {
            listener,
            path: path.to_string(),
        })
    }

    /// Accept a single connection.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(stream)
    }

    /// The socket path this listener is bound to.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for IpcListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Connect to a bound Unix-domain-socket endpoint.
pub async fn connect(path: &str) -> Result<UnixStream> {
    Ok(UnixStream::connect(path).await?)
}
