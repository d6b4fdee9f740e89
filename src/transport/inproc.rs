//! In-process bus endpoints (`inproc://NAME`).
//!
//! Endpoints live in a process-global name registry. Binding installs an
//! accept queue under the name; connecting creates a paired in-memory duplex
//! stream and hands one half to the listener. Dropping the listener unbinds
//! the name.
//!
//! Used for same-process module/tool connections and throughout the test
//! suite, where no real socket is wanted.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use tokio::io::{duplex, DuplexStream};
use tokio::sync::mpsc;

use crate::error::{BusError, Result};

/// In-memory buffer size of each duplex stream half.
const STREAM_BUFFER_SIZE: usize = 256 * 1024;

type AcceptQueue = mpsc::UnboundedSender<DuplexStream>;

fn registry() -> &'static Mutex<HashMap<String, AcceptQueue>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, AcceptQueue>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Listener side of an in-process endpoint.
pub struct InprocListener {
    name: String,
    incoming: mpsc::UnboundedReceiver<DuplexStream>,
    /// Kept to tell our registry entry apart from a successor's on drop.
    queue: AcceptQueue,
}

impl InprocListener {
    /// Bind an in-process endpoint name.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Bind`] if the name is empty or already bound by
    /// a live listener.
    pub fn bind(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(BusError::Bind {
                endpoint: "inproc://".to_string(),
                reason: "endpoint name is empty".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();

        let mut map = registry().lock().expect("inproc registry poisoned");
        if let Some(existing) = map.get(name) {
            // A dropped listener may have exited without running Drop (e.g.
            // an aborted task); a closed queue counts as unbound.
            if !existing.is_closed() {
                return Err(BusError::Bind {
                    endpoint: format!("inproc://{}", name),
                    reason: "address in use".to_string(),
                });
            }
        }
        map.insert(name.to_string(), tx.clone());

        Ok(Self {
            name: name.to_string(),
            incoming: rx,
            queue: tx,
        })
    }

    /// Accept a single connection.
    pub async fn accept(&mut self) -> Result<DuplexStream> {
        self.incoming.recv().await.ok_or(BusError::ConnectionClosed)
    }

    /// The endpoint name this listener is bound to.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for InprocListener {
    fn drop(&mut self) {
        let mut map = registry().lock().expect("inproc registry poisoned");
        // Only remove the entry if it is still ours; the name may have been
        // rebound already.
        if map
            .get(&self.name)
            .is_some_and(|q| q.same_channel(&self.queue))
        {
            map.remove(&self.name);
        }
    }
}

/// Connect to a bound in-process endpoint.
///
/// # Errors
///
/// Returns [`BusError::ConnectionClosed`] if no live listener is bound under
/// the name.
pub fn connect(name: &str) -> Result<DuplexStream> {
    let queue = registry()
        .lock()
        .expect("inproc registry poisoned")
        .get(name)
        .cloned()
        .ok_or(BusError::ConnectionClosed)?;

    let (listener_half, connector_half) = duplex(STREAM_BUFFER_SIZE);
    queue
        .send(listener_half)
        .map_err(|_| BusError::ConnectionClosed)?;
    Ok(connector_half)
}
