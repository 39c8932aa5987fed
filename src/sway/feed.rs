//! Task Change Feed.
//!
//! Two background threads produce [`FeedUpdate`]s for the UI thread:
//!
//! * the **event listener** subscribes to sway's `window` and `workspace`
//!   events and re-queries the tree whenever a window is opened, closed or
//!   moved, or another workspace gains focus;
//! * the **refresh worker** re-queries on demand when the UI asks for a
//!   forced refresh (pin, unpin, move-to-workspace).
//!
//! Both push into one bounded channel.  Refresh requests go through a
//! channel of capacity one and are dropped when a request is already
//! pending: the pending one will observe the same state.

use super::ipc::{Connection, IpcError, MessageType, EVENT_WINDOW, EVENT_WORKSPACE};
use crate::traits::{Compositor, FeedUpdate, SnapshotSource};
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Capacity of the update channel towards the UI thread.
pub const UPDATE_CAPACITY: usize = 8;

const SUBSCRIPTION: &str = r#"["window","workspace"]"#;

#[derive(Deserialize)]
struct EventJson {
    change: String,
}

#[derive(Deserialize)]
struct SubscribeReply {
    success: bool,
}

/// Does an event of type `kind` with the given `change` affect the task set
/// or the focused workspace?
pub fn is_relevant(kind: u32, change: &str) -> bool {
    match kind {
        EVENT_WINDOW => matches!(change, "new" | "close" | "move"),
        EVENT_WORKSPACE => change == "focus",
        _ => false,
    }
}

/// Query a fresh snapshot.  A failed query is logged and yields `None`, so
/// the consumer keeps whatever it rendered last.
pub fn fetch_update<C: Compositor>(compositor: &C, forced: bool) -> Option<FeedUpdate> {
    match compositor.snapshot() {
        Ok(snapshot) => Some(FeedUpdate { snapshot, forced }),
        Err(e) => {
            warn!("could not refresh task list: {}", e);
            None
        }
    }
}

//  Refresh requests

/// Non-blocking handle the UI uses to ask for a forced refresh.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: mpsc::SyncSender<()>,
}

impl RefreshHandle {
    /// Create a handle and the receiving end for a refresh worker.
    pub fn channel() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::sync_channel(1);
        (Self { tx }, rx)
    }

    /// Ask for a forced refresh.  Returns `false` when the request was
    /// dropped because one is already pending or the worker is gone.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::TrySendError::Full(())) => {
                debug!("refresh already pending, dropping request");
                false
            }
            Err(mpsc::TrySendError::Disconnected(())) => {
                warn!("refresh worker is gone");
                false
            }
        }
    }
}

/// Serve refresh requests until every [`RefreshHandle`] is dropped or the
/// sink closes.
pub fn run_refresh_worker<C: Compositor>(
    compositor: &C,
    requests: mpsc::Receiver<()>,
    sink: mpsc::SyncSender<FeedUpdate>,
) {
    for () in requests {
        if let Some(update) = fetch_update(compositor, true) {
            if sink.send(update).is_err() {
                info!("update sink closed, refresh worker exiting");
                return;
            }
        }
    }
    debug!("refresh handles dropped, refresh worker exiting");
}

//  Event listener

/// Errors produced by the event listener.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error(transparent)]
    Ipc(#[from] IpcError),
    #[error("subscription refused")]
    Refused,
}

/// A [`SnapshotSource`] driven by sway's event stream.
pub struct EventListener<C> {
    socket: PathBuf,
    compositor: C,
    timeout: Duration,
    stop: Arc<AtomicBool>,
    stream: Arc<Mutex<Option<UnixStream>>>,
}

impl<C: Compositor> EventListener<C> {
    /// Listen on `socket`, re-querying through `compositor`.  `timeout`
    /// bounds the subscription handshake only.
    pub fn new(socket: impl AsRef<Path>, compositor: C, timeout: Duration) -> Self {
        Self {
            socket: socket.as_ref().to_path_buf(),
            compositor,
            timeout,
            stop: Arc::new(AtomicBool::new(false)),
            stream: Arc::new(Mutex::new(None)),
        }
    }

    /// Subscribe and publish the stream for [`FeedHandle::shutdown`].
    /// Returns `None` when a shutdown already happened, since nobody would
    /// be left to unblock the read.
    fn subscribe(&self) -> Result<Option<Connection>, FeedError> {
        let mut conn = Connection::open(&self.socket, Some(self.timeout))?;
        let body = conn.request(MessageType::Subscribe, SUBSCRIPTION)?;
        let reply: SubscribeReply = serde_json::from_slice(&body).map_err(IpcError::from)?;
        if !reply.success {
            return Err(FeedError::Refused);
        }
        conn.clear_timeout()?;
        let stream = conn.try_clone_stream()?;
        // The stop flag is read under the lock shutdown takes, so either
        // shutdown sees the stream or this sees the flag.
        let mut slot = self.stream.lock().unwrap_or_else(|e| e.into_inner());
        if self.stop.load(Ordering::SeqCst) {
            let _ = stream.shutdown(Shutdown::Both);
            return Ok(None);
        }
        *slot = Some(stream);
        Ok(Some(conn))
    }
}

impl<C: Compositor + Send> SnapshotSource for EventListener<C> {
    type Error = FeedError;

    /// Subscribe and forward a fresh snapshot for every relevant event.
    ///
    /// This method **blocks** until the feed is shut down or the event
    /// stream breaks.  Run it on a dedicated thread.
    fn run(&mut self, sink: mpsc::SyncSender<FeedUpdate>) -> Result<(), Self::Error> {
        let Some(mut conn) = self.subscribe()? else {
            debug!("event listener stopped before subscribing");
            return Ok(());
        };
        info!("subscribed to compositor events on {}", self.socket.display());

        loop {
            let (kind, body) = match conn.read_message() {
                Ok(msg) => msg,
                Err(_) if self.stop.load(Ordering::SeqCst) => {
                    debug!("event listener stopped");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            let change = match serde_json::from_slice::<EventJson>(&body) {
                Ok(ev) => ev.change,
                Err(e) => {
                    warn!("bad event payload ({:#x}): {}", kind, e);
                    continue;
                }
            };
            if !is_relevant(kind, &change) {
                continue;
            }
            debug!("event {:#x} {}", kind, change);
            if let Some(update) = fetch_update(&self.compositor, false) {
                if sink.send(update).is_err() {
                    info!("update sink closed, event listener exiting");
                    return Ok(());
                }
            }
        }
    }
}

//  Feed lifetime

/// Owner of the feed threads.
///
/// Dropping the handle leaves the threads running for the rest of the
/// process; [`shutdown`](FeedHandle::shutdown) tears them down.
pub struct FeedHandle {
    refresh: RefreshHandle,
    stop: Arc<AtomicBool>,
    stream: Arc<Mutex<Option<UnixStream>>>,
    listener: Option<JoinHandle<()>>,
}

impl FeedHandle {
    pub fn refresh(&self) -> &RefreshHandle {
        &self.refresh
    }

    /// Stop the event listener and wait for it to exit.  The refresh worker
    /// exits once the last [`RefreshHandle`] clone is dropped.
    ///
    /// The update receiver must be drained or dropped first, otherwise the
    /// listener may be parked on a full channel.
    pub fn shutdown(mut self) {
        {
            let mut slot = self.stream.lock().unwrap_or_else(|e| e.into_inner());
            self.stop.store(true, Ordering::SeqCst);
            if let Some(stream) = slot.take() {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
        if let Some(handle) = self.listener.take() {
            let _ = handle.join();
        }
    }
}

/// Start the feed: an event listener on `socket` and a refresh worker, both
/// querying through clones of `compositor`.
pub fn start<C>(
    socket: impl AsRef<Path>,
    compositor: C,
    timeout: Duration,
) -> std::io::Result<(FeedHandle, mpsc::Receiver<FeedUpdate>)>
where
    C: Compositor + Clone + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(UPDATE_CAPACITY);
    let (refresh, requests) = RefreshHandle::channel();

    let mut listener = EventListener::new(socket, compositor.clone(), timeout);
    let stop = listener.stop.clone();
    let stream = listener.stream.clone();

    let listener_tx = tx.clone();
    let listener_thread = std::thread::Builder::new()
        .name("swaydock-events".into())
        .spawn(move || {
            if let Err(e) = listener.run(listener_tx) {
                error!("event listener error: {}", e);
            }
        })?;

    std::thread::Builder::new()
        .name("swaydock-refresh".into())
        .spawn(move || run_refresh_worker(&compositor, requests, tx))?;

    Ok((
        FeedHandle {
            refresh,
            stop,
            stream,
            listener: Some(listener_thread),
        },
        rx,
    ))
}
