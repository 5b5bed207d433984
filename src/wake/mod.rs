//! Best-effort cross-process wake signalling.
//!
//! A wake is a latency optimization over the dispatcher's rescan interval,
//! never a correctness mechanism: delivery is not guaranteed, ordering
//! relative to store writes is not guaranteed, and a consumer that misses a
//! wake catches up on its next poll.
//!
//! Each subscribed process owns one datagram socket under the shared
//! directory; `post` fans an empty datagram out to every socket it finds
//! there. Sockets left behind by dead processes refuse the send and are
//! unlinked on the spot.

use std::path::PathBuf;
#[cfg(unix)]
use std::{
    fs,
    io::ErrorKind,
    sync::atomic::{AtomicU64, Ordering},
    sync::Mutex,
};

#[cfg(unix)]
use log::{debug, warn};
#[cfg(unix)]
use tokio_util::sync::CancellationToken;

use crate::config::DeliveryConfig;

/// Proof of a live registration; pass it back to `unsubscribe`.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: u64,
}

#[cfg(unix)]
struct ActiveSubscription {
    id: u64,
    cancel: CancellationToken,
    socket_path: PathBuf,
}

#[cfg(unix)]
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// A process-wide, fire-and-forget "the store changed" broadcast.
///
/// Holds at most one registered callback: one dispatcher per consumer
/// process is the expected shape, and a second `subscribe` replaces the
/// first rather than stacking.
pub struct WakeChannel {
    dir: PathBuf,
    #[cfg(unix)]
    subscription: Mutex<Option<ActiveSubscription>>,
}

impl WakeChannel {
    pub fn new(config: &DeliveryConfig) -> Self {
        Self {
            dir: config.wake_dir(),
            #[cfg(unix)]
            subscription: Mutex::new(None),
        }
    }

    /// Broadcast a payload-less wake to every subscribed process.
    ///
    /// Returns immediately whether or not anyone is listening; every send
    /// error is swallowed. A refused send means the listener died, so its
    /// socket file is removed while we are here.
    #[cfg(unix)]
    pub fn post(&self) {
        use std::os::unix::net::UnixDatagram;

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return, // nobody has ever subscribed
        };

        let Ok(sender) = UnixDatagram::unbound() else { return };
        let _ = sender.set_nonblocking(true);

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "sock") {
                continue;
            }
            match sender.send_to(&[1], &path) {
                Ok(_) => debug!("[wake] posted to {}", path.display()),
                Err(err) if err.kind() == ErrorKind::ConnectionRefused => {
                    // The owning process is gone; reap its socket.
                    let _ = fs::remove_file(&path);
                    debug!("[wake] removed dead listener socket {}", path.display());
                }
                Err(err) => debug!("[wake] send to {} failed: {err}", path.display()),
            }
        }
    }

    #[cfg(not(unix))]
    pub fn post(&self) {
        // No broadcast facility on this platform; consumers rely on their
        // rescan interval.
        let _ = &self.dir;
    }

    /// Register `callback` to run on each observed wake.
    ///
    /// The socket is bound before this returns, so a `post` issued by any
    /// process afterwards will reach the callback. Must be called from
    /// within a tokio runtime; the callback runs on the reader task and
    /// should hop to its own execution context before touching state.
    #[cfg(unix)]
    pub fn subscribe<F>(&self, callback: F) -> std::io::Result<SubscriptionHandle>
    where
        F: Fn() + Send + Sync + 'static,
    {
        fs::create_dir_all(&self.dir)?;
        let socket_path = self.dir.join(format!("{}.sock", std::process::id()));

        // Replace any previous registration, ours or a stale one left by a
        // recycled pid.
        self.clear_subscription();
        if socket_path.exists() {
            let _ = fs::remove_file(&socket_path);
        }

        let std_socket = std::os::unix::net::UnixDatagram::bind(&socket_path)?;
        std_socket.set_nonblocking(true)?;
        let socket = tokio::net::UnixDatagram::from_std(std_socket)?;

        let id = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let reader_cancel = cancel.clone();

        tokio::spawn(async move {
            let mut buf = [0u8; 8];
            loop {
                tokio::select! {
                    _ = reader_cancel.cancelled() => break,
                    received = socket.recv(&mut buf) => match received {
                        Ok(_) => callback(),
                        Err(err) => {
                            warn!("[wake] receive failed: {err}");
                            break;
                        }
                    },
                }
            }
        });

        let mut guard = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(ActiveSubscription {
            id,
            cancel,
            socket_path,
        });
        Ok(SubscriptionHandle { id })
    }

    #[cfg(not(unix))]
    pub fn subscribe<F>(&self, _callback: F) -> std::io::Result<SubscriptionHandle>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Ok(SubscriptionHandle { id: 0 })
    }

    /// Remove a registration. Safe to call with a stale handle after a
    /// replacement, and safe when nothing is registered.
    #[cfg(unix)]
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut guard = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        if guard.as_ref().is_some_and(|sub| sub.id == handle.id) {
            if let Some(sub) = guard.take() {
                sub.cancel.cancel();
                let _ = fs::remove_file(&sub.socket_path);
            }
        }
    }

    #[cfg(not(unix))]
    pub fn unsubscribe(&self, _handle: SubscriptionHandle) {}

    #[cfg(unix)]
    fn clear_subscription(&self) {
        let mut guard = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sub) = guard.take() {
            sub.cancel.cancel();
            let _ = fs::remove_file(&sub.socket_path);
        }
    }
}

#[cfg(unix)]
impl Drop for WakeChannel {
    fn drop(&mut self) {
        self.clear_subscription();
    }
}
