use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    activation::ActivationInvoker,
    config::DeliveryConfig,
    error::StoreError,
    models::{parse_key, Target},
    store::HandoffStore,
    wake::WakeChannel,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Scan position carried between passes. Starting each scan after the last
/// attempted target keeps a backlog for one destination from starving the
/// others.
struct DispatchCursor {
    next_index: usize,
}

/// Turns wake and poll triggers into at most one delivery attempt per pass,
/// inside the long-lived consumer process.
#[derive(Clone)]
pub struct HandoffDispatcher {
    store: HandoffStore,
    invoker: ActivationInvoker,
    config: DeliveryConfig,
    cursor: Arc<Mutex<DispatchCursor>>,
}

impl HandoffDispatcher {
    pub fn new(store: HandoffStore, invoker: ActivationInvoker, config: DeliveryConfig) -> Self {
        Self {
            store,
            invoker,
            config,
            cursor: Arc::new(Mutex::new(DispatchCursor { next_index: 0 })),
        }
    }

    /// One dispatch pass: find the first target with a readable pending
    /// record, attempt exactly one activation for it, and stop.
    ///
    /// Returns the request id that was attempted, if any. The record is
    /// never deleted here — the destination deletes it after reading, and
    /// garbage collection reaps what nobody ever reads. Overlapping
    /// triggers collapse: a pass that finds one already in flight is a
    /// no-op.
    pub async fn process_pending(&self) -> Option<Uuid> {
        let Ok(mut cursor) = self.cursor.try_lock() else {
            log_info!("dispatch pass already in flight, skipping trigger");
            return None;
        };

        for step in 0..Target::ALL.len() {
            let index = (cursor.next_index + step) % Target::ALL.len();
            let target = Target::ALL[index];

            let keys = match self.store.list_pending(target) {
                Ok(keys) => keys,
                Err(err) => {
                    log_error!("listing pending records for {target} failed: {err}");
                    continue;
                }
            };

            for key in keys {
                let Some((_, request_id)) = parse_key(&key) else {
                    log_warn!("ignoring foreign file {key} in handoff directory");
                    continue;
                };
                let record = match self.store.read(target, request_id) {
                    Ok(record) => record,
                    Err(err) if err.is_not_found() => continue, // consumed under us
                    Err(err) => {
                        // Corrupt record; collect_stale will reap it.
                        log_warn!("skipping unreadable record {key}: {err}");
                        continue;
                    }
                };

                if self.invoker.activate(&record.activation_url()).await {
                    log_info!("activated {target} for record {}", record.request_id);
                } else {
                    log_warn!(
                        "activation failed for record {}; it stays pending for a later trigger",
                        record.request_id
                    );
                }

                // One attempt per pass, success or not.
                cursor.next_index = (index + 1) % Target::ALL.len();
                return Some(record.request_id);
            }
        }

        None
    }

    /// Reap abandoned records across all targets.
    pub fn collect_stale(&self) -> Result<usize, StoreError> {
        self.store.collect_stale(self.config.stale_max_age, None)
    }

    /// Long-running consumer loop: garbage-collect once, subscribe to the
    /// wake channel, then dispatch on wakes and on the rescan interval
    /// until cancelled. The interval's first tick fires at once, which
    /// doubles as the launch-time pass.
    pub async fn run(&self, wake: &WakeChannel, cancel_token: CancellationToken) {
        match self.collect_stale() {
            Ok(0) => {}
            Ok(cleaned) => log_info!("start-up GC reaped {cleaned} stale record(s)"),
            Err(err) => log_error!("start-up GC failed: {err}"),
        }

        let (wake_tx, mut wake_rx) = mpsc::unbounded_channel();
        let handle = match wake.subscribe(move || {
            let _ = wake_tx.send(());
        }) {
            Ok(handle) => Some(handle),
            Err(err) => {
                log_warn!("wake subscription unavailable ({err}); relying on rescan interval");
                None
            }
        };

        let mut ticker = interval(self.config.rescan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.process_pending().await;
                }
                received = wake_rx.recv() => {
                    if received.is_some() {
                        self.process_pending().await;
                    }
                }
                _ = cancel_token.cancelled() => {
                    log_info!("dispatcher shutting down");
                    break;
                }
            }
        }

        if let Some(handle) = handle {
            wake.unsubscribe(handle);
        }
    }
}
