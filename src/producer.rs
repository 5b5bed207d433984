use std::collections::BTreeMap;

use log::{info, warn};

use crate::{
    activation::ActivationInvoker,
    error::StoreError,
    models::{hub_wake_url, HandoffRecord, Target},
    store::HandoffStore,
    wake::WakeChannel,
};

/// The constrained-process end of a handoff: commit the record durably,
/// then try to get it noticed quickly.
pub struct HandoffProducer {
    store: HandoffStore,
    wake: WakeChannel,
    invoker: ActivationInvoker,
}

impl HandoffProducer {
    pub fn new(store: HandoffStore, wake: WakeChannel, invoker: ActivationInvoker) -> Self {
        Self {
            store,
            wake,
            invoker,
        }
    }

    /// Commit a new handoff.
    ///
    /// The durable write is the transaction: on failure the error is
    /// returned and nothing else happens. On success the wake broadcast and
    /// two activation attempts — the consumer host first, in case it is not
    /// running, then the destination itself — are all best-effort and never
    /// roll the record back.
    pub async fn submit(
        &self,
        target: Target,
        payload_text: String,
        source_identifier: Option<String>,
        metadata: Option<BTreeMap<String, String>>,
    ) -> Result<HandoffRecord, StoreError> {
        let record = HandoffRecord::new(target, payload_text, source_identifier, metadata);
        self.store.write(&record)?;
        info!(
            "[producer] committed {} for {}",
            record.request_id,
            target.id()
        );

        self.wake.post();

        if !self.invoker.activate(&hub_wake_url(record.request_id)).await {
            warn!("[producer] could not reach the consumer host; record stays queued");
        }
        if !self.invoker.activate(&record.activation_url()).await {
            warn!(
                "[producer] could not open {} directly; record stays queued",
                target.display_name()
            );
        }

        Ok(record)
    }
}
