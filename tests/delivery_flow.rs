//! End-to-end flow over the public API: a producer commits a record, a
//! dispatch pass activates its destination, and the destination takes it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sidedrop::{
    ActivationInvoker, ActivationStrategy, DeliveryConfig, HandoffDispatcher, HandoffProducer,
    HandoffStore, StoreError, Target, WakeChannel,
};

struct Recording {
    urls: Arc<Mutex<Vec<String>>>,
}

impl ActivationStrategy for Recording {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn attempt(&self, url: &str) -> anyhow::Result<()> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

fn recording_invoker() -> (ActivationInvoker, Arc<Mutex<Vec<String>>>) {
    let urls = Arc::new(Mutex::new(Vec::new()));
    let invoker = ActivationInvoker::with_strategies(
        vec![Arc::new(Recording {
            urls: Arc::clone(&urls),
        }) as Arc<dyn ActivationStrategy>],
        Duration::from_millis(100),
    );
    (invoker, urls)
}

#[tokio::test]
async fn a_handoff_travels_from_producer_to_destination() {
    let dir = tempfile::tempdir().unwrap();
    let config = DeliveryConfig::at(dir.path().to_path_buf());

    // Producer end: commit and announce.
    let (producer_invoker, _) = recording_invoker();
    let producer = HandoffProducer::new(
        HandoffStore::new(&config),
        WakeChannel::new(&config),
        producer_invoker,
    );
    let record = producer
        .submit(
            Target::Ticket,
            "call patient back".to_string(),
            Some("share-extension".to_string()),
            None,
        )
        .await
        .unwrap();

    // Consumer end: one dispatch pass activates the destination with a URL
    // carrying the record's id.
    let (dispatch_invoker, dispatched) = recording_invoker();
    let dispatcher = HandoffDispatcher::new(
        HandoffStore::new(&config),
        dispatch_invoker,
        config.clone(),
    );
    let attempted = dispatcher.process_pending().await.unwrap();
    assert_eq!(attempted, record.request_id);

    let urls = dispatched.lock().unwrap().clone();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].contains(&record.request_id.to_string()));
    assert!(urls[0].starts_with("tickhq://create-ticket"));

    // Destination end: read and delete, exactly once.
    let store = HandoffStore::new(&config);
    let taken = store.take(Target::Ticket, record.request_id).unwrap();
    assert_eq!(taken.payload_text, "call patient back");
    assert_eq!(taken.source_identifier.as_deref(), Some("share-extension"));

    // A second read is the expected NotFound race, and a later pass finds
    // nothing to do.
    assert!(matches!(
        store.take(Target::Ticket, record.request_id),
        Err(StoreError::NotFound { .. })
    ));
    assert_eq!(dispatcher.process_pending().await, None);
}

#[tokio::test]
async fn abandoned_records_expire_instead_of_lingering() {
    let dir = tempfile::tempdir().unwrap();
    let config = DeliveryConfig::at(dir.path().to_path_buf());

    let (invoker, _) = recording_invoker();
    let producer = HandoffProducer::new(
        HandoffStore::new(&config),
        WakeChannel::new(&config),
        invoker,
    );
    let record = producer
        .submit(Target::Journal, "never picked up".to_string(), None, None)
        .await
        .unwrap();

    let store = HandoffStore::new(&config);
    // Fresh records survive a sweep at the configured threshold.
    assert_eq!(store.collect_stale(config.stale_max_age, None).unwrap(), 0);

    // Ten minutes later, nobody has consumed it.
    let path = store
        .dir()
        .join(format!("journal_{}.json", record.request_id));
    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(std::time::SystemTime::now() - Duration::from_secs(600))
        .unwrap();

    assert_eq!(store.collect_stale(config.stale_max_age, None).unwrap(), 1);
    assert!(store.list_pending(Target::Journal).unwrap().is_empty());
}
