use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

const DEFAULT_STALE_MAX_AGE_SECS: u64 = 300;
const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 100;
const DEFAULT_RESCAN_INTERVAL_SECS: u64 = 30;

/// Overridable policy values. A deployment that wants something other than
/// the defaults drops a `delivery.json` into the shared directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Tunables {
    stale_max_age_secs: u64,
    attempt_timeout_ms: u64,
    rescan_interval_secs: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            stale_max_age_secs: DEFAULT_STALE_MAX_AGE_SECS,
            attempt_timeout_ms: DEFAULT_ATTEMPT_TIMEOUT_MS,
            rescan_interval_secs: DEFAULT_RESCAN_INTERVAL_SECS,
        }
    }
}

impl Tunables {
    fn load(shared_dir: &Path) -> Self {
        let path = shared_dir.join("delivery.json");
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(tunables) => tunables,
                Err(err) => {
                    log::warn!("[config] ignoring unparseable {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!("[config] could not read {}: {err}", path.display());
                Self::default()
            }
        }
    }
}

/// Resolved runtime configuration shared by every component.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Storage area visible to all participating processes.
    pub shared_dir: PathBuf,
    /// Age past which an unconsumed record is reaped.
    pub stale_max_age: Duration,
    /// Budget for a single activation strategy attempt.
    pub attempt_timeout: Duration,
    /// Dispatcher fallback poll period when no wake arrives.
    pub rescan_interval: Duration,
}

impl DeliveryConfig {
    /// Resolve the shared storage area and policy values.
    ///
    /// `SIDEDROP_SHARED_DIR` wins; otherwise the per-user local data
    /// directory. Failing to resolve either is a deployment problem and is
    /// surfaced as `Configuration`, never retried.
    pub fn resolve() -> Result<Self, StoreError> {
        let shared_dir = match env::var("SIDEDROP_SHARED_DIR") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::data_local_dir()
                .ok_or_else(|| {
                    StoreError::Configuration("no local data directory for this user".to_string())
                })?
                .join("sidedrop"),
        };
        Ok(Self::at(shared_dir))
    }

    /// Build a configuration rooted at an explicit shared directory.
    pub fn at(shared_dir: PathBuf) -> Self {
        let tunables = Tunables::load(&shared_dir);
        Self {
            stale_max_age: Duration::from_secs(tunables.stale_max_age_secs),
            attempt_timeout: Duration::from_millis(tunables.attempt_timeout_ms),
            rescan_interval: Duration::from_secs(tunables.rescan_interval_secs),
            shared_dir,
        }
    }

    /// Directory holding one file per pending record.
    pub fn handoff_dir(&self) -> PathBuf {
        self.shared_dir.join("handoffs")
    }

    /// Directory holding one wake socket per subscribed process.
    pub fn wake_dir(&self) -> PathBuf {
        self.shared_dir.join("wake")
    }
}
