use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use log::{info, warn};
use uuid::Uuid;

use crate::{
    config::DeliveryConfig,
    error::StoreError,
    models::{record_key, HandoffRecord, Target},
};

/// Durable queue over the shared storage area: one JSON file per record.
///
/// Any process may write (under a key unique to the writer), delete
/// (idempotently) or list (as a snapshot) without coordination. Writes go
/// through an atomic replace, so a concurrent reader sees either the whole
/// record or nothing.
#[derive(Debug, Clone)]
pub struct HandoffStore {
    dir: PathBuf,
}

impl HandoffStore {
    pub fn new(config: &DeliveryConfig) -> Self {
        Self {
            dir: config.handoff_dir(),
        }
    }

    /// Directory holding the record files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a record under its deterministic key.
    pub fn write(&self, record: &HandoffRecord) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|err| {
            StoreError::Configuration(format!(
                "cannot create handoff directory {}: {err}",
                self.dir.display()
            ))
        })?;

        let bytes = serde_json::to_vec_pretty(record).map_err(std::io::Error::other)?;
        let key = record.storage_key();
        // Stage next to the destination so the rename never crosses a
        // filesystem boundary.
        let staging = self
            .dir
            .join(format!(".{key}.tmp-{}", std::process::id()));
        fs::write(&staging, &bytes)?;
        fs::rename(&staging, self.dir.join(&key))?;
        info!("[store] wrote {key} ({} bytes)", bytes.len());
        Ok(())
    }

    /// Read a record without consuming it.
    pub fn read(&self, target: Target, request_id: Uuid) -> Result<HandoffRecord, StoreError> {
        let path = self.dir.join(record_key(target, request_id));
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound { target, request_id });
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&contents).map_err(|source| StoreError::DecodeFailed { path, source })
    }

    /// Snapshot of pending keys for one target, in directory order.
    ///
    /// Entries may be deleted by another process before they are read;
    /// callers follow up with `read` and skip `NotFound`.
    pub fn list_pending(&self, target: Target) -> Result<Vec<String>, StoreError> {
        let prefix = format!("{}_", target.id());
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name.ends_with(".json") {
                keys.push(name.to_string());
            }
        }
        Ok(keys)
    }

    /// Remove a record. A missing key is already the desired state.
    pub fn delete(&self, target: Target, request_id: Uuid) -> Result<(), StoreError> {
        let path = self.dir.join(record_key(target, request_id));
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Read and delete in one step — the destination app's operation once
    /// it has been activated with a request id.
    pub fn take(&self, target: Target, request_id: Uuid) -> Result<HandoffRecord, StoreError> {
        let record = self.read(target, request_id)?;
        self.delete(target, request_id)?;
        Ok(record)
    }

    /// Reap records whose file modification time is older than `max_age`,
    /// returning how many were removed.
    ///
    /// This is the only recovery path for records whose consumer never
    /// launched. Staleness is judged per file, so a producer writing a
    /// different key concurrently is never affected. Abandoned staging
    /// files from crashed writers are swept here too, without being
    /// counted.
    pub fn collect_stale(
        &self,
        max_age: Duration,
        target: Option<Target>,
    ) -> Result<usize, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };

        let prefix = target.map(|target| format!("{}_", target.id()));
        let now = SystemTime::now();
        let mut cleaned = 0;

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };

            let is_staging = name.starts_with('.') && name.contains(".tmp-");
            let is_record = name.ends_with(".json") && !is_staging;
            if !is_record && !is_staging {
                continue;
            }
            if let Some(prefix) = &prefix {
                if is_staging || !name.starts_with(prefix) {
                    continue;
                }
            }

            // A raced delete between listing and stat is fine; skip.
            let Ok(meta) = entry.metadata() else { continue };
            let Ok(modified) = meta.modified() else { continue };
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    if is_record {
                        cleaned += 1;
                        info!("[store] reaped stale record {name} (age {}s)", age.as_secs());
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!("[store] failed to reap {name}: {err}"),
            }
        }

        Ok(cleaned)
    }
}
