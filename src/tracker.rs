//! Owning facade that wires the store, the clock and both services.

use std::path::Path;
use std::sync::Arc;

use crate::app_response::AppResponse;
use crate::clock::{Clock, SystemClock};
use crate::profile_service::ProfileService;
use crate::tracker_config::TrackerConfig;
use crate::tracker_store::DataStore;
use crate::water_log_service::WaterLogService;

/// One tracker per process: the store plus the clock the log service stamps
/// entries with.
pub struct HydrationTracker<C: Clock = SystemClock> {
    store: DataStore,
    clock: C,
}

impl HydrationTracker<SystemClock> {
    pub fn open(config: TrackerConfig) -> Self {
        Self::new(DataStore::open(config), SystemClock)
    }
}

impl<C: Clock> HydrationTracker<C> {
    pub fn new(store: DataStore, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn with_logger(config: TrackerConfig, logger: Arc<dyn log::Log>, clock: C) -> Self {
        Self::new(DataStore::with_logger(config, logger), clock)
    }

    pub fn profiles(&mut self) -> ProfileService<'_> {
        ProfileService::new(&mut self.store)
    }

    pub fn water_logs(&mut self) -> WaterLogService<'_, C> {
        WaterLogService::new(&mut self.store, &self.clock)
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn export_data(&self, path: impl AsRef<Path>) -> Result<(), AppResponse> {
        let path = path.as_ref();
        if self.store.export_data_at(path, self.clock.now()) {
            Ok(())
        } else {
            Err(AppResponse::StorageError(format!(
                "Failed to export data to {}.",
                path.display()
            )))
        }
    }

    pub fn import_data(&mut self, path: impl AsRef<Path>) -> Result<(), AppResponse> {
        let path = path.as_ref();
        if self.store.import_data(path) {
            Ok(())
        } else {
            Err(AppResponse::StorageError(format!(
                "Failed to import data from {}.",
                path.display()
            )))
        }
    }

    pub fn clear_all_data(&mut self) -> Result<(), AppResponse> {
        if self.store.clear_all() {
            Ok(())
        } else {
            Err(AppResponse::StorageError("Failed to clear data.".to_string()))
        }
    }
}
