//! Checksummed JSON store.
//!
//! [`DataStore`] is the only component that touches the dataset file. Every
//! public operation returns a success flag instead of an error: failures are
//! reported through the injected [`log::Log`] handle with the operation name
//! and the underlying cause, and the in-memory dataset is left as it was
//! before the call.
//!
//! # Integrity
//!
//! On save the store computes the SHA-256 of the canonical encoding of the
//! dataset (checksum field excluded, see [`crate::canonical_json`]) and
//! stamps it into the file. `load` and `import_data` recompute it over the
//! raw parsed document and refuse the file on mismatch.
//!
//! # Example
//!
//! ```no_run
//! use water_tracker_core::tracker_config::TrackerConfig;
//! use water_tracker_core::tracker_model::WaterLogEntry;
//! use water_tracker_core::tracker_store::DataStore;
//!
//! let mut store = DataStore::open(TrackerConfig::default().with_data_path("water.json"));
//! let entry = WaterLogEntry { amount_ml: 250, timestamp: 1622548800.0, note: None };
//! assert!(store.add_water_log(entry));
//! assert_eq!(store.get_water_logs(None, None).len(), 1);
//! ```

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{Level, Log, Metadata, Record};
use serde_json::Value;

use crate::app_response::AppResponse;
use crate::canonical_json::{compute_checksum, verify_checksum, CHECKSUM_KEY};
use crate::clock::{Clock, SystemClock};
use crate::tracker_config::TrackerConfig;
use crate::tracker_model::{Dataset, Profile, StoredProfile, WaterLogEntry};

/// Target used for every record the store emits.
pub const LOG_TARGET: &str = "water_tracker::store";

/// Key stamped into export files.
pub const EXPORT_DATE_KEY: &str = "export_date";

/// Forwards to the process-wide logger installed with `log::set_logger`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalLogger;

impl Log for GlobalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        log::logger().log(record)
    }

    fn flush(&self) {
        log::logger().flush()
    }
}

pub struct DataStore {
    config: TrackerConfig,
    data: Dataset,
    logger: Arc<dyn Log>,
}

impl DataStore {
    /// Opens the store described by `config`, logging through the global logger.
    pub fn open(config: TrackerConfig) -> Self {
        Self::with_logger(config, Arc::new(GlobalLogger))
    }

    /// Opens the store with an explicit logging handle.
    ///
    /// Starts from an empty dataset and loads the configured file when it
    /// exists. A file that fails to load leaves the dataset empty.
    pub fn with_logger(config: TrackerConfig, logger: Arc<dyn Log>) -> Self {
        let mut store = Self {
            config,
            data: Dataset::default(),
            logger,
        };

        if store.config.data_path.exists() {
            store.load();
        } else {
            store.emit(
                Level::Info,
                format_args!("No dataset at {}; starting empty", store.config.data_path.display()),
            );
        }
        store
    }

    pub fn file_path(&self) -> &Path {
        &self.config.data_path
    }

    /// In-memory dataset. Its checksum is only current right after a save or load.
    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    /// Reads and verifies the canonical file, replacing the in-memory dataset
    /// only on success.
    pub fn load(&mut self) -> bool {
        let path = self.config.data_path.clone();
        match read_verified(&path) {
            Ok(Some(dataset)) => {
                self.data = dataset;
                self.emit(
                    Level::Info,
                    format_args!(
                        "Loaded dataset from {} ({} water logs)",
                        path.display(),
                        self.data.water_logs.len()
                    ),
                );
                true
            }
            Ok(None) => {
                self.emit(
                    Level::Warn,
                    format_args!("load: checksum mismatch in {}", path.display()),
                );
                false
            }
            Err(e) => {
                self.report("load", &path, &e);
                false
            }
        }
    }

    /// Stamps a fresh checksum into the dataset and writes it to the canonical file.
    pub fn save(&mut self) -> bool {
        match self.try_save() {
            Ok(()) => true,
            Err(e) => {
                let path = self.config.data_path.clone();
                self.report("save", &path, &e);
                false
            }
        }
    }

    /// Writes a copy of the dataset to `path`, stamped with the current time.
    pub fn export_data(&self, path: impl AsRef<Path>) -> bool {
        self.export_data_at(path, SystemClock.now())
    }

    /// Like [`export_data`](Self::export_data) with an explicit `export_date`.
    ///
    /// Neither the canonical file nor the in-memory dataset change.
    pub fn export_data_at(&self, path: impl AsRef<Path>, export_date: f64) -> bool {
        let path = path.as_ref();
        match self.try_export(path, export_date) {
            Ok(()) => {
                self.emit(Level::Info, format_args!("Exported dataset to {}", path.display()));
                true
            }
            Err(e) => {
                self.report("export_data", path, &e);
                false
            }
        }
    }

    /// Verifies the file at `path` like [`load`](Self::load), then replaces
    /// the dataset with it and persists to the canonical file.
    pub fn import_data(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match read_verified(path) {
            Ok(Some(dataset)) => {
                let imported = self.commit("import_data", |data| *data = dataset);
                if imported {
                    self.emit(Level::Info, format_args!("Imported dataset from {}", path.display()));
                }
                imported
            }
            Ok(None) => {
                self.emit(
                    Level::Warn,
                    format_args!("import_data: checksum mismatch in {}", path.display()),
                );
                false
            }
            Err(e) => {
                self.report("import_data", path, &e);
                false
            }
        }
    }

    /// Replaces the profile and saves.
    pub fn save_profile(&mut self, profile: &Profile) -> bool {
        let stored = StoredProfile::from(profile);
        self.commit("save_profile", |data| data.profile = Some(stored))
    }

    /// The stored profile, or `None` when none is set or its gender name is unknown.
    pub fn load_profile(&self) -> Option<Profile> {
        let stored = self.data.profile.as_ref()?;
        match Profile::try_from(stored) {
            Ok(profile) => Some(profile),
            Err(e) => {
                self.emit(Level::Error, format_args!("load_profile failed: {e}"));
                None
            }
        }
    }

    /// Appends `entry` and saves.
    pub fn add_water_log(&mut self, entry: WaterLogEntry) -> bool {
        self.commit("add_water_log", |data| data.water_logs.push(entry))
    }

    /// Replaces the entry at `index` and saves. Fails without writing when
    /// `index` is out of range.
    pub fn update_water_log(&mut self, index: usize, entry: WaterLogEntry) -> bool {
        if !self.check_index("update_water_log", index) {
            return false;
        }
        self.commit("update_water_log", |data| data.water_logs[index] = entry)
    }

    /// Removes the entry at `index` and saves. Later entries shift down by one.
    pub fn delete_water_log(&mut self, index: usize) -> bool {
        if !self.check_index("delete_water_log", index) {
            return false;
        }
        self.commit("delete_water_log", |data| {
            data.water_logs.remove(index);
        })
    }

    /// Entries with `start_time <= timestamp <= end_time`, in storage order,
    /// each paired with its current index. Missing bounds are open.
    pub fn get_water_logs(
        &self,
        start_time: Option<f64>,
        end_time: Option<f64>,
    ) -> Vec<(usize, WaterLogEntry)> {
        self.data
            .water_logs
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                start_time.map_or(true, |start| entry.timestamp >= start)
                    && end_time.map_or(true, |end| entry.timestamp <= end)
            })
            .map(|(index, entry)| (index, entry.clone()))
            .collect()
    }

    /// Drops the profile and every water log, then saves.
    pub fn clear_all(&mut self) -> bool {
        self.commit("clear_all", |data| *data = Dataset::default())
    }

    /// Applies `change` and persists it; the previous dataset is restored if
    /// the write fails.
    fn commit(&mut self, op: &str, change: impl FnOnce(&mut Dataset)) -> bool {
        let previous = self.data.clone();
        change(&mut self.data);
        match self.try_save() {
            Ok(()) => {
                self.emit(Level::Debug, format_args!("{op} persisted"));
                true
            }
            Err(e) => {
                self.data = previous;
                let path = self.config.data_path.clone();
                self.report(op, &path, &e);
                false
            }
        }
    }

    fn check_index(&self, op: &str, index: usize) -> bool {
        let len = self.data.water_logs.len();
        if index < len {
            return true;
        }
        self.emit(
            Level::Warn,
            format_args!("{op}: index {index} out of range ({len} water logs)"),
        );
        false
    }

    fn try_save(&mut self) -> Result<(), AppResponse> {
        let checksum = compute_checksum(&serde_json::to_value(&self.data)?)?;
        self.data.checksum = checksum;
        let contents = serde_json::to_string_pretty(&self.data)?;
        write_file(&self.config, &self.config.data_path, &contents, self.config.keep_backup)
    }

    fn try_export(&self, path: &Path, export_date: f64) -> Result<(), AppResponse> {
        let mut document = serde_json::to_value(&self.data)?;
        let map = document
            .as_object_mut()
            .ok_or_else(|| AppResponse::SerializationError("dataset is not a JSON object".to_string()))?;
        map.insert(EXPORT_DATE_KEY.to_string(), Value::from(export_date));
        let checksum = compute_checksum(&document)?;
        if let Some(map) = document.as_object_mut() {
            map.insert(CHECKSUM_KEY.to_string(), Value::String(checksum));
        }
        let contents = serde_json::to_string_pretty(&document)?;
        write_file(&self.config, path, &contents, false)
    }

    fn report(&self, op: &str, path: &Path, err: &AppResponse) {
        self.emit(
            Level::Error,
            format_args!("{op} failed for {}: {err}", path.display()),
        );
    }

    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        let metadata = Metadata::builder().level(level).target(LOG_TARGET).build();
        if !self.logger.enabled(&metadata) {
            return;
        }
        self.logger.log(
            &Record::builder()
                .metadata(metadata)
                .args(args)
                .module_path_static(Some(module_path!()))
                .file_static(Some(file!()))
                .build(),
        );
    }
}

/// Parses and verifies a dataset file. `Ok(None)` means the checksum did
/// not match.
fn read_verified(path: &Path) -> Result<Option<Dataset>, AppResponse> {
    let raw = fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&raw)?;
    if !verify_checksum(&document)? {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(document)?))
}

/// `<path>.<suffix>`, keeping the original extension.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn write_file(
    config: &TrackerConfig,
    path: &Path,
    contents: &str,
    keep_backup: bool,
) -> Result<(), AppResponse> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    if !config.atomic_writes {
        fs::write(path, contents)?;
        return Ok(());
    }

    let tmp = sibling(path, "tmp");
    let result = replace_via_temp(path, &tmp, contents, keep_backup);
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    Ok(result?)
}

fn replace_via_temp(path: &Path, tmp: &Path, contents: &str, keep_backup: bool) -> io::Result<()> {
    fs::write(tmp, contents)?;
    if keep_backup && path.is_file() {
        fs::copy(path, sibling(path, "bak"))?;
    }
    fs::rename(tmp, path)
}
