//! # Water Tracker Core
//!
//! Storage and business rules for a personal hydration tracker, designed to
//! sit behind a desktop or mobile UI through a C-compatible interface.
//!
//! The core keeps a single user profile and a log of water intake events in
//! one JSON file guarded by a SHA-256 checksum, derives a daily intake target
//! from the profile, and answers window and calendar-range queries over the
//! log.
//!
//! ## Layers
//!
//! - [`tracker_model`] - profile, log entries, the daily target formula
//! - [`tracker_store`] - the checksummed JSON store (the only code touching disk)
//! - [`profile_service`] / [`water_log_service`] - input validation and metrics
//! - [`tracker`] - owning facade handed to hosts
//!
//! ## Quick Start
//!
//! ```no_run
//! use water_tracker_core::tracker::HydrationTracker;
//! use water_tracker_core::tracker_config::TrackerConfig;
//!
//! let mut tracker = HydrationTracker::open(TrackerConfig::from_env());
//! tracker.profiles().create_profile(180, 80.0, 30, "male")?;
//! tracker.water_logs().add_water_log(250, Some("Morning".to_string()))?;
//! let summary = tracker.water_logs().daily_summary();
//! println!("{} / {} ml", summary.consumed_ml, summary.target_ml);
//! # Ok::<(), water_tracker_core::app_response::AppResponse>(())
//! ```
//!
//! ## FFI Functions
//!
//! Every function returns a JSON-encoded [`AppResponse`] as a C string that
//! the caller releases with [`free_response`]:
//!
//! - [`create_tracker`] / [`close_tracker`] - open and release a tracker
//! - [`create_profile`], [`update_profile`], [`get_profile`], [`get_daily_target`]
//! - [`add_water_log`], [`update_water_log`], [`delete_water_log`]
//! - [`get_water_logs`], [`get_water_logs_by_range`], [`get_daily_summary`]
//! - [`export_data`], [`import_data`], [`clear_all_data`]

pub mod app_response;
pub mod canonical_json;
pub mod clock;
pub mod profile_service;
pub mod tracker;
pub mod tracker_config;
pub mod tracker_model;
pub mod tracker_store;
pub mod water_log_service;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::clock::SystemClock;
use crate::tracker::HydrationTracker;
use crate::tracker_config::TrackerConfig;
use crate::tracker_model::{Profile, WaterLogEntry};

/// Tracker handle owned by the host across FFI calls.
pub type TrackerState = HydrationTracker<SystemClock>;

/// Profile payload accepted by [`create_profile`] and [`update_profile`].
#[derive(Debug, Deserialize)]
struct ProfileRequest {
    height_cm: i64,
    weight_kg: f64,
    age_years: i64,
    gender: String,
}

/// Water log payload accepted by [`add_water_log`] and [`update_water_log`].
#[derive(Debug, Deserialize)]
struct WaterLogRequest {
    amount_ml: i64,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateRangeRequest {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Serialize)]
struct ProfileView {
    height_cm: u32,
    weight_kg: f64,
    age_years: u32,
    gender: String,
    daily_target_ml: u32,
}

impl From<&Profile> for ProfileView {
    fn from(profile: &Profile) -> Self {
        ProfileView {
            height_cm: profile.height_cm,
            weight_kg: profile.weight_kg,
            age_years: profile.age_years,
            gender: profile.gender.name().to_string(),
            daily_target_ml: profile.daily_target_ml(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WaterLogView {
    index: usize,
    amount_ml: u32,
    timestamp: f64,
    note: Option<String>,
}

impl From<(usize, WaterLogEntry)> for WaterLogView {
    fn from((index, entry): (usize, WaterLogEntry)) -> Self {
        WaterLogView {
            index,
            amount_ml: entry.amount_ml,
            timestamp: entry.timestamp,
            note: entry.note,
        }
    }
}

/// Opens the tracker whose dataset lives at `path`.
///
/// A null `path` reads the location from the environment (see
/// [`TrackerConfig::from_env`]). An existing dataset is loaded and verified;
/// a file that fails verification is left on disk and the tracker starts
/// empty.
///
/// # Returns
///
/// A pointer to the tracker, or null if `path` is not valid UTF-8. Release
/// it with [`close_tracker`].
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use water_tracker_core::{close_tracker, create_tracker};
///
/// let path = CString::new("watertracker.json").unwrap();
/// let tracker = create_tracker(path.as_ptr());
/// assert!(!tracker.is_null());
/// close_tracker(tracker);
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_tracker(path: *const c_char) -> *mut TrackerState {
    let config = if path.is_null() {
        TrackerConfig::from_env()
    } else {
        match unsafe { CStr::from_ptr(path).to_str() } {
            Ok(s) => TrackerConfig::from_env().with_data_path(s),
            Err(e) => {
                warn!("Invalid UTF-8 in path parameter: {e}");
                return std::ptr::null_mut();
            }
        }
    };

    let tracker = HydrationTracker::open(config);
    info!("Tracker opened at: {}", tracker.store().file_path().display());
    Box::into_raw(Box::new(tracker))
}

/// Releases a tracker created by [`create_tracker`].
///
/// The pointer must not be used afterwards.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_tracker(state: *mut TrackerState) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to close_tracker".to_string());
        return response_to_c_string(&error);
    }

    drop(unsafe { Box::from_raw(state) });
    response_to_c_string(&AppResponse::success("Tracker closed successfully"))
}

/// Frees a response string returned by any function of this library.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(response: *const c_char) {
    if response.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(response as *mut c_char) });
}

/// Validates and stores the user profile.
///
/// # JSON Format
///
/// ```json
/// { "height_cm": 180, "weight_kg": 80.0, "age_years": 30, "gender": "MALE" }
/// ```
///
/// On success the `Ok` payload is the stored profile with its
/// `daily_target_ml`. Invalid measurements or gender yield `ValidationError`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_profile(state: *mut TrackerState, json_ptr: *const c_char) -> *const c_char {
    save_profile_request(state, json_ptr, "create_profile")
}

/// Replaces the user profile. Same contract as [`create_profile`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn update_profile(state: *mut TrackerState, json_ptr: *const c_char) -> *const c_char {
    save_profile_request(state, json_ptr, "update_profile")
}

/// Returns the stored profile, or `NotFound` when none is set.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_profile(state: *mut TrackerState) -> *const c_char {
    let state = match state_mut(state, "get_profile") {
        Ok(s) => s,
        Err(error_ptr) => return error_ptr,
    };

    match state.profiles().get_profile() {
        Some(profile) => respond(Ok(ProfileView::from(&profile))),
        None => response_to_c_string(&AppResponse::NotFound("No profile has been set".to_string())),
    }
}

/// Returns the daily target in millilitres (`0` without a profile).
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_daily_target(state: *mut TrackerState) -> *const c_char {
    let state = match state_mut(state, "get_daily_target") {
        Ok(s) => s,
        Err(error_ptr) => return error_ptr,
    };

    respond(Ok(state.profiles().get_daily_target()))
}

/// Records a water intake at the current time.
///
/// # JSON Format
///
/// ```json
/// { "amount_ml": 250, "note": "Morning" }
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn add_water_log(state: *mut TrackerState, json_ptr: *const c_char) -> *const c_char {
    let state = match state_mut(state, "add_water_log") {
        Ok(s) => s,
        Err(error_ptr) => return error_ptr,
    };
    let request: WaterLogRequest = match parse_json(json_ptr, "add_water_log") {
        Ok(r) => r,
        Err(error_ptr) => return error_ptr,
    };

    respond(state.water_logs().add_water_log(request.amount_ml, request.note))
}

/// Changes amount and note of the entry at `index`; the timestamp is kept.
///
/// Indices are positions in the log and shift after a deletion. A negative
/// or out-of-range index yields `NotFound`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn update_water_log(
    state: *mut TrackerState,
    index: i64,
    json_ptr: *const c_char,
) -> *const c_char {
    let state = match state_mut(state, "update_water_log") {
        Ok(s) => s,
        Err(error_ptr) => return error_ptr,
    };
    let request: WaterLogRequest = match parse_json(json_ptr, "update_water_log") {
        Ok(r) => r,
        Err(error_ptr) => return error_ptr,
    };

    let result = log_index(index)
        .and_then(|i| state.water_logs().update_water_log(i, request.amount_ml, request.note));
    respond(result)
}

/// Deletes the entry at `index`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn delete_water_log(state: *mut TrackerState, index: i64) -> *const c_char {
    let state = match state_mut(state, "delete_water_log") {
        Ok(s) => s,
        Err(error_ptr) => return error_ptr,
    };

    match log_index(index).and_then(|i| state.water_logs().delete_water_log(i)) {
        Ok(()) => response_to_c_string(&AppResponse::success("Water log deleted successfully")),
        Err(e) => response_to_c_string(&e),
    }
}

/// Entries from the last `days` days as an array of
/// `{index, amount_ml, timestamp, note}`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_water_logs(state: *mut TrackerState, days: i64) -> *const c_char {
    let state = match state_mut(state, "get_water_logs") {
        Ok(s) => s,
        Err(error_ptr) => return error_ptr,
    };

    respond(state.water_logs().get_water_logs(days).map(to_views))
}

/// Entries between two calendar dates, both days included.
///
/// # JSON Format
///
/// ```json
/// { "start_date": "2024-06-01", "end_date": "2024-06-07" }
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_water_logs_by_range(
    state: *mut TrackerState,
    json_ptr: *const c_char,
) -> *const c_char {
    let state = match state_mut(state, "get_water_logs_by_range") {
        Ok(s) => s,
        Err(error_ptr) => return error_ptr,
    };
    let request: DateRangeRequest = match parse_json(json_ptr, "get_water_logs_by_range") {
        Ok(r) => r,
        Err(error_ptr) => return error_ptr,
    };

    let range = parse_date(&request.start_date)
        .and_then(|start| parse_date(&request.end_date).map(|end| (start, end)));
    respond(range.map(|(start, end)| to_views(state.water_logs().get_water_logs_by_range(start, end))))
}

/// Today's consumption, target and capped progress.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_daily_summary(state: *mut TrackerState) -> *const c_char {
    let state = match state_mut(state, "get_daily_summary") {
        Ok(s) => s,
        Err(error_ptr) => return error_ptr,
    };

    respond(Ok(state.water_logs().daily_summary()))
}

/// Writes a checksummed copy of the dataset to `path`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn export_data(state: *mut TrackerState, path: *const c_char) -> *const c_char {
    let state = match state_mut(state, "export_data") {
        Ok(s) => s,
        Err(error_ptr) => return error_ptr,
    };
    let path = match c_ptr_to_string(path, "path", "export_data") {
        Ok(p) => p,
        Err(error_ptr) => return error_ptr,
    };

    match state.export_data(&path) {
        Ok(()) => response_to_c_string(&AppResponse::Ok(format!("Data exported to {path}"))),
        Err(e) => response_to_c_string(&e),
    }
}

/// Replaces the dataset with the verified file at `path`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn import_data(state: *mut TrackerState, path: *const c_char) -> *const c_char {
    let state = match state_mut(state, "import_data") {
        Ok(s) => s,
        Err(error_ptr) => return error_ptr,
    };
    let path = match c_ptr_to_string(path, "path", "import_data") {
        Ok(p) => p,
        Err(error_ptr) => return error_ptr,
    };

    match state.import_data(&path) {
        Ok(()) => response_to_c_string(&AppResponse::Ok(format!("Data imported from {path}"))),
        Err(e) => response_to_c_string(&e),
    }
}

/// Removes the profile and every water log.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn clear_all_data(state: *mut TrackerState) -> *const c_char {
    let state = match state_mut(state, "clear_all_data") {
        Ok(s) => s,
        Err(error_ptr) => return error_ptr,
    };

    match state.clear_all_data() {
        Ok(()) => response_to_c_string(&AppResponse::success("All data cleared successfully")),
        Err(e) => response_to_c_string(&e),
    }
}

fn save_profile_request(state: *mut TrackerState, json_ptr: *const c_char, fn_name: &str) -> *const c_char {
    let state = match state_mut(state, fn_name) {
        Ok(s) => s,
        Err(error_ptr) => return error_ptr,
    };
    let request: ProfileRequest = match parse_json(json_ptr, fn_name) {
        Ok(r) => r,
        Err(error_ptr) => return error_ptr,
    };

    let result = state.profiles().create_profile(
        request.height_cm,
        request.weight_kg,
        request.age_years,
        &request.gender,
    );
    respond(result.map(|profile| ProfileView::from(&profile)))
}

fn to_views(logs: Vec<(usize, WaterLogEntry)>) -> Vec<WaterLogView> {
    logs.into_iter().map(WaterLogView::from).collect()
}

fn log_index(index: i64) -> Result<usize, AppResponse> {
    usize::try_from(index).map_err(|_| AppResponse::NotFound(format!("Log index {index} out of range.")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppResponse> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| AppResponse::BadRequest(format!("Invalid date '{raw}', expected YYYY-MM-DD: {e}")))
}

/// Serializes a successful payload into an `Ok` response, or passes the error through.
fn respond<T: Serialize>(result: Result<T, AppResponse>) -> *const c_char {
    let response = match result {
        Ok(payload) => match serde_json::to_string(&payload) {
            Ok(json) => AppResponse::Ok(json),
            Err(e) => AppResponse::SerializationError(format!("Failed to serialize result: {e}")),
        },
        Err(e) => e,
    };
    response_to_c_string(&response)
}

/// Borrows the tracker behind `state`, or returns a `BadRequest` response.
fn state_mut<'a>(state: *mut TrackerState, fn_name: &str) -> Result<&'a mut TrackerState, *const c_char> {
    match unsafe { state.as_mut() } {
        Some(s) => Ok(s),
        None => {
            let error = AppResponse::BadRequest(format!("Null state pointer passed to {fn_name}"));
            Err(response_to_c_string(&error))
        }
    }
}

/// Reads the JSON request body handed to `fn_name`.
fn parse_json<T: for<'de> Deserialize<'de>>(json_ptr: *const c_char, fn_name: &str) -> Result<T, *const c_char> {
    let json_str = c_ptr_to_string(json_ptr, "JSON", fn_name)?;
    serde_json::from_str(&json_str).map_err(|e| {
        let error = AppResponse::SerializationError(format!("Invalid JSON passed to {fn_name}: {e}"));
        response_to_c_string(&error)
    })
}

/// Encodes `response` as the heap C string every tracker function returns.
///
/// Null means the response could not be encoded; the reason is logged.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Dropping tracker response, JSON encoding failed: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Dropping tracker response, payload holds a NUL byte at {}", e.nul_position());
            std::ptr::null()
        }
    }
}

/// Copies the `field` argument of `fn_name` out of host memory. Null and
/// non-UTF-8 arguments are answered with `BadRequest`.
fn c_ptr_to_string(ptr: *const c_char, field: &str, fn_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        warn!("{fn_name}: null {field} pointer");
        let error = AppResponse::BadRequest(format!("Null {field} pointer passed to {fn_name}"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            warn!("{fn_name}: {field} is not valid UTF-8: {e}");
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field} passed to {fn_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}
