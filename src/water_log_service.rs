//! Water log validation, window queries and progress metrics.

use chrono::{Days, NaiveDate};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::clock::{local_midnight, Clock};
use crate::profile_service::{positive_u32, ProfileService};
use crate::tracker_model::WaterLogEntry;
use crate::tracker_store::DataStore;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Numbers shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub consumed_ml: u64,
    pub target_ml: u32,
    /// Fraction of the target reached, capped at 1.0.
    pub progress: f64,
}

/// Entry count and total over a calendar range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSummary {
    pub entries: usize,
    pub total_ml: u64,
}

pub struct WaterLogService<'s, C: Clock> {
    store: &'s mut DataStore,
    clock: &'s C,
}

impl<'s, C: Clock> WaterLogService<'s, C> {
    pub fn new(store: &'s mut DataStore, clock: &'s C) -> Self {
        Self { store, clock }
    }

    /// Records `amount_ml` at the current time.
    pub fn add_water_log(
        &mut self,
        amount_ml: i64,
        note: Option<String>,
    ) -> Result<WaterLogEntry, AppResponse> {
        let amount_ml = positive_u32(amount_ml, "Amount", "ml")?;
        let entry = WaterLogEntry {
            amount_ml,
            timestamp: self.clock.now(),
            note,
        };

        if !self.store.add_water_log(entry.clone()) {
            return Err(AppResponse::StorageError("Failed to save water log.".to_string()));
        }
        info!("Water log added: {} ml", entry.amount_ml);
        Ok(entry)
    }

    /// Changes amount and note of the entry at `index`, keeping its timestamp.
    pub fn update_water_log(
        &mut self,
        index: usize,
        amount_ml: i64,
        note: Option<String>,
    ) -> Result<WaterLogEntry, AppResponse> {
        let amount_ml = positive_u32(amount_ml, "Amount", "ml")?;
        let current = self.locate(index)?;
        let updated = WaterLogEntry {
            amount_ml,
            timestamp: current.timestamp,
            note,
        };

        if !self.store.update_water_log(index, updated.clone()) {
            return Err(AppResponse::StorageError("Failed to update water log.".to_string()));
        }
        info!("Water log {index} updated: {} ml", updated.amount_ml);
        Ok(updated)
    }

    /// Deletes the entry at `index`. Later entries move down one index.
    pub fn delete_water_log(&mut self, index: usize) -> Result<(), AppResponse> {
        self.locate(index)?;
        if !self.store.delete_water_log(index) {
            return Err(AppResponse::StorageError("Failed to delete water log.".to_string()));
        }
        info!("Water log {index} deleted");
        Ok(())
    }

    /// Entries from the last `days` days, `[now - days*86400, now]`.
    pub fn get_water_logs(&self, days: i64) -> Result<Vec<(usize, WaterLogEntry)>, AppResponse> {
        if days <= 0 {
            return Err(AppResponse::ValidationError(
                "Days must be greater than 0.".to_string(),
            ));
        }
        let end_time = self.clock.now();
        let start_time = end_time - days as f64 * SECONDS_PER_DAY;
        Ok(self.store.get_water_logs(Some(start_time), Some(end_time)))
    }

    /// Entries from local midnight of `start_date` up to local midnight of
    /// the day after `end_date`, so all of `end_date` is included.
    pub fn get_water_logs_by_range(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Vec<(usize, WaterLogEntry)> {
        let start_time = local_midnight(start_date);
        let end_time = match end_date.checked_add_days(Days::new(1)) {
            Some(next_day) => local_midnight(next_day),
            None => f64::INFINITY,
        };
        debug!("Range query {start_date}..={end_date} -> [{start_time}, {end_time}]");
        self.store.get_water_logs(Some(start_time), Some(end_time))
    }

    /// Count and total of [`get_water_logs_by_range`](Self::get_water_logs_by_range).
    pub fn summarize_range(&self, start_date: NaiveDate, end_date: NaiveDate) -> RangeSummary {
        let logs = self.get_water_logs_by_range(start_date, end_date);
        RangeSummary {
            entries: logs.len(),
            total_ml: total_ml(&logs),
        }
    }

    /// Millilitres logged during the last day.
    pub fn get_daily_consumption(&self) -> u64 {
        let end_time = self.clock.now();
        total_ml(
            &self
                .store
                .get_water_logs(Some(end_time - SECONDS_PER_DAY), Some(end_time)),
        )
    }

    /// Share of the daily target consumed, in `[0.0, 1.0]`; 0.0 without a profile.
    pub fn get_progress_percentage(&mut self) -> f64 {
        let target = ProfileService::new(self.store).get_daily_target();
        progress(self.get_daily_consumption(), target)
    }

    pub fn daily_summary(&mut self) -> DailySummary {
        let target_ml = ProfileService::new(self.store).get_daily_target();
        let consumed_ml = self.get_daily_consumption();
        DailySummary {
            consumed_ml,
            target_ml,
            progress: progress(consumed_ml, target_ml),
        }
    }

    /// Re-reads the unfiltered log list and returns the entry at `index`.
    fn locate(&self, index: usize) -> Result<WaterLogEntry, AppResponse> {
        self.store
            .get_water_logs(None, None)
            .into_iter()
            .find(|(i, _)| *i == index)
            .map(|(_, entry)| entry)
            .ok_or_else(|| AppResponse::NotFound(format!("Log index {index} out of range.")))
    }
}

fn total_ml(logs: &[(usize, WaterLogEntry)]) -> u64 {
    logs.iter().map(|(_, entry)| u64::from(entry.amount_ml)).sum()
}

fn progress(consumed_ml: u64, target_ml: u32) -> f64 {
    if target_ml == 0 {
        return 0.0;
    }
    (consumed_ml as f64 / f64::from(target_ml)).min(1.0)
}
