use chrono::NaiveDate;
use serde::Serialize;
use std::time::Duration;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Per-day energy counters (Wh). Observational only; reset when the local
/// date changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyTotals {
    pub day: NaiveDate,
    pub generation_wh: f64,
    pub consumption_wh: f64,
    pub grid_import_wh: f64,
}

impl EnergyTotals {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            generation_wh: 0.0,
            consumption_wh: 0.0,
            grid_import_wh: 0.0,
        }
    }

    /// Accumulate one cycle's power figures over `interval`
    pub fn record(
        &mut self,
        day: NaiveDate,
        generation_w: f64,
        consumption_w: f64,
        grid_import_w: f64,
        interval: Duration,
    ) {
        if day != self.day {
            *self = Self::new(day);
        }
        let hours = interval.as_secs_f64() / SECONDS_PER_HOUR;
        self.generation_wh += generation_w.max(0.0) * hours;
        self.consumption_wh += consumption_w.max(0.0) * hours;
        self.grid_import_wh += grid_import_w.max(0.0) * hours;
    }
}
