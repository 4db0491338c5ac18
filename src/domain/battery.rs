use serde::{Deserialize, Serialize};
use std::time::Duration;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Battery operational status as seen after an update
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BatteryStatus {
    Charging,
    Discharging,
    Idle,
}

impl BatteryStatus {
    /// Classify the power actually moved by an update
    pub fn from_applied_w(applied_w: f64) -> Self {
        if applied_w > 0.0 {
            BatteryStatus::Charging
        } else if applied_w < 0.0 {
            BatteryStatus::Discharging
        } else {
            BatteryStatus::Idle
        }
    }
}

/// Battery state and physical parameters.
///
/// `soc_percent` is always kept within `[0, 100]`; every update clamps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryState {
    pub soc_percent: f64,
    pub capacity_wh: f64,
    pub max_charge_w: f64,
    pub max_discharge_w: f64,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
    /// Minimum SoC the battery is normally not discharged below
    pub reserve_floor_percent: f64,
    /// SoC at which surplus is diverted to the water heater
    pub near_full_percent: f64,
}

impl Default for BatteryState {
    fn default() -> Self {
        Self {
            soc_percent: 70.0,
            capacity_wh: 10_000.0,
            max_charge_w: 3000.0,
            max_discharge_w: 3000.0,
            charge_efficiency: 0.92,
            discharge_efficiency: 0.90,
            reserve_floor_percent: 20.0,
            near_full_percent: 95.0,
        }
    }
}

/// Result of one battery update
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryUpdate {
    pub state: BatteryState,
    /// Power the battery actually absorbed (positive) or delivered (negative)
    pub applied_w: f64,
}

impl BatteryState {
    pub fn with_soc(mut self, soc_percent: f64) -> Self {
        self.soc_percent = clamp_soc(soc_percent);
        self
    }

    pub fn at_reserve_floor(&self) -> bool {
        self.soc_percent <= self.reserve_floor_percent
    }

    /// Apply one control interval of charge or discharge driven by `balance_w`.
    ///
    /// Surplus (`balance_w > 0`) charges at `min(balance, max_charge_w)` unless
    /// the battery is full. Deficit (`balance_w < 0`) discharges at
    /// `min(|balance|, max_discharge_w)` while SoC is above the reserve floor.
    /// The applied power is further limited so that a single interval never
    /// overshoots 100% or the reserve floor.
    ///
    /// The SoC delta is the energy moved during `interval`:
    /// - charging: `P * interval_h * eta_c / capacity`
    /// - discharging: `P * interval_h / (eta_d * capacity)`
    pub fn update(&self, balance_w: f64, interval: Duration) -> BatteryUpdate {
        let hours = interval.as_secs_f64() / SECONDS_PER_HOUR;
        let capacity_wh = self.capacity_wh;
        if hours <= 0.0 || capacity_wh <= 0.0 || !balance_w.is_finite() || balance_w == 0.0 {
            return self.unchanged();
        }

        let mut next = self.clone();
        next.soc_percent = clamp_soc(next.soc_percent);

        if balance_w > 0.0 {
            if next.soc_percent >= 100.0 {
                return BatteryUpdate {
                    state: next,
                    applied_w: 0.0,
                };
            }
            let eta_c = self.charge_efficiency.clamp(f64::EPSILON, 1.0);
            let requested_w = balance_w.min(self.max_charge_w.max(0.0));
            let headroom_wh = (100.0 - next.soc_percent) / 100.0 * capacity_wh;
            let soc_limited_w = headroom_wh / (eta_c * hours);
            let applied_w = requested_w.min(soc_limited_w).max(0.0);

            let delta_pct = applied_w * hours * eta_c / capacity_wh * 100.0;
            next.soc_percent = clamp_soc(next.soc_percent + delta_pct);
            BatteryUpdate {
                state: next,
                applied_w,
            }
        } else {
            let floor = self.reserve_floor_percent.clamp(0.0, 100.0);
            if next.soc_percent <= floor {
                return BatteryUpdate {
                    state: next,
                    applied_w: 0.0,
                };
            }
            let eta_d = self.discharge_efficiency.clamp(f64::EPSILON, 1.0);
            let requested_w = (-balance_w).min(self.max_discharge_w.max(0.0));
            let available_wh = (next.soc_percent - floor) / 100.0 * capacity_wh;
            let soc_limited_w = available_wh * eta_d / hours;
            let delivered_w = requested_w.min(soc_limited_w).max(0.0);

            let delta_pct = delivered_w * hours / (eta_d * capacity_wh) * 100.0;
            next.soc_percent = clamp_soc((next.soc_percent - delta_pct).max(floor));
            BatteryUpdate {
                state: next,
                applied_w: -delivered_w,
            }
        }
    }

    fn unchanged(&self) -> BatteryUpdate {
        let mut state = self.clone();
        state.soc_percent = clamp_soc(state.soc_percent);
        BatteryUpdate {
            state,
            applied_w: 0.0,
        }
    }
}

fn clamp_soc(soc: f64) -> f64 {
    if soc.is_nan() {
        0.0
    } else {
        soc.clamp(0.0, 100.0)
    }
}
