use serde::{Deserialize, Serialize};

/// Inclusive hour range treated as daytime (local time)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaylightWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl DaylightWindow {
    pub fn is_daytime(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour <= self.end_hour
    }
}

impl Default for DaylightWindow {
    fn default() -> Self {
        Self {
            start_hour: 6,
            end_hour: 18,
        }
    }
}

/// Decision thresholds shared by the priority controller and the decision loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// When false the priority controller is skipped and device states are
    /// left as they are (manual mode)
    pub auto_mode: bool,
    pub daylight: DaylightWindow,

    /// Headroom over committed load required by flexible devices
    pub flexible_margin_w: f64,
    /// Headroom over committed load required by high-draw flexible devices
    pub high_draw_margin_w: f64,
    /// Headroom over committed load required by battery-gated devices
    pub battery_gated_margin_w: f64,

    /// Battery power counts towards available power above this SoC
    pub battery_assist_soc_percent: f64,
    /// Battery-gated devices may switch on above this SoC
    pub battery_gated_on_soc_percent: f64,
    /// Battery-gated devices are forced off below this SoC
    pub battery_gated_off_soc_percent: f64,

    /// Load shedding below this SoC when the grid is not engaged
    pub critical_soc_percent: f64,
    /// Fraction of the water-heater load the post-charge surplus must exceed
    pub water_heater_surplus_ratio: f64,
    /// Remaining deficit tolerated before grid import is engaged
    pub grid_tolerance_w: f64,
    /// Grid capacity used by the efficiency metric when importing
    pub nominal_grid_capacity_w: f64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            auto_mode: true,
            daylight: DaylightWindow::default(),
            flexible_margin_w: 200.0,
            high_draw_margin_w: 500.0,
            battery_gated_margin_w: 1200.0,
            battery_assist_soc_percent: 30.0,
            battery_gated_on_soc_percent: 50.0,
            battery_gated_off_soc_percent: 30.0,
            critical_soc_percent: 10.0,
            water_heater_surplus_ratio: 0.8,
            grid_tolerance_w: 100.0,
            nominal_grid_capacity_w: 5000.0,
        }
    }
}
