use serde::{Deserialize, Serialize};
use std::fmt;

use super::device::{DeviceRoster, WaterHeater};

/// Operating mode, re-derived every cycle from the power snapshot and SoC
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SystemMode {
    /// Generation exceeds load: charge, maybe divert to the water heater
    Surplus,
    /// Load meets or exceeds generation: discharge, maybe import
    Deficit,
    /// SoC below the critical threshold with no grid: shed load
    Critical,
}

/// One relay command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub name: String,
    pub on: bool,
}

/// Full desired output state for one cycle.
///
/// Always carries every device so the sink can apply it as a whole; a failed
/// cycle is healed by the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuationCommand {
    pub devices: Vec<DeviceCommand>,
    pub water_heater: bool,
    /// Advisory: grid import should be engaged
    pub grid_import: bool,
}

impl ActuationCommand {
    pub fn from_state(devices: &DeviceRoster, water_heater: &WaterHeater, grid_import: bool) -> Self {
        Self {
            devices: devices
                .iter()
                .map(|d| DeviceCommand {
                    name: d.name.clone(),
                    on: d.active,
                })
                .collect(),
            water_heater: water_heater.active,
            grid_import,
        }
    }
}

/// Per-device entry of a status report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReport {
    pub name: String,
    pub status: bool,
    /// Load when on, 0 otherwise
    pub power: f64,
}

/// Report handed to the status sink after every cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(rename = "pv_power")]
    pub generation_w: f64,
    #[serde(rename = "consumption")]
    pub total_load_w: f64,
    #[serde(rename = "battery_soc")]
    pub soc_percent: f64,
    #[serde(rename = "grid_power")]
    pub grid_engaged: bool,
    #[serde(rename = "efficiency")]
    pub efficiency_percent: f64,
    pub mode: SystemMode,
    pub devices: Vec<DeviceReport>,
}

impl StatusReport {
    pub fn device_reports(devices: &DeviceRoster, water_heater: &WaterHeater) -> Vec<DeviceReport> {
        devices
            .iter()
            .map(|d| DeviceReport {
                name: d.name.clone(),
                status: d.active,
                power: d.power_w(),
            })
            .chain(std::iter::once(DeviceReport {
                name: WaterHeater::NAME.to_string(),
                status: water_heater.active,
                power: water_heater.power_w(),
            }))
            .collect()
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode={} pv={:.1}W load={:.1}W soc={:.1}% grid={} eff={:.1}%",
            self.mode,
            self.generation_w,
            self.total_load_w,
            self.soc_percent,
            if self.grid_engaged { "on" } else { "off" },
            self.efficiency_percent,
        )
    }
}
