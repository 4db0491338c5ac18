use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::domain::{BatteryState, Device, DeviceRoster, Policy, PriorityClass, WaterHeater};
use crate::error::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub controller: ControllerConfig,
    pub battery: BatteryConfig,
    pub policy: Policy,
    pub water_heater: WaterHeaterConfig,
    pub devices: Vec<DeviceConfig>,
    pub prediction: PredictionConfig,
    pub status: StatusConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}
impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

/// How the SoC hint carried by predictions is applied to the battery model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocHintPolicy {
    /// First successful fetch seeds SoC once
    #[default]
    Startup,
    /// Every fresh prediction overwrites SoC
    EveryFetch,
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub cycle_interval_ms: u64,
    /// Upper bound on one relay command
    pub actuation_timeout_ms: u64,
    /// Whether grid import can be engaged at all (islanded sites set false)
    pub grid_available: bool,
    pub soc_hint: SocHintPolicy,
}
impl ControllerConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    pub fn actuation_timeout(&self) -> Duration {
        Duration::from_millis(self.actuation_timeout_ms)
    }
}
impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: 2000,
            actuation_timeout_ms: 1000,
            grid_available: true,
            soc_hint: SocHintPolicy::Startup,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    pub capacity_wh: f64,
    pub initial_soc_percent: f64,
    pub max_charge_w: f64,
    pub max_discharge_w: f64,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
    pub reserve_floor_percent: f64,
    pub near_full_percent: f64,
}
impl BatteryConfig {
    pub fn to_state(&self) -> BatteryState {
        BatteryState {
            soc_percent: self.initial_soc_percent,
            capacity_wh: self.capacity_wh,
            max_charge_w: self.max_charge_w,
            max_discharge_w: self.max_discharge_w,
            charge_efficiency: self.charge_efficiency,
            discharge_efficiency: self.discharge_efficiency,
            reserve_floor_percent: self.reserve_floor_percent,
            near_full_percent: self.near_full_percent,
        }
    }
}
impl Default for BatteryConfig {
    fn default() -> Self {
        let b = BatteryState::default();
        Self {
            capacity_wh: b.capacity_wh,
            initial_soc_percent: b.soc_percent,
            max_charge_w: b.max_charge_w,
            max_discharge_w: b.max_discharge_w,
            charge_efficiency: b.charge_efficiency,
            discharge_efficiency: b.discharge_efficiency,
            reserve_floor_percent: b.reserve_floor_percent,
            near_full_percent: b.near_full_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterHeaterConfig {
    pub load_w: f64,
}
impl Default for WaterHeaterConfig {
    fn default() -> Self {
        Self {
            load_w: WaterHeater::default().load_w,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub load_w: f64,
    pub class: PriorityClass,
    #[serde(default)]
    pub active: bool,
}
impl From<&Device> for DeviceConfig {
    fn from(d: &Device) -> Self {
        Self {
            name: d.name.clone(),
            load_w: d.load_w,
            class: d.class,
            active: d.active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub base_url: String,
    pub fetch_interval_secs: u64,
    pub http_timeout_secs: u64,
}
impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.1.100:5000".to_string(),
            fetch_interval_secs: 60,
            http_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub enabled: bool,
    pub base_url: String,
    pub interval_secs: u64,
    pub http_timeout_secs: u64,
}
impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://192.168.1.100:5000".to_string(),
            interval_secs: 60,
            http_timeout_secs: 10,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::with_household_devices()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("HEC__").split("__"));
        Ok(figment.extract()?)
    }

    /// Defaults plus the stock household roster
    pub fn with_household_devices() -> Self {
        Self {
            devices: DeviceRoster::household_default()
                .iter()
                .map(DeviceConfig::from)
                .collect(),
            ..Self::default()
        }
    }

    pub fn roster(&self) -> DeviceRoster {
        self.devices
            .iter()
            .map(|d| Device::new(d.name.clone(), d.load_w, d.class).with_active(d.active))
            .collect::<Vec<_>>()
            .into()
    }

    pub fn water_heater(&self) -> WaterHeater {
        WaterHeater::new(self.water_heater.load_w)
    }

    /// Clamp invalid values in place, returning what was corrected
    pub fn sanitize(&mut self) -> Vec<ConfigurationError> {
        let mut errors = Vec::new();
        let defaults = BatteryConfig::default();

        let b = &mut self.battery;
        if !(b.capacity_wh.is_finite() && b.capacity_wh > 0.0) {
            errors.push(ConfigurationError::InvalidCapacity {
                value: b.capacity_wh,
                fallback: defaults.capacity_wh,
            });
            b.capacity_wh = defaults.capacity_wh;
        }
        efficiency(
            "battery.charge",
            &mut b.charge_efficiency,
            defaults.charge_efficiency,
            &mut errors,
        );
        efficiency(
            "battery.discharge",
            &mut b.discharge_efficiency,
            defaults.discharge_efficiency,
            &mut errors,
        );
        non_negative("battery.max_charge_w", &mut b.max_charge_w, &mut errors);
        non_negative("battery.max_discharge_w", &mut b.max_discharge_w, &mut errors);
        percent(
            "battery.initial_soc_percent",
            &mut b.initial_soc_percent,
            &mut errors,
        );
        percent(
            "battery.reserve_floor_percent",
            &mut b.reserve_floor_percent,
            &mut errors,
        );
        percent(
            "battery.near_full_percent",
            &mut b.near_full_percent,
            &mut errors,
        );
        if b.near_full_percent < b.reserve_floor_percent {
            errors.push(ConfigurationError::InvertedThresholds {
                lower_field: "battery.reserve_floor_percent",
                lower: b.reserve_floor_percent,
                upper_field: "battery.near_full_percent",
                upper: b.near_full_percent,
            });
            b.reserve_floor_percent = defaults.reserve_floor_percent;
            b.near_full_percent = defaults.near_full_percent;
        }

        let p = &mut self.policy;
        let d = p.daylight;
        if d.start_hour > d.end_hour || d.end_hour > 23 {
            errors.push(ConfigurationError::InvalidDaylightWindow {
                start: d.start_hour,
                end: d.end_hour,
            });
            p.daylight = Default::default();
        }
        non_negative("policy.flexible_margin_w", &mut p.flexible_margin_w, &mut errors);
        non_negative("policy.high_draw_margin_w", &mut p.high_draw_margin_w, &mut errors);
        non_negative(
            "policy.battery_gated_margin_w",
            &mut p.battery_gated_margin_w,
            &mut errors,
        );
        non_negative("policy.grid_tolerance_w", &mut p.grid_tolerance_w, &mut errors);
        non_negative(
            "policy.nominal_grid_capacity_w",
            &mut p.nominal_grid_capacity_w,
            &mut errors,
        );
        non_negative(
            "policy.water_heater_surplus_ratio",
            &mut p.water_heater_surplus_ratio,
            &mut errors,
        );
        percent(
            "policy.battery_assist_soc_percent",
            &mut p.battery_assist_soc_percent,
            &mut errors,
        );
        percent(
            "policy.battery_gated_on_soc_percent",
            &mut p.battery_gated_on_soc_percent,
            &mut errors,
        );
        percent(
            "policy.battery_gated_off_soc_percent",
            &mut p.battery_gated_off_soc_percent,
            &mut errors,
        );
        percent(
            "policy.critical_soc_percent",
            &mut p.critical_soc_percent,
            &mut errors,
        );
        if p.battery_gated_on_soc_percent < p.battery_gated_off_soc_percent {
            let fallback = Policy::default();
            errors.push(ConfigurationError::InvertedThresholds {
                lower_field: "policy.battery_gated_off_soc_percent",
                lower: p.battery_gated_off_soc_percent,
                upper_field: "policy.battery_gated_on_soc_percent",
                upper: p.battery_gated_on_soc_percent,
            });
            p.battery_gated_off_soc_percent = fallback.battery_gated_off_soc_percent;
            p.battery_gated_on_soc_percent = fallback.battery_gated_on_soc_percent;
        }

        if !(self.water_heater.load_w.is_finite() && self.water_heater.load_w >= 0.0) {
            errors.push(ConfigurationError::NegativeLoad {
                device: WaterHeater::NAME.to_string(),
                value: self.water_heater.load_w,
            });
            self.water_heater.load_w = 0.0;
        }
        for device in &mut self.devices {
            if !(device.load_w.is_finite() && device.load_w >= 0.0) {
                errors.push(ConfigurationError::NegativeLoad {
                    device: device.name.clone(),
                    value: device.load_w,
                });
                device.load_w = 0.0;
            }
        }

        let fallback = ControllerConfig::default().cycle_interval_ms;
        if self.controller.cycle_interval_ms == 0 {
            errors.push(ConfigurationError::ZeroInterval {
                field: "controller.cycle_interval_ms",
                fallback_ms: fallback,
            });
            self.controller.cycle_interval_ms = fallback;
        }
        let fallback = PredictionConfig::default().fetch_interval_secs;
        if self.prediction.fetch_interval_secs == 0 {
            errors.push(ConfigurationError::ZeroInterval {
                field: "prediction.fetch_interval_secs",
                fallback_ms: fallback * 1000,
            });
            self.prediction.fetch_interval_secs = fallback;
        }
        let fallback = StatusConfig::default().interval_secs;
        if self.status.interval_secs == 0 {
            errors.push(ConfigurationError::ZeroInterval {
                field: "status.interval_secs",
                fallback_ms: fallback * 1000,
            });
            self.status.interval_secs = fallback;
        }
        positive_timeout(
            "prediction.http_timeout_secs",
            &mut self.prediction.http_timeout_secs,
            PredictionConfig::default().http_timeout_secs,
            &mut errors,
        );
        positive_timeout(
            "status.http_timeout_secs",
            &mut self.status.http_timeout_secs,
            StatusConfig::default().http_timeout_secs,
            &mut errors,
        );
        positive_timeout(
            "controller.actuation_timeout_ms",
            &mut self.controller.actuation_timeout_ms,
            ControllerConfig::default().actuation_timeout_ms,
            &mut errors,
        );

        errors
    }
}

fn non_negative(field: &'static str, value: &mut f64, errors: &mut Vec<ConfigurationError>) {
    if !(value.is_finite() && *value >= 0.0) {
        errors.push(ConfigurationError::NegativePower {
            field,
            value: *value,
        });
        *value = 0.0;
    }
}

fn percent(field: &'static str, value: &mut f64, errors: &mut Vec<ConfigurationError>) {
    if !(0.0..=100.0).contains(&*value) {
        let clamped = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 100.0)
        };
        errors.push(ConfigurationError::PercentOutOfRange {
            field,
            value: *value,
            clamped,
        });
        *value = clamped;
    }
}

fn positive_timeout(
    field: &'static str,
    value: &mut u64,
    fallback: u64,
    errors: &mut Vec<ConfigurationError>,
) {
    if *value == 0 {
        errors.push(ConfigurationError::ZeroTimeout { field, fallback });
        *value = fallback;
    }
}

fn efficiency(
    field: &'static str,
    value: &mut f64,
    fallback: f64,
    errors: &mut Vec<ConfigurationError>,
) {
    if !(*value > 0.0 && *value <= 1.0) {
        errors.push(ConfigurationError::InvalidEfficiency {
            field,
            value: *value,
            fallback,
        });
        *value = fallback;
    }
}
