//! Pure energy-management decision cycle.
//!
//! `run_cycle` takes the current [`SystemState`] and this cycle's inputs and
//! returns the next state together with the actuation command and status
//! report. It performs no I/O and reads no clocks.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::priority::{apply_priorities, PriorityDecision, PriorityInputs};
use super::safety::SafetyEvent;
use crate::domain::{
    ActuationCommand, BatteryState, DeviceRoster, Policy, StatusReport, SystemMode, WaterHeater,
};
use crate::error::ConfigurationError;
use crate::power_flow::{sanitize_generation, PowerSnapshot};

/// Everything carried from one cycle to the next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    pub battery: BatteryState,
    pub devices: DeviceRoster,
    pub water_heater: WaterHeater,
    pub grid_engaged: bool,
    pub last_efficiency_percent: f64,
}

impl SystemState {
    pub fn new(battery: BatteryState, devices: DeviceRoster, water_heater: WaterHeater) -> Self {
        Self {
            battery,
            devices,
            water_heater,
            grid_engaged: false,
            last_efficiency_percent: 100.0,
        }
    }
}

impl Default for SystemState {
    fn default() -> Self {
        Self::new(
            BatteryState::default(),
            DeviceRoster::household_default(),
            WaterHeater::default(),
        )
    }
}

/// Per-cycle inputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleInputs {
    /// Last known generation estimate
    pub generation_w: f64,
    /// Local hour of day, 0..=23
    pub local_hour: u32,
    /// Elapsed control interval the battery update covers
    pub interval: Duration,
    /// Whether a grid connection is present to import from
    pub grid_available: bool,
}

/// Result of one decision cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub state: SystemState,
    pub snapshot: PowerSnapshot,
    pub mode: SystemMode,
    /// `None` in manual mode
    pub priority: Option<PriorityDecision>,
    /// Positive = charging, negative = discharging
    pub battery_applied_w: f64,
    /// Surplus left after charging (positive) or deficit left after
    /// discharging (negative)
    pub remaining_w: f64,
    /// Devices switched off by load shedding
    pub shed_devices: Vec<String>,
    pub efficiency_percent: f64,
    pub command: ActuationCommand,
    pub report: StatusReport,
    pub events: Vec<SafetyEvent>,
    pub config_errors: Vec<ConfigurationError>,
}

impl CycleOutcome {
    pub fn load_shed(&self) -> bool {
        self.mode == SystemMode::Critical
    }

    /// Power imported from the grid this cycle, as an estimate
    pub fn grid_import_w(&self) -> f64 {
        if self.state.grid_engaged {
            (-self.remaining_w).max(0.0)
        } else {
            0.0
        }
    }
}

/// Run one decision cycle.
///
/// Order: priority pass (auto mode only), power balance, surplus/deficit
/// resolution with the battery update, critical load shedding, efficiency.
pub fn run_cycle(state: &SystemState, inputs: &CycleInputs, policy: &Policy) -> CycleOutcome {
    let mut next = state.clone();
    let mut events = Vec::new();
    let mut config_errors = Vec::new();

    let (generation_w, clamp) = sanitize_generation(inputs.generation_w);
    config_errors.extend(clamp);

    let priority = policy.auto_mode.then(|| {
        apply_priorities(
            &mut next.devices,
            &PriorityInputs {
                generation_w,
                committed_load_w: next.water_heater.power_w(),
                soc_percent: next.battery.soc_percent,
                max_battery_power_w: next.battery.max_discharge_w,
                local_hour: inputs.local_hour,
            },
            policy,
        )
    });

    let (snapshot, _) = PowerSnapshot::compute(&next.devices, &next.water_heater, generation_w);
    let balance_w = snapshot.balance_w;
    let update = next.battery.update(balance_w, inputs.interval);
    next.battery = update.state;

    let (mut mode, remaining_w) = if snapshot.is_surplus() {
        let remaining_surplus_w = balance_w - update.applied_w;
        next.water_heater.active = next.battery.soc_percent >= next.battery.near_full_percent
            && remaining_surplus_w > next.water_heater.load_w * policy.water_heater_surplus_ratio;
        next.grid_engaged = false;
        (SystemMode::Surplus, remaining_surplus_w)
    } else {
        // applied_w is <= 0 while discharging
        let remaining_deficit_w = (-balance_w + update.applied_w).max(0.0);
        let at_floor = next.battery.at_reserve_floor();
        if at_floor {
            events.push(SafetyEvent::ReserveFloorReached {
                soc_percent: next.battery.soc_percent,
                floor_percent: next.battery.reserve_floor_percent,
            });
        }

        let wants_grid = at_floor || remaining_deficit_w > policy.grid_tolerance_w;
        if wants_grid && !inputs.grid_available {
            events.push(SafetyEvent::GridUnavailable {
                deficit_w: remaining_deficit_w,
            });
        }
        next.grid_engaged = wants_grid && inputs.grid_available;
        next.water_heater.active = false;
        (SystemMode::Deficit, -remaining_deficit_w)
    };

    let mut shed_devices = Vec::new();
    if next.battery.soc_percent < policy.critical_soc_percent && !next.grid_engaged {
        mode = SystemMode::Critical;
        shed_devices = shed_load(&mut next.devices);
        next.water_heater.active = false;
        events.push(SafetyEvent::LoadShed {
            soc_percent: next.battery.soc_percent,
            limit_percent: policy.critical_soc_percent,
            devices: shed_devices.clone(),
        });
    }

    let efficiency_percent = efficiency_percent(
        snapshot.total_load_w,
        snapshot.generation_w,
        next.grid_engaged,
        policy.nominal_grid_capacity_w,
    );
    next.last_efficiency_percent = efficiency_percent;

    let command = ActuationCommand::from_state(&next.devices, &next.water_heater, next.grid_engaged);
    let report = StatusReport {
        generation_w: snapshot.generation_w,
        total_load_w: snapshot.total_load_w,
        soc_percent: next.battery.soc_percent,
        grid_engaged: next.grid_engaged,
        efficiency_percent,
        mode,
        devices: StatusReport::device_reports(&next.devices, &next.water_heater),
    };

    CycleOutcome {
        state: next,
        snapshot,
        mode,
        priority,
        battery_applied_w: update.applied_w,
        remaining_w,
        shed_devices,
        efficiency_percent,
        command,
        report,
        events,
        config_errors,
    }
}

/// Force off every active sheddable device, returning their names
fn shed_load(devices: &mut DeviceRoster) -> Vec<String> {
    let targets: Vec<(usize, String)> = devices
        .iter()
        .enumerate()
        .filter(|(_, d)| d.class.is_sheddable() && d.active)
        .map(|(i, d)| (i, d.name.clone()))
        .collect();
    for (index, _) in &targets {
        devices.set_active(*index, false);
    }
    targets.into_iter().map(|(_, name)| name).collect()
}

/// Share of available power that is being used, in percent.
///
/// `available = generation + (nominal grid capacity if importing)`.
/// 100 with no load, 0 with nothing available, otherwise clamped to [0, 100].
pub fn efficiency_percent(
    total_load_w: f64,
    generation_w: f64,
    grid_engaged: bool,
    nominal_grid_capacity_w: f64,
) -> f64 {
    if total_load_w == 0.0 {
        return 100.0;
    }
    let available_w = generation_w + if grid_engaged { nominal_grid_capacity_w } else { 0.0 };
    if available_w == 0.0 {
        return 0.0;
    }
    (total_load_w / available_w * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Device, PriorityClass};

    const CYCLE: Duration = Duration::from_secs(2);

    fn manual() -> Policy {
        Policy {
            auto_mode: false,
            ..Policy::default()
        }
    }

    fn inputs(generation_w: f64) -> CycleInputs {
        CycleInputs {
            generation_w,
            local_hour: 12,
            interval: CYCLE,
            grid_available: true,
        }
    }

    /// Single critical load of `load_w`, a flexible heater and an AC, both on
    fn state(load_w: f64, soc: f64) -> SystemState {
        SystemState::new(
            BatteryState::default().with_soc(soc),
            DeviceRoster::new(vec![
                Device::new("Base", load_w, PriorityClass::Critical).with_active(true),
                Device::new("Heater", 200.0, PriorityClass::Flexible),
                Device::new("AC", 1200.0, PriorityClass::BatteryGated),
            ]),
            WaterHeater::new(1500.0),
        )
    }

    #[test]
    fn test_surplus_charges_and_keeps_grid_off() {
        let mut s = state(1800.0, 75.0);
        s.grid_engaged = true;
        let out = run_cycle(&s, &inputs(2500.0), &manual());
        assert_eq!(out.mode, SystemMode::Surplus);
        assert_eq!(out.battery_applied_w, 700.0);
        assert_eq!(out.remaining_w, 0.0);
        assert!(!out.state.grid_engaged);
        assert!(!out.state.water_heater.active);
        assert!(out.state.battery.soc_percent > 75.0);
    }

    #[test]
    fn test_water_heater_on_when_near_full_with_excess() {
        // 5000W surplus, 3000W into the battery, 2000W left > 0.8 * 1500W
        let out = run_cycle(&state(0.0, 96.0), &inputs(5000.0), &manual());
        assert_eq!(out.battery_applied_w, 3000.0);
        assert!(out.state.water_heater.active);
        assert!(out.command.water_heater);
    }

    #[test]
    fn test_water_heater_off_when_excess_too_small() {
        // 4100W surplus, 3000W charged, 1100W left < 1200W
        let out = run_cycle(&state(0.0, 96.0), &inputs(4100.0), &manual());
        assert!(!out.state.water_heater.active);
    }

    #[test]
    fn test_water_heater_uses_full_surplus_when_battery_full() {
        let out = run_cycle(&state(0.0, 100.0), &inputs(1300.0), &manual());
        assert_eq!(out.battery_applied_w, 0.0);
        assert_eq!(out.remaining_w, 1300.0);
        assert!(out.state.water_heater.active);
    }

    #[test]
    fn test_water_heater_off_below_near_full() {
        let out = run_cycle(&state(0.0, 90.0), &inputs(10_000.0), &manual());
        assert!(!out.state.water_heater.active);
    }

    #[test]
    fn test_water_heater_off_in_deficit() {
        let mut s = state(800.0, 97.0);
        s.water_heater.active = true;
        let out = run_cycle(&s, &inputs(1000.0), &manual());
        // 1000 - (800 + 1500) < 0
        assert_eq!(out.mode, SystemMode::Deficit);
        assert!(!out.state.water_heater.active);
    }

    #[test]
    fn test_deficit_covered_by_battery_keeps_grid_off() {
        let out = run_cycle(&state(1000.0, 60.0), &inputs(200.0), &manual());
        assert_eq!(out.mode, SystemMode::Deficit);
        assert_eq!(out.battery_applied_w, -800.0);
        assert_eq!(out.remaining_w, 0.0);
        assert!(!out.state.grid_engaged);
        assert_eq!(out.grid_import_w(), 0.0);
    }

    #[test]
    fn test_deficit_beyond_battery_power_engages_grid() {
        let out = run_cycle(&state(4000.0, 60.0), &inputs(500.0), &manual());
        assert_eq!(out.battery_applied_w, -3000.0);
        assert_eq!(out.remaining_w, -500.0);
        assert!(out.state.grid_engaged);
        assert_eq!(out.grid_import_w(), 500.0);
    }

    #[test]
    fn test_small_remaining_deficit_within_tolerance() {
        let out = run_cycle(&state(3100.0, 60.0), &inputs(0.0), &manual());
        assert_eq!(out.remaining_w, -100.0);
        assert!(!out.state.grid_engaged);
    }

    #[test]
    fn test_grid_forced_at_reserve_floor() {
        let out = run_cycle(&state(50.0, 20.0), &inputs(0.0), &manual());
        assert!(out.state.grid_engaged);
        assert!(out
            .events
            .iter()
            .any(|e| matches!(e, SafetyEvent::ReserveFloorReached { .. })));
    }

    #[test]
    fn test_zero_balance_is_deficit_mode() {
        let out = run_cycle(&state(500.0, 60.0), &inputs(500.0), &manual());
        assert_eq!(out.mode, SystemMode::Deficit);
        assert_eq!(out.battery_applied_w, 0.0);
        assert!(!out.state.grid_engaged);
    }

    #[test]
    fn test_critical_sheds_overrides_priority_decision() {
        let mut s = state(100.0, 5.0);
        s.devices.set_active(1, true);
        s.devices.set_active(2, true);
        let no_grid = CycleInputs {
            grid_available: false,
            ..inputs(0.0)
        };
        let out = run_cycle(&s, &no_grid, &manual());
        assert_eq!(out.mode, SystemMode::Critical);
        assert!(out.load_shed());
        assert_eq!(out.shed_devices, vec!["Heater".to_string(), "AC".to_string()]);
        assert!(out.state.devices.get("Base").map(|d| d.active).unwrap_or(false));
        assert!(out
            .events
            .iter()
            .any(|e| matches!(e, SafetyEvent::GridUnavailable { .. })));
    }

    #[test]
    fn test_no_shedding_when_grid_engaged() {
        let mut s = state(100.0, 5.0);
        s.devices.set_active(1, true);
        let out = run_cycle(&s, &inputs(0.0), &manual());
        assert!(out.state.grid_engaged);
        assert_eq!(out.mode, SystemMode::Deficit);
        assert!(out.state.devices.get("Heater").map(|d| d.active).unwrap_or(false));
    }

    #[test]
    fn test_manual_mode_leaves_devices_alone() {
        let out = run_cycle(&state(100.0, 60.0), &inputs(10_000.0), &manual());
        assert!(out.priority.is_none());
        assert!(!out.state.devices.get("Heater").map(|d| d.active).unwrap_or(true));
    }

    #[test]
    fn test_auto_mode_runs_priority_before_balance() {
        let out = run_cycle(&state(100.0, 60.0), &inputs(10_000.0), &Policy::default());
        assert!(out.priority.is_some());
        // Heater and AC switched on, and counted in this cycle's load
        assert_eq!(out.snapshot.total_load_w, 1500.0);
    }

    #[test]
    fn test_negative_generation_reported_and_clamped() {
        let out = run_cycle(&state(100.0, 60.0), &inputs(-50.0), &manual());
        assert_eq!(out.snapshot.generation_w, 0.0);
        assert_eq!(
            out.config_errors,
            vec![ConfigurationError::NegativeGeneration { value: -50.0 }]
        );
    }

    #[test]
    fn test_efficiency_edge_cases() {
        assert_eq!(efficiency_percent(0.0, 0.0, false, 5000.0), 100.0);
        assert_eq!(efficiency_percent(500.0, 0.0, false, 5000.0), 0.0);
        assert!((efficiency_percent(1800.0, 2500.0, false, 5000.0) - 72.0).abs() < 1e-9);
        assert_eq!(efficiency_percent(1800.0, 500.0, true, 5000.0), 1800.0 / 5500.0 * 100.0);
        assert_eq!(efficiency_percent(3000.0, 1000.0, false, 5000.0), 100.0);
    }

    #[test]
    fn test_cycle_is_deterministic() {
        let s = state(1800.0, 75.0);
        let a = run_cycle(&s, &inputs(2500.0), &Policy::default());
        let b = run_cycle(&s, &inputs(2500.0), &Policy::default());
        assert_eq!(a, b);
    }
}
