use crate::domain::{DeviceRoster, Policy, PriorityClass};

/// Inputs to one priority pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityInputs {
    pub generation_w: f64,
    /// Load already committed outside the roster (water heater)
    pub committed_load_w: f64,
    pub soc_percent: f64,
    /// Battery power that can back flexible loads
    pub max_battery_power_w: f64,
    /// Local hour of day, 0..=23
    pub local_hour: u32,
}

/// Figures the pass worked with, for logging
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityDecision {
    pub available_power_w: f64,
    /// Committed load after every device was decided
    pub committed_load_w: f64,
}

/// Decide activation for every device in roster order.
///
/// Higher-priority devices are decided first; each one switched on adds its
/// load to the committed total that lower-priority devices must clear.
pub fn apply_priorities(
    devices: &mut DeviceRoster,
    inputs: &PriorityInputs,
    policy: &Policy,
) -> PriorityDecision {
    let battery_assist_w = if inputs.soc_percent > policy.battery_assist_soc_percent {
        inputs.max_battery_power_w.max(0.0)
    } else {
        0.0
    };
    let available_power_w = inputs.generation_w.max(0.0) + battery_assist_w;
    let daytime = policy.daylight.is_daytime(inputs.local_hour);

    let mut committed_load_w = inputs.committed_load_w.max(0.0);
    let mut decisions = Vec::with_capacity(devices.len());

    for device in devices.iter() {
        let active = match device.class {
            PriorityClass::Critical => true,
            PriorityClass::TimeBased => !daytime,
            PriorityClass::Flexible => {
                available_power_w > committed_load_w + policy.flexible_margin_w
            }
            PriorityClass::HighDrawFlexible => {
                available_power_w > committed_load_w + policy.high_draw_margin_w
            }
            PriorityClass::BatteryGated => battery_gated_next(
                device.active,
                available_power_w > committed_load_w + policy.battery_gated_margin_w,
                inputs.soc_percent,
                policy,
            ),
        };
        if active {
            committed_load_w += device.load_w;
        }
        decisions.push(active);
    }

    for (index, active) in decisions.into_iter().enumerate() {
        devices.set_active(index, active);
    }

    PriorityDecision {
        available_power_w,
        committed_load_w,
    }
}

/// Hysteresis for battery-gated devices.
///
/// Off below the low threshold, on when headroom allows and SoC is above the
/// high threshold, otherwise the previous state holds.
fn battery_gated_next(current: bool, has_headroom: bool, soc_percent: f64, policy: &Policy) -> bool {
    if soc_percent < policy.battery_gated_off_soc_percent {
        false
    } else if has_headroom && soc_percent > policy.battery_gated_on_soc_percent {
        true
    } else {
        current
    }
}
