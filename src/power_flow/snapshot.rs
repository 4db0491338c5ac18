use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{DeviceRoster, WaterHeater};
use crate::error::ConfigurationError;

/// Power figures for one control cycle
///
/// Balance equation: `balance = generation - total_load`
/// (positive = surplus, zero or negative = deficit)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSnapshot {
    pub generation_w: f64,
    /// Active roster devices plus the water heater when on
    pub total_load_w: f64,
    pub balance_w: f64,
}

impl PowerSnapshot {
    /// Aggregate active loads and compute the balance against generation.
    ///
    /// Negative or non-finite generation is clamped to zero and reported
    /// as a [`ConfigurationError`]; the snapshot is still produced.
    pub fn compute(
        devices: &DeviceRoster,
        water_heater: &WaterHeater,
        generation_w: f64,
    ) -> (Self, Option<ConfigurationError>) {
        let (generation_w, clamp) = sanitize_generation(generation_w);
        let total_load_w = devices.active_load_w() + water_heater.power_w();
        let snapshot = Self {
            generation_w,
            total_load_w,
            balance_w: generation_w - total_load_w,
        };
        (snapshot, clamp)
    }

    pub fn is_surplus(&self) -> bool {
        self.balance_w > 0.0
    }
}

/// Clamp a generation figure to a usable, non-negative value
pub fn sanitize_generation(generation_w: f64) -> (f64, Option<ConfigurationError>) {
    if generation_w.is_finite() && generation_w >= 0.0 {
        (generation_w, None)
    } else {
        (
            0.0,
            Some(ConfigurationError::NegativeGeneration {
                value: generation_w,
            }),
        )
    }
}

impl fmt::Display for PowerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PV: {:.1}W, Load: {:.1}W, Balance: {:+.1}W",
            self.generation_w, self.total_load_w, self.balance_w
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Device, PriorityClass};

    fn roster() -> DeviceRoster {
        DeviceRoster::new(vec![
            Device::new("Fridge", 150.0, PriorityClass::Critical).with_active(true),
            Device::new("Light", 100.0, PriorityClass::TimeBased).with_active(false),
            Device::new("Washing", 500.0, PriorityClass::HighDrawFlexible).with_active(true),
        ])
    }

    #[test]
    fn test_sums_only_active_devices() {
        let (snap, clamp) = PowerSnapshot::compute(&roster(), &WaterHeater::default(), 1000.0);
        assert!(clamp.is_none());
        assert_eq!(snap.total_load_w, 650.0);
        assert_eq!(snap.balance_w, 350.0);
        assert!(snap.is_surplus());
        assert_eq!(
            snap.to_string(),
            "PV: 1000.0W, Load: 650.0W, Balance: +350.0W"
        );
    }

    #[test]
    fn test_includes_water_heater_when_on() {
        let mut heater = WaterHeater::new(1500.0);
        heater.active = true;
        let (snap, _) = PowerSnapshot::compute(&roster(), &heater, 1000.0);
        assert_eq!(snap.total_load_w, 2150.0);
        assert_eq!(snap.balance_w, -1150.0);
        assert!(!snap.is_surplus());
    }

    #[test]
    fn test_zero_balance_is_not_surplus() {
        let (snap, _) = PowerSnapshot::compute(&roster(), &WaterHeater::default(), 650.0);
        assert_eq!(snap.balance_w, 0.0);
        assert!(!snap.is_surplus());
    }

    #[test]
    fn test_negative_generation_is_clamped() {
        let (snap, clamp) = PowerSnapshot::compute(&roster(), &WaterHeater::default(), -300.0);
        assert_eq!(snap.generation_w, 0.0);
        assert_eq!(snap.balance_w, -650.0);
        assert_eq!(
            clamp,
            Some(ConfigurationError::NegativeGeneration { value: -300.0 })
        );
    }

    #[test]
    fn test_nan_generation_is_clamped() {
        let (snap, clamp) = PowerSnapshot::compute(&roster(), &WaterHeater::default(), f64::NAN);
        assert_eq!(snap.generation_w, 0.0);
        assert!(clamp.is_some());
    }
}
