use serde::{Deserialize, Serialize};

/// Fixed category governing evaluation order and activation rule.
///
/// Variants are declared in evaluation order: the priority controller decides
/// critical devices first and battery-gated devices last.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PriorityClass {
    /// Always on (refrigeration, network gear)
    Critical,
    /// On outside the daylight window (lighting)
    TimeBased,
    /// Runs when headroom exceeds the flexible margin (space heater)
    Flexible,
    /// Runs when headroom exceeds the larger high-draw margin (washing)
    HighDrawFlexible,
    /// Needs headroom and a well-charged battery, with hysteresis (AC)
    BatteryGated,
}

impl PriorityClass {
    /// Classes switched off by emergency load shedding
    pub fn is_sheddable(self) -> bool {
        matches!(
            self,
            PriorityClass::Flexible | PriorityClass::HighDrawFlexible | PriorityClass::BatteryGated
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    /// Load drawn while active
    pub load_w: f64,
    pub active: bool,
    pub class: PriorityClass,
}

impl Device {
    pub fn new(name: impl Into<String>, load_w: f64, class: PriorityClass) -> Self {
        Self {
            name: name.into(),
            load_w,
            active: false,
            class,
        }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Power currently drawn by the device
    pub fn power_w(&self) -> f64 {
        if self.active {
            self.load_w
        } else {
            0.0
        }
    }
}

/// Surplus sink switched by the decision loop, outside the priority roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterHeater {
    pub load_w: f64,
    pub active: bool,
}

impl WaterHeater {
    pub const NAME: &'static str = "Water Heater";

    pub fn new(load_w: f64) -> Self {
        Self {
            load_w,
            active: false,
        }
    }

    pub fn power_w(&self) -> f64 {
        if self.active {
            self.load_w
        } else {
            0.0
        }
    }
}

impl Default for WaterHeater {
    fn default() -> Self {
        Self::new(1500.0)
    }
}

/// Ordered device collection.
///
/// Devices are kept sorted by [`PriorityClass`] (stable, so configuration
/// order is preserved within a class).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Device>", into = "Vec<Device>")]
pub struct DeviceRoster {
    devices: Vec<Device>,
}

impl DeviceRoster {
    pub fn new(mut devices: Vec<Device>) -> Self {
        devices.sort_by_key(|d| d.class);
        Self { devices }
    }

    /// Household layout the controller ships with
    pub fn household_default() -> Self {
        Self::new(vec![
            Device::new("Fridge", 150.0, PriorityClass::Critical),
            Device::new("Heater", 200.0, PriorityClass::Flexible),
            Device::new("Light", 100.0, PriorityClass::TimeBased),
            Device::new("Router", 50.0, PriorityClass::Critical),
            Device::new("Washing", 500.0, PriorityClass::HighDrawFlexible),
            Device::new("AC", 1200.0, PriorityClass::BatteryGated),
        ])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Device> {
        self.devices.iter()
    }

    /// Mutable access keeps the ordering invariant: names, loads and classes
    /// are not exposed for mutation, only activation.
    pub fn set_active(&mut self, index: usize, active: bool) {
        if let Some(device) = self.devices.get_mut(index) {
            device.active = active;
        }
    }

    pub fn get(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Sum of loads of all active devices
    pub fn active_load_w(&self) -> f64 {
        self.devices.iter().map(Device::power_w).sum()
    }
}

impl From<Vec<Device>> for DeviceRoster {
    fn from(devices: Vec<Device>) -> Self {
        Self::new(devices)
    }
}

impl From<DeviceRoster> for Vec<Device> {
    fn from(roster: DeviceRoster) -> Self {
        roster.devices
    }
}

impl<'a> IntoIterator for &'a DeviceRoster {
    type Item = &'a Device;
    type IntoIter = std::slice::Iter<'a, Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}
