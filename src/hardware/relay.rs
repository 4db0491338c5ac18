use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::{ActuationCommand, WaterHeater};
use crate::error::ActuationError;

/// Applies on/off decisions to physical loads
#[async_trait]
pub trait ActuationSink: Send + Sync {
    async fn apply(&self, command: &ActuationCommand) -> Result<(), ActuationError>;
}

/// In-memory relay bank. Remembers the last applied command and logs every
/// relay that changes position.
#[derive(Clone, Default)]
pub struct SimulatedRelayBank {
    last: Arc<RwLock<Option<ActuationCommand>>>,
    applied: Arc<RwLock<u64>>,
    offline: Arc<AtomicBool>,
}

impl SimulatedRelayBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the bank offline; every `apply` fails until brought back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn last_command(&self) -> Option<ActuationCommand> {
        self.last.read().await.clone()
    }

    pub async fn applied_count(&self) -> u64 {
        *self.applied.read().await
    }
}

#[async_trait]
impl ActuationSink for SimulatedRelayBank {
    async fn apply(&self, command: &ActuationCommand) -> Result<(), ActuationError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ActuationError::Unavailable("relay bank offline".into()));
        }

        let mut last = self.last.write().await;
        for cmd in &command.devices {
            let was_on = last
                .as_ref()
                .and_then(|prev| prev.devices.iter().find(|d| d.name == cmd.name))
                .map(|d| d.on);
            if was_on != Some(cmd.on) {
                info!(device = %cmd.name, on = cmd.on, "relay switched");
            }
        }
        let heater_was_on = last.as_ref().map(|prev| prev.water_heater);
        if heater_was_on != Some(command.water_heater) {
            info!(
                device = WaterHeater::NAME,
                on = command.water_heater,
                "relay switched"
            );
        }
        debug!(grid_import = command.grid_import, "actuation applied");

        *last = Some(command.clone());
        *self.applied.write().await += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Device, DeviceRoster, PriorityClass};

    fn command(light_on: bool) -> ActuationCommand {
        let roster = DeviceRoster::new(vec![
            Device::new("Fridge", 150.0, PriorityClass::Critical).with_active(true),
            Device::new("Light", 100.0, PriorityClass::TimeBased).with_active(light_on),
        ]);
        ActuationCommand::from_state(&roster, &WaterHeater::default(), false)
    }

    #[tokio::test]
    async fn test_records_last_command() {
        let bank = SimulatedRelayBank::new();
        bank.apply(&command(true)).await.unwrap();
        bank.apply(&command(false)).await.unwrap();

        assert_eq!(bank.last_command().await, Some(command(false)));
        assert_eq!(bank.applied_count().await, 2);
    }

    #[tokio::test]
    async fn test_offline_bank_rejects_commands() {
        let bank = SimulatedRelayBank::new();
        bank.set_offline(true);
        let err = bank.apply(&command(true)).await.unwrap_err();
        assert!(matches!(err, ActuationError::Unavailable(_)));
        assert!(bank.last_command().await.is_none());

        bank.set_offline(false);
        assert!(bank.apply(&command(true)).await.is_ok());
    }
}
