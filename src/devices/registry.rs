//! Device registry.

use super::{BinarySensor, Device};
use crate::config::DevicesConfig;
use crate::error::{KnxError, Result};
use crate::knx::{GroupAddress, Telegram};
use crate::queue::TelegramSender;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// All devices known to the bus client, in insertion order.
#[derive(Default)]
pub struct Devices {
    devices: RwLock<Vec<Arc<dyn Device>>>,
}

impl Devices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, device: Arc<dyn Device>) {
        debug!("[Devices] Adding {}", device.name());
        self.devices.write().push(device);
    }

    /// Add every configured device. Names must be unique; on error nothing
    /// is added.
    pub fn add_from_config(
        &self,
        config: &DevicesConfig,
        sender: &TelegramSender,
    ) -> Result<Vec<Arc<BinarySensor>>> {
        let mut devices = self.devices.write();

        let mut names: HashSet<&str> = devices.iter().map(|device| device.name()).collect();
        for sensor_config in &config.binary_sensors {
            if !names.insert(&sensor_config.name) {
                return Err(KnxError::InvalidDeviceConfig {
                    device: sensor_config.name.clone(),
                    reason: "duplicate device name".to_string(),
                });
            }
        }
        drop(names);

        let sensors: Vec<_> = config
            .binary_sensors
            .iter()
            .map(|sensor_config| BinarySensor::from_config(sensor_config, sender))
            .collect();
        for sensor in &sensors {
            debug!("[Devices] Adding {}", sensor.name());
            devices.push(sensor.clone());
        }

        info!("[Devices] Loaded {} binary sensor(s)", sensors.len());
        Ok(sensors)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Device>> {
        self.devices
            .read()
            .iter()
            .find(|device| device.name() == name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Snapshot of all devices.
    pub fn all(&self) -> Vec<Arc<dyn Device>> {
        self.devices.read().clone()
    }

    /// Devices listening on `group_address`, in insertion order.
    pub fn devices_by_group_address(&self, group_address: GroupAddress) -> Vec<Arc<dyn Device>> {
        self.devices
            .read()
            .iter()
            .filter(|device| device.has_group_address(group_address))
            .cloned()
            .collect()
    }

    /// Request the current state of every device by queueing a GROUP_READ
    /// for each of its state addresses.
    pub fn sync(&self, sender: &TelegramSender) -> Result<usize> {
        let mut requested = 0;
        for device in self.all() {
            for group_address in device.state_addresses() {
                sender.send(Telegram::group_read(group_address))?;
                requested += 1;
            }
        }
        debug!("[Devices] Requested state for {} address(es)", requested);
        Ok(requested)
    }
}
