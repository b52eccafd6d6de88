//! 1-bit on/off remote value.

use super::RemoteValue;
use crate::error::{KnxError, Result};
use crate::knx::{GroupAddress, Telegram};
use log::debug;

/// On/off value carried as a single payload byte (`0x00` / `0x01`).
pub struct RemoteValueSwitch {
    device_name: String,
    group_address: Option<GroupAddress>,
    group_address_state: Option<GroupAddress>,
    sync_state: bool,
    invert: bool,
    value: Option<bool>,
}

impl RemoteValueSwitch {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            group_address: None,
            group_address_state: None,
            sync_state: true,
            invert: false,
            value: None,
        }
    }

    /// Address used for writing the value.
    pub fn with_group_address(mut self, group_address: Option<GroupAddress>) -> Self {
        self.group_address = group_address;
        self
    }

    /// Address the current state is reported on.
    pub fn with_group_address_state(mut self, group_address_state: Option<GroupAddress>) -> Self {
        self.group_address_state = group_address_state;
        self
    }

    pub fn with_sync_state(mut self, sync_state: bool) -> Self {
        self.sync_state = sync_state;
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    fn decode(&self, telegram: &Telegram) -> Result<bool> {
        let invalid = || KnxError::CouldNotParseTelegram {
            device: self.device_name.clone(),
            telegram: Box::new(telegram.clone()),
        };

        match telegram.payload.as_deref() {
            Some([0x00]) => Ok(self.invert),
            Some([0x01]) => Ok(!self.invert),
            _ => Err(invalid()),
        }
    }
}

impl RemoteValue for RemoteValueSwitch {
    type Value = bool;

    fn has_group_address(&self, group_address: GroupAddress) -> bool {
        self.group_address == Some(group_address) || self.group_address_state == Some(group_address)
    }

    fn state_addresses(&self) -> Vec<GroupAddress> {
        if !self.sync_state {
            return Vec::new();
        }
        self.group_address_state
            .or(self.group_address)
            .into_iter()
            .collect()
    }

    fn process(&mut self, telegram: &Telegram, always_callback: bool) -> Result<bool> {
        if !self.has_group_address(telegram.group_address) {
            return Ok(false);
        }

        let decoded = self.decode(telegram)?;
        let changed = self.value != Some(decoded);
        self.value = Some(decoded);

        debug!(
            "[RemoteValue] {} decoded {} from {}",
            self.device_name, decoded, telegram.group_address
        );

        Ok(changed || always_callback)
    }

    fn value(&self) -> Option<bool> {
        self.value
    }

    fn to_payload(&self, value: &bool) -> Vec<u8> {
        vec![u8::from(*value != self.invert)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> GroupAddress {
        GroupAddress::new(1, 2, 3).unwrap()
    }

    fn write(payload: Vec<u8>) -> Telegram {
        Telegram::group_write(address(), payload).incoming()
    }

    #[test]
    fn test_ignores_foreign_address() {
        let mut remote_value =
            RemoteValueSwitch::new("sensor").with_group_address_state(Some(address()));
        let telegram =
            Telegram::group_write(GroupAddress::new(1, 2, 4).unwrap(), vec![1]).incoming();
        assert!(!remote_value.process(&telegram, true).unwrap());
        assert_eq!(remote_value.value(), None);
    }

    #[test]
    fn test_notifies_on_change_only_without_always_callback() {
        let mut remote_value =
            RemoteValueSwitch::new("sensor").with_group_address_state(Some(address()));

        assert!(remote_value.process(&write(vec![1]), false).unwrap());
        assert_eq!(remote_value.value(), Some(true));
        assert!(!remote_value.process(&write(vec![1]), false).unwrap());
        assert!(remote_value.process(&write(vec![1]), true).unwrap());
        assert!(remote_value.process(&write(vec![0]), false).unwrap());
        assert_eq!(remote_value.value(), Some(false));
    }

    #[test]
    fn test_invalid_payload() {
        let mut remote_value =
            RemoteValueSwitch::new("sensor").with_group_address_state(Some(address()));
        let err = remote_value.process(&write(vec![2]), true).unwrap_err();
        assert!(matches!(err, KnxError::CouldNotParseTelegram { .. }));

        let read = Telegram::group_read(address()).incoming();
        assert!(remote_value.process(&read, true).is_err());
    }

    #[test]
    fn test_invert() {
        let mut remote_value = RemoteValueSwitch::new("sensor")
            .with_group_address_state(Some(address()))
            .with_invert(true);
        remote_value.process(&write(vec![1]), true).unwrap();
        assert_eq!(remote_value.value(), Some(false));
        assert_eq!(remote_value.to_payload(&true), vec![0]);
    }

    #[test]
    fn test_state_addresses() {
        let remote_value =
            RemoteValueSwitch::new("sensor").with_group_address_state(Some(address()));
        assert_eq!(remote_value.state_addresses(), vec![address()]);

        let remote_value = remote_value.with_sync_state(false);
        assert!(remote_value.state_addresses().is_empty());

        assert!(RemoteValueSwitch::new("empty").state_addresses().is_empty());
    }
}
