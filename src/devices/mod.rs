//! Devices addressed by incoming telegrams.
//!
//! A device owns one or more remote values and turns the telegrams routed
//! to it by the [`TelegramQueue`](crate::queue::TelegramQueue) into state
//! changes. The [`Devices`] registry maps group addresses to devices.

pub mod action;
pub mod binary_sensor;
pub mod registry;

pub use action::{
    Action, ActionCondition, ActionConfig, ActionHook, CallbackAction, TelegramAction,
};
pub use binary_sensor::{BinarySensor, BinarySensorBuilder, BinarySensorUpdate};
pub use registry::Devices;

use crate::error::Result;
use crate::knx::{GroupAddress, Telegram, TelegramType};
use async_trait::async_trait;

/// A device reachable through the registry.
///
/// Implementations use interior mutability; the queue holds devices as
/// `Arc<dyn Device>` and calls [`Device::process`] from its dispatch task.
#[async_trait]
pub trait Device: Send + Sync {
    fn name(&self) -> &str;

    /// Test if the device listens on `group_address`.
    fn has_group_address(&self, group_address: GroupAddress) -> bool;

    /// Addresses that should be read to sync state.
    fn state_addresses(&self) -> Vec<GroupAddress> {
        Vec::new()
    }

    /// Route a telegram to the handler for its type.
    async fn process(&self, telegram: &Telegram) -> Result<()> {
        match telegram.telegram_type {
            TelegramType::GroupWrite => self.process_group_write(telegram).await,
            TelegramType::GroupResponse => self.process_group_response(telegram).await,
            TelegramType::GroupRead => self.process_group_read(telegram).await,
        }
    }

    async fn process_group_write(&self, telegram: &Telegram) -> Result<()>;

    async fn process_group_response(&self, telegram: &Telegram) -> Result<()> {
        self.process_group_write(telegram).await
    }

    async fn process_group_read(&self, _telegram: &Telegram) -> Result<()> {
        Ok(())
    }
}
