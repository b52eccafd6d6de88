//! Remote values bind a device to the group addresses it listens on and
//! translate between telegram payloads and typed values.

pub mod switch;

pub use switch::RemoteValueSwitch;

use crate::error::Result;
use crate::knx::{GroupAddress, Telegram};

/// Encodes/decodes one bus value of a device.
pub trait RemoteValue: Send {
    type Value: Clone + PartialEq + Send;

    /// Test if the telegram address belongs to this value.
    fn has_group_address(&self, group_address: GroupAddress) -> bool;

    /// Addresses that should be read to sync state after startup.
    fn state_addresses(&self) -> Vec<GroupAddress>;

    /// Decode `telegram` into the stored value.
    ///
    /// Returns `true` when the owner should be notified: the telegram was
    /// addressed to this value, decoded successfully, and either changed the
    /// value or `always_callback` is set.
    fn process(&mut self, telegram: &Telegram, always_callback: bool) -> Result<bool>;

    /// Last decoded value, `None` until the first telegram was processed.
    fn value(&self) -> Option<Self::Value>;

    /// Encode a value into a telegram payload.
    fn to_payload(&self, value: &Self::Value) -> Vec<u8>;
}
