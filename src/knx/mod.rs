//! KNX bus primitives: group addresses and telegrams.

pub mod address;
pub mod telegram;

pub use address::GroupAddress;
pub use telegram::{Telegram, TelegramDirection, TelegramType};
