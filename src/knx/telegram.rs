//! Bus telegram value type.

use super::GroupAddress;
use std::fmt;
use strum::Display;

/// Whether a telegram was received from the bus or is to be sent to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TelegramDirection {
    Incoming,
    Outgoing,
}

/// Group communication service carried by a telegram.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TelegramType {
    GroupWrite,
    GroupResponse,
    GroupRead,
}

/// One bus message. Immutable once built; consumed once by the queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Telegram {
    pub direction: TelegramDirection,
    pub telegram_type: TelegramType,
    pub group_address: GroupAddress,
    /// Encoded value. Absent for GROUP_READ.
    pub payload: Option<Vec<u8>>,
}

impl Telegram {
    pub fn new(
        group_address: GroupAddress,
        telegram_type: TelegramType,
        direction: TelegramDirection,
        payload: Option<Vec<u8>>,
    ) -> Self {
        Self {
            direction,
            telegram_type,
            group_address,
            payload,
        }
    }

    /// Outgoing GROUP_WRITE carrying `payload`.
    pub fn group_write(group_address: GroupAddress, payload: Vec<u8>) -> Self {
        Self::new(
            group_address,
            TelegramType::GroupWrite,
            TelegramDirection::Outgoing,
            Some(payload),
        )
    }

    /// Outgoing GROUP_RESPONSE carrying `payload`.
    pub fn group_response(group_address: GroupAddress, payload: Vec<u8>) -> Self {
        Self::new(
            group_address,
            TelegramType::GroupResponse,
            TelegramDirection::Outgoing,
            Some(payload),
        )
    }

    /// Outgoing GROUP_READ (no payload).
    pub fn group_read(group_address: GroupAddress) -> Self {
        Self::new(
            group_address,
            TelegramType::GroupRead,
            TelegramDirection::Outgoing,
            None,
        )
    }

    /// Same telegram, marked as received from the bus.
    pub fn incoming(mut self) -> Self {
        self.direction = TelegramDirection::Incoming;
        self
    }

    /// Same telegram, marked as to be sent to the bus.
    pub fn outgoing(mut self) -> Self {
        self.direction = TelegramDirection::Outgoing;
        self
    }

    pub fn is_incoming(&self) -> bool {
        self.direction == TelegramDirection::Incoming
    }

    pub fn is_outgoing(&self) -> bool {
        self.direction == TelegramDirection::Outgoing
    }
}

impl fmt::Display for Telegram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.direction, self.telegram_type, self.group_address
        )?;
        if let Some(payload) = &self.payload {
            write!(f, " payload=[")?;
            for (i, byte) in payload.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "0x{:02X}", byte)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
