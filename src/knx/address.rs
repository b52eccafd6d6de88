//! Three-level KNX group address (`main/middle/sub`).

use crate::error::KnxError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_MAIN: u16 = 31;
const MAX_MIDDLE: u16 = 7;
const MAX_SUB: u16 = 255;

/// Logical target of a telegram on the bus.
///
/// Stored as the raw 16-bit value (5 bits main, 3 bits middle, 8 bits sub).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupAddress(u16);

impl GroupAddress {
    /// Build an address from its three levels.
    pub fn new(main: u16, middle: u16, sub: u16) -> Result<Self, KnxError> {
        if main > MAX_MAIN || middle > MAX_MIDDLE || sub > MAX_SUB {
            return Err(KnxError::InvalidGroupAddress(format!(
                "{}/{}/{}",
                main, middle, sub
            )));
        }
        Ok(Self((main << 11) | (middle << 8) | sub))
    }

    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u16 {
        self.0
    }

    pub fn main(&self) -> u16 {
        self.0 >> 11
    }

    pub fn middle(&self) -> u16 {
        (self.0 >> 8) & MAX_MIDDLE
    }

    pub fn sub(&self) -> u16 {
        self.0 & MAX_SUB
    }
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.main(), self.middle(), self.sub())
    }
}

impl FromStr for GroupAddress {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || KnxError::InvalidGroupAddress(s.to_string());

        let parts = s
            .trim()
            .split('/')
            .map(|part| part.parse::<u16>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        match parts.as_slice() {
            [main, middle, sub] => Self::new(*main, *middle, *sub).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for GroupAddress {
    type Error = KnxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupAddress> for String {
    fn from(address: GroupAddress) -> Self {
        address.to_string()
    }
}
