//! Transport towards the bus (tunneling or routing connection).

pub mod logging;

pub use logging::LoggingTransport;

use crate::error::Result;
use crate::knx::Telegram;
use async_trait::async_trait;

/// Sends outgoing telegrams to the bus.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_telegram(&self, telegram: &Telegram) -> Result<()>;
}
