//! Listeners get first refusal on incoming telegrams.

use crate::error::Result;
use crate::knx::Telegram;
use async_trait::async_trait;

/// Callback offered every incoming GROUP_WRITE / GROUP_RESPONSE before
/// device routing.
///
/// Returning `Ok(true)` claims the telegram; devices are then skipped.
/// An error aborts processing of that telegram only.
#[async_trait]
pub trait TelegramListener: Send + Sync {
    async fn telegram_received(&self, telegram: &Telegram) -> Result<bool>;
}

#[async_trait]
impl<F> TelegramListener for F
where
    F: Fn(&Telegram) -> bool + Send + Sync,
{
    async fn telegram_received(&self, telegram: &Telegram) -> Result<bool> {
        Ok(self(telegram))
    }
}
