//! Telegram queue and listeners.
//!
//! Devices and external callers push telegrams through a [`TelegramSender`].
//! The [`TelegramQueue`] dispatch task consumes them in order: outgoing
//! telegrams go to the transport (rate limited), incoming ones are offered
//! to listeners first and routed to addressed devices otherwise.

pub mod listener;
pub mod telegram_queue;

pub use listener::TelegramListener;
pub use telegram_queue::{DEFAULT_RATE_LIMIT, QueueItem, TelegramQueue, TelegramSender};
