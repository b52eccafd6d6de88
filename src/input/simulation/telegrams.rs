//! Telegram simulation for testing.
//!
//! Injects incoming on/off telegrams as if they had been received from the
//! bus, so devices and actions can be exercised without a bus connection.

use crate::knx::{GroupAddress, Telegram};
use crate::queue::TelegramSender;
use log::{info, warn};
use tokio::task::JoinHandle;
use tokio::time::{Duration, interval};

/// Spawn a task that periodically writes alternating on/off values to the
/// given addresses.
///
/// # Returns
///
/// A `JoinHandle` that can be used to abort the simulation task.
pub fn run_telegram_simulation(
    sender: TelegramSender,
    addresses: Vec<GroupAddress>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval(period);
        let mut value = false;
        loop {
            interval.tick().await;
            value = !value;
            for address in &addresses {
                let telegram = Telegram::group_write(*address, vec![u8::from(value)]).incoming();
                if let Err(e) = sender.send(telegram) {
                    warn!("[Sim] Queue closed, stopping simulation: {}", e);
                    return;
                }
            }
            info!(
                "[Sim] Wrote {} to {} address(es)",
                if value { "on" } else { "off" },
                addresses.len()
            );
        }
    })
}
