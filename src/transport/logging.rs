//! Transport that only logs outgoing telegrams.
//!
//! Stands in for a real bus connection during development and simulation.

use super::Transport;
use crate::error::Result;
use crate::knx::Telegram;
use async_trait::async_trait;
use log::info;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct LoggingTransport {
    sent: AtomicUsize,
}

impl LoggingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of telegrams sent so far.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn send_telegram(&self, telegram: &Telegram) -> Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        info!("[Transport] -> {}", telegram);
        Ok(())
    }
}
