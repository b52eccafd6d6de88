//! Telegram queue dispatch loop.
//!
//! One background task per running queue pulls telegrams in FIFO order and
//! dispatches each one inside its own failure boundary: an error (or panic)
//! while processing a telegram is logged and the loop moves on.
//!
//! Shutdown is cooperative. [`TelegramQueue::stop`] pushes a stop sentinel
//! behind everything already queued and waits for the task to finish.
//! `stop` must not be called concurrently from several callers.

use super::TelegramListener;
use crate::devices::Devices;
use crate::error::{KnxError, Result};
use crate::knx::{Telegram, TelegramDirection, TelegramType};
use crate::transport::Transport;
use futures_util::FutureExt;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use scopeguard::{ScopeGuard, guard};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Minimum gap between outgoing telegrams (20 per second).
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(50);

/// Entry of the pending queue.
#[derive(Debug)]
pub enum QueueItem {
    Telegram(Telegram),
    /// Ends the dispatch loop once reached.
    Stop,
}

/// Producer handle for the queue. Cheap to clone; never blocks.
#[derive(Clone)]
pub struct TelegramSender {
    tx: mpsc::UnboundedSender<QueueItem>,
}

impl TelegramSender {
    /// Create a sender together with the receiving end of its queue.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<QueueItem>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Append a telegram to the tail of the queue.
    pub fn send(&self, telegram: Telegram) -> Result<()> {
        self.tx
            .send(QueueItem::Telegram(telegram))
            .map_err(|_| KnxError::QueueClosed)
    }

    fn send_stop(&self) -> Result<()> {
        self.tx.send(QueueItem::Stop).map_err(|_| KnxError::QueueClosed)
    }
}

type ReceiverSlot = Arc<Mutex<Option<mpsc::UnboundedReceiver<QueueItem>>>>;

/// Take the parked receiver; it goes back into the slot when the guard is
/// dropped, even if the owning future is cancelled mid-dispatch.
fn take_receiver(
    slot: ReceiverSlot,
) -> Option<ScopeGuard<mpsc::UnboundedReceiver<QueueItem>, impl FnOnce(mpsc::UnboundedReceiver<QueueItem>)>>
{
    let receiver = slot.lock().take()?;
    Some(guard(receiver, move |receiver| {
        *slot.lock() = Some(receiver);
    }))
}

/// Routing shared between the queue handle and its dispatch task.
struct Dispatcher {
    devices: Arc<Devices>,
    listeners: RwLock<Vec<Arc<dyn TelegramListener>>>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
}

impl Dispatcher {
    async fn run(&self, receiver: &mut mpsc::UnboundedReceiver<QueueItem>, rate_limit: Duration) {
        while let Some(item) = receiver.recv().await {
            let telegram = match item {
                QueueItem::Telegram(telegram) => telegram,
                QueueItem::Stop => break,
            };

            self.dispatch(&telegram).await;

            if telegram.direction == TelegramDirection::Outgoing {
                tokio::time::sleep(rate_limit).await;
            }
        }
    }

    /// Process one telegram; failures are reported and swallowed.
    async fn dispatch(&self, telegram: &Telegram) {
        debug!("[Queue] Dispatching {}", telegram);

        match AssertUnwindSafe(self.process_telegram(telegram))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("[Queue] Error while processing telegram {}: {}", telegram, e);
            }
            Err(_) => {
                error!("[Queue] Panic while processing telegram {}", telegram);
            }
        }
    }

    async fn process_telegram(&self, telegram: &Telegram) -> Result<()> {
        match telegram.direction {
            TelegramDirection::Incoming => self.process_telegram_incoming(telegram).await,
            TelegramDirection::Outgoing => self.process_telegram_outgoing(telegram).await,
        }
    }

    async fn process_telegram_outgoing(&self, telegram: &Telegram) -> Result<()> {
        let transport = self.transport.read().clone();
        match transport {
            Some(transport) => transport.send_telegram(telegram).await,
            None => {
                warn!("[Queue] No transport configured, dropping {}", telegram);
                Ok(())
            }
        }
    }

    async fn process_telegram_incoming(&self, telegram: &Telegram) -> Result<()> {
        match telegram.telegram_type {
            TelegramType::GroupWrite | TelegramType::GroupResponse => {
                let listeners = self.listeners.read().clone();

                let mut processed = false;
                for listener in &listeners {
                    if listener.telegram_received(telegram).await? {
                        processed = true;
                    }
                }

                if !processed {
                    for device in self.devices.devices_by_group_address(telegram.group_address) {
                        device.process(telegram).await?;
                    }
                }
                Ok(())
            }
            TelegramType::GroupRead => Ok(()),
        }
    }
}

/// Ordered, rate-limited telegram queue.
pub struct TelegramQueue {
    sender: TelegramSender,
    /// Parked here while no dispatch task owns it.
    receiver: ReceiverSlot,
    dispatcher: Arc<Dispatcher>,
    rate_limit: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TelegramQueue {
    pub fn new(devices: Arc<Devices>) -> Self {
        let (sender, receiver) = TelegramSender::channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(Some(receiver))),
            dispatcher: Arc::new(Dispatcher {
                devices,
                listeners: RwLock::new(Vec::new()),
                transport: RwLock::new(None),
            }),
            rate_limit: DEFAULT_RATE_LIMIT,
            task: Mutex::new(None),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_transport(self, transport: Arc<dyn Transport>) -> Self {
        self.set_transport(Some(transport));
        self
    }

    pub fn set_transport(&self, transport: Option<Arc<dyn Transport>>) {
        *self.dispatcher.transport.write() = transport;
    }

    pub fn rate_limit(&self) -> Duration {
        self.rate_limit
    }

    /// Producer handle for devices and external callers.
    pub fn sender(&self) -> TelegramSender {
        self.sender.clone()
    }

    /// Append a telegram to the tail of the queue.
    pub fn put(&self, telegram: Telegram) -> Result<()> {
        self.sender.send(telegram)
    }

    /// Add a listener; listeners are invoked in registration order.
    pub fn register_listener(&self, listener: Arc<dyn TelegramListener>) {
        self.dispatcher.listeners.write().push(listener);
    }

    /// Remove a previously registered listener (matched by identity).
    pub fn unregister_listener(&self, listener: &Arc<dyn TelegramListener>) -> Result<()> {
        let mut listeners = self.dispatcher.listeners.write();
        let position = listeners
            .iter()
            .position(|registered| std::ptr::addr_eq(Arc::as_ptr(registered), Arc::as_ptr(listener)))
            .ok_or(KnxError::ListenerNotFound)?;
        listeners.remove(position);
        Ok(())
    }

    /// Spawn the dispatch task. Must be called within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut task = self.task.lock();
        if task.is_some() {
            return Err(KnxError::QueueAlreadyRunning);
        }
        let Some(mut receiver) = take_receiver(self.receiver.clone()) else {
            return Err(KnxError::QueueAlreadyRunning);
        };

        let dispatcher = self.dispatcher.clone();
        let rate_limit = self.rate_limit;

        *task = Some(tokio::spawn(async move {
            dispatcher.run(&mut receiver, rate_limit).await;
        }));

        info!("[Queue] Started (rate limit {:?})", self.rate_limit);
        Ok(())
    }

    /// Queue the stop sentinel and wait until the dispatch task has
    /// processed everything before it and exited.
    pub async fn stop(&self) -> Result<()> {
        let task = self.task.lock().take();
        let Some(task) = task else {
            return Err(KnxError::QueueNotRunning);
        };

        info!("[Queue] Stopping");
        self.sender.send_stop()?;

        if let Err(e) = task.await {
            error!("[Queue] Dispatch task failed: {}", e);
        }
        info!("[Queue] Stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Process every queued telegram right away, without rate limiting and
    /// without waiting for new arrivals. Only valid while the dispatch task
    /// is not running. Returns the number of telegrams processed.
    pub async fn process_all_telegrams(&self) -> Result<usize> {
        let Some(mut receiver) = take_receiver(self.receiver.clone()) else {
            return Err(KnxError::QueueAlreadyRunning);
        };

        let mut processed = 0;
        while let Ok(item) = receiver.try_recv() {
            if let QueueItem::Telegram(telegram) = item {
                self.dispatcher.dispatch(&telegram).await;
                processed += 1;
            }
        }
        Ok(processed)
    }

    /// Route a single telegram immediately, returning its processing error.
    pub async fn process_telegram(&self, telegram: &Telegram) -> Result<()> {
        self.dispatcher.process_telegram(telegram).await
    }
}
