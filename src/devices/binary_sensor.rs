//! Binary sensor device.
//!
//! A binary sensor can be a wall switch, a motion detector or a reed contact
//! on a window. It derives an on/off state from incoming telegrams, counts
//! repeated transitions within a short context window (double press), can
//! fall back to off a configured delay after it turned on, and runs attached
//! [`Action`]s on every state change.
//!
//! State changes of one sensor are serialized by a per-sensor transition
//! lock held across telegram processing and the auto-reset. Every scheduled
//! reset carries a generation; a reset whose generation was superseded by a
//! newer "on" telegram is discarded. Actions must not call back into
//! [`BinarySensor::set_internal_state`] of their own sensor.

use super::action::{Action, TelegramAction};
use super::Device;
use crate::config::BinarySensorConfig;
use crate::error::Result;
use crate::knx::{GroupAddress, Telegram};
use crate::queue::TelegramSender;
use crate::remote_value::{RemoteValue, RemoteValueSwitch};
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::{debug, error, warn};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Window within which repeated transitions count as the same context.
pub const CONTEXT_TIMEOUT: Duration = Duration::from_secs(1);

/// Snapshot passed to device-updated callbacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinarySensorUpdate {
    pub name: String,
    pub state: bool,
    pub counter: u32,
}

type DeviceUpdatedCallback = Arc<dyn Fn(BinarySensorUpdate) -> BoxFuture<'static, ()> + Send + Sync>;

struct SensorState {
    state: bool,
    count_set_on: u32,
    count_set_off: u32,
    last_set: Option<Instant>,
    reset_task: Option<JoinHandle<()>>,
    reset_generation: u64,
    remote_value: Box<dyn RemoteValue<Value = bool>>,
}

impl SensorState {
    /// Bump the counter for `state` and return how often it was set within
    /// the current context.
    fn bump_and_get_counter(&mut self, state: bool, now: Instant) -> u32 {
        let within_same_context = self
            .last_set
            .replace(now)
            .is_some_and(|last_set| now.duration_since(last_set) < CONTEXT_TIMEOUT);

        if within_same_context {
            let counter = if state {
                &mut self.count_set_on
            } else {
                &mut self.count_set_off
            };
            *counter += 1;
            return *counter;
        }

        self.count_set_on = u32::from(state);
        self.count_set_off = u32::from(!state);
        1
    }
}

/// Builder for [`BinarySensor`].
pub struct BinarySensorBuilder {
    name: String,
    remote_value: Box<dyn RemoteValue<Value = bool>>,
    ignore_internal_state: bool,
    device_class: Option<String>,
    reset_after: Option<Duration>,
    actions: Vec<Box<dyn Action>>,
}

impl BinarySensorBuilder {
    /// Use a state address with a default [`RemoteValueSwitch`].
    pub fn group_address_state(mut self, group_address_state: GroupAddress) -> Self {
        self.remote_value = Box::new(
            RemoteValueSwitch::new(self.name.clone())
                .with_group_address_state(Some(group_address_state)),
        );
        self
    }

    pub fn remote_value(mut self, remote_value: impl RemoteValue<Value = bool> + 'static) -> Self {
        self.remote_value = Box::new(remote_value);
        self
    }

    /// Run the state-change path even when the decoded state is unchanged.
    pub fn ignore_internal_state(mut self, ignore_internal_state: bool) -> Self {
        self.ignore_internal_state = ignore_internal_state;
        self
    }

    pub fn device_class(mut self, device_class: Option<String>) -> Self {
        self.device_class = device_class;
        self
    }

    /// Fall back to off this long after the last "on" telegram.
    pub fn reset_after(mut self, reset_after: Option<Duration>) -> Self {
        self.reset_after = reset_after;
        self
    }

    pub fn action(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn actions(mut self, actions: Vec<Box<dyn Action>>) -> Self {
        self.actions.extend(actions);
        self
    }

    pub fn build(self) -> Arc<BinarySensor> {
        Arc::new_cyclic(|me| BinarySensor {
            name: self.name,
            device_class: self.device_class,
            ignore_internal_state: self.ignore_internal_state,
            reset_after: self.reset_after,
            actions: self.actions,
            device_updated_cbs: RwLock::new(Vec::new()),
            inner: Mutex::new(SensorState {
                state: false,
                count_set_on: 0,
                count_set_off: 0,
                last_set: None,
                reset_task: None,
                reset_generation: 0,
                remote_value: self.remote_value,
            }),
            transition: AsyncMutex::new(()),
            me: me.clone(),
        })
    }
}

pub struct BinarySensor {
    name: String,
    device_class: Option<String>,
    ignore_internal_state: bool,
    reset_after: Option<Duration>,
    actions: Vec<Box<dyn Action>>,
    device_updated_cbs: RwLock<Vec<DeviceUpdatedCallback>>,
    inner: Mutex<SensorState>,
    /// Held for the whole of a state transition.
    transition: AsyncMutex<()>,
    me: Weak<BinarySensor>,
}

impl BinarySensor {
    pub fn builder(name: impl Into<String>) -> BinarySensorBuilder {
        let name = name.into();
        BinarySensorBuilder {
            remote_value: Box::new(RemoteValueSwitch::new(name.clone())),
            name,
            ignore_internal_state: false,
            device_class: None,
            reset_after: None,
            actions: Vec::new(),
        }
    }

    /// Build a sensor from its configuration entry.
    ///
    /// Configured actions write through `sender`.
    pub fn from_config(config: &BinarySensorConfig, sender: &TelegramSender) -> Arc<Self> {
        if config.reset_after.is_some() && config.sync_state {
            warn!(
                "[BinarySensor] {}: reset_after together with sync_state lets actions fire on state sync",
                config.name
            );
        }

        let remote_value = RemoteValueSwitch::new(config.name.clone())
            .with_group_address_state(config.group_address_state)
            .with_sync_state(config.sync_state)
            .with_invert(config.invert);

        let actions = config
            .actions
            .iter()
            .map(|action| {
                Box::new(TelegramAction::from_config(action, sender.clone())) as Box<dyn Action>
            })
            .collect();

        Self::builder(config.name.clone())
            .remote_value(remote_value)
            .ignore_internal_state(config.ignore_internal_state)
            .device_class(config.device_class.clone())
            .reset_after(config.reset_after.map(Duration::from_millis))
            .actions(actions)
            .build()
    }

    /// Register a callback awaited after every state change.
    pub fn register_device_updated_cb<F, Fut>(&self, callback: F)
    where
        F: Fn(BinarySensorUpdate) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.device_updated_cbs
            .write()
            .push(Arc::new(move |update| callback(update).boxed()));
    }

    pub fn device_class(&self) -> Option<&str> {
        self.device_class.as_deref()
    }

    pub fn reset_after(&self) -> Option<Duration> {
        self.reset_after
    }

    pub fn state(&self) -> bool {
        self.inner.lock().state
    }

    pub fn is_on(&self) -> bool {
        self.state()
    }

    pub fn is_off(&self) -> bool {
        !self.state()
    }

    /// Current same-context counter for `state`.
    pub fn counter(&self, state: bool) -> u32 {
        let inner = self.inner.lock();
        if state {
            inner.count_set_on
        } else {
            inner.count_set_off
        }
    }

    /// Whether an auto-reset is scheduled and has not fired yet.
    pub fn reset_pending(&self) -> bool {
        self.inner
            .lock()
            .reset_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Set the state and, if it changed (or internal state is ignored),
    /// notify callbacks and run applicable actions in order.
    pub async fn set_internal_state(&self, state: bool) -> Result<()> {
        let _transition = self.transition.lock().await;
        self.apply_state(state).await
    }

    /// State-change path. Callers hold the transition lock.
    async fn apply_state(&self, state: bool) -> Result<()> {
        let counter = {
            let mut inner = self.inner.lock();
            if state == inner.state && !self.ignore_internal_state {
                return Ok(());
            }
            inner.state = state;
            inner.bump_and_get_counter(state, Instant::now())
        };

        debug!(
            "[BinarySensor] {} set to {} (counter {})",
            self.name,
            if state { "on" } else { "off" },
            counter
        );

        self.after_update(state, counter).await;

        for action in &self.actions {
            if action.test_if_applicable(state, counter) {
                action.execute().await?;
            }
        }
        Ok(())
    }

    async fn after_update(&self, state: bool, counter: u32) {
        let callbacks = self.device_updated_cbs.read().clone();
        for callback in callbacks {
            callback(BinarySensorUpdate {
                name: self.name.clone(),
                state,
                counter,
            })
            .await;
        }
    }

    /// If the sensor is on, replace any pending auto-reset with a new one
    /// firing after `delay`. Callers hold the transition lock.
    fn schedule_reset_if_on(&self, delay: Duration) {
        let mut inner = self.inner.lock();
        if !inner.state {
            return;
        }

        inner.reset_generation += 1;
        let generation = inner.reset_generation;
        let sensor = self.me.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(sensor) = sensor.upgrade() else {
                return;
            };
            if let Err(e) = sensor.fire_reset(generation).await {
                error!("[BinarySensor] {} auto-reset failed: {}", sensor.name, e);
            }
        });

        if let Some(previous) = inner.reset_task.replace(task) {
            previous.abort();
        }
    }

    /// Force the state off unless a newer reset superseded `generation`.
    async fn fire_reset(&self, generation: u64) -> Result<()> {
        let _transition = self.transition.lock().await;
        let current = self.inner.lock().reset_generation;
        if current != generation {
            debug!(
                "[BinarySensor] {} discarding superseded auto-reset",
                self.name
            );
            return Ok(());
        }
        debug!("[BinarySensor] {} auto-reset", self.name);
        self.apply_state(false).await
    }
}

#[async_trait]
impl Device for BinarySensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_group_address(&self, group_address: GroupAddress) -> bool {
        self.inner.lock().remote_value.has_group_address(group_address)
    }

    fn state_addresses(&self) -> Vec<GroupAddress> {
        self.inner.lock().remote_value.state_addresses()
    }

    async fn process_group_write(&self, telegram: &Telegram) -> Result<()> {
        let _transition = self.transition.lock().await;
        let value = {
            let mut inner = self.inner.lock();
            if !inner.remote_value.process(telegram, true)? {
                return Ok(());
            }
            inner.remote_value.value()
        };

        if let Some(value) = value {
            self.apply_state(value).await?;
        }

        if let Some(reset_after) = self.reset_after {
            self.schedule_reset_if_on(reset_after);
        }
        Ok(())
    }
}

impl Drop for BinarySensor {
    fn drop(&mut self) {
        if let Some(task) = self.inner.get_mut().reset_task.take() {
            task.abort();
        }
    }
}

impl fmt::Display for BinarySensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        let addresses = inner
            .remote_value
            .state_addresses()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "BinarySensor(name={:?}, state_addresses=[{}], state={})",
            self.name,
            addresses,
            if inner.state { "on" } else { "off" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::action::{ActionCondition, ActionHook, CallbackAction};
    use crate::error::KnxError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn address() -> GroupAddress {
        GroupAddress::new(1, 2, 3).unwrap()
    }

    fn write(value: bool) -> Telegram {
        Telegram::group_write(address(), vec![u8::from(value)]).incoming()
    }

    fn recording_sensor(
        builder: BinarySensorBuilder,
    ) -> (Arc<BinarySensor>, Arc<Mutex<Vec<BinarySensorUpdate>>>) {
        let sensor = builder.group_address_state(address()).build();
        let updates = Arc::new(Mutex::new(Vec::new()));
        let updates_clone = updates.clone();
        sensor.register_device_updated_cb(move |update| {
            let updates = updates_clone.clone();
            async move { updates.lock().push(update) }
        });
        (sensor, updates)
    }

    fn counters(updates: &Mutex<Vec<BinarySensorUpdate>>) -> Vec<(bool, u32)> {
        updates
            .lock()
            .iter()
            .map(|update| (update.state, update.counter))
            .collect()
    }

    #[test]
    fn test_counter_contexts() {
        let mut state = SensorState {
            state: false,
            count_set_on: 0,
            count_set_off: 0,
            last_set: None,
            reset_task: None,
            reset_generation: 0,
            remote_value: Box::new(RemoteValueSwitch::new("test")),
        };
        let start = Instant::now();

        assert_eq!(state.bump_and_get_counter(true, start), 1);
        assert_eq!(
            state.bump_and_get_counter(false, start + Duration::from_millis(100)),
            1
        );
        assert_eq!(
            state.bump_and_get_counter(true, start + Duration::from_millis(200)),
            2
        );
        assert_eq!(
            state.bump_and_get_counter(false, start + Duration::from_millis(300)),
            2
        );
        assert_eq!((state.count_set_on, state.count_set_off), (2, 2));

        // a new context resets both counters
        assert_eq!(
            state.bump_and_get_counter(true, start + Duration::from_millis(1300)),
            1
        );
        assert_eq!((state.count_set_on, state.count_set_off), (1, 0));
    }

    #[tokio::test]
    async fn test_process_sets_state() {
        let (sensor, updates) = recording_sensor(BinarySensor::builder("sensor"));
        assert!(sensor.is_off());

        sensor.process(&write(true)).await.unwrap();
        assert!(sensor.is_on());

        sensor.process(&write(false)).await.unwrap();
        assert!(sensor.is_off());
        assert_eq!(counters(&updates), vec![(true, 1), (false, 1)]);
    }

    #[tokio::test]
    async fn test_process_group_response() {
        let (sensor, _) = recording_sensor(BinarySensor::builder("sensor"));
        let response = Telegram::group_response(address(), vec![1]).incoming();
        sensor.process(&response).await.unwrap();
        assert!(sensor.is_on());
    }

    #[tokio::test]
    async fn test_process_ignores_group_read() {
        let (sensor, updates) = recording_sensor(BinarySensor::builder("sensor"));
        let read = Telegram::group_read(address()).incoming();
        sensor.process(&read).await.unwrap();
        assert!(sensor.is_off());
        assert!(updates.lock().is_empty());
    }

    #[tokio::test]
    async fn test_process_invalid_payload() {
        let (sensor, _) = recording_sensor(BinarySensor::builder("sensor"));
        let telegram = Telegram::group_write(address(), vec![0x11]).incoming();
        assert!(matches!(
            sensor.process(&telegram).await,
            Err(KnxError::CouldNotParseTelegram { .. })
        ));
        assert!(sensor.is_off());
    }

    #[tokio::test]
    async fn test_unchanged_state_is_debounced() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let action = CallbackAction::new(ActionCondition::new(ActionHook::On), move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let (sensor, updates) = recording_sensor(BinarySensor::builder("sensor").action(action));

        sensor.process(&write(true)).await.unwrap();
        sensor.process(&write(true)).await.unwrap();

        assert_eq!(updates.lock().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_within_context() {
        let (sensor, updates) =
            recording_sensor(BinarySensor::builder("sensor").ignore_internal_state(true));

        sensor.process(&write(true)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        sensor.process(&write(true)).await.unwrap();

        assert_eq!(counters(&updates), vec![(true, 1), (true, 2)]);
        assert_eq!(sensor.counter(true), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_new_context() {
        let (sensor, updates) =
            recording_sensor(BinarySensor::builder("sensor").ignore_internal_state(true));

        sensor.process(&write(true)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        sensor.process(&write(true)).await.unwrap();

        assert_eq!(counters(&updates), vec![(true, 1), (true, 1)]);
    }

    #[tokio::test]
    async fn test_actions_run_in_order_for_matching_counter() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let make_action = |label: &'static str, condition: ActionCondition| {
            let log = log.clone();
            CallbackAction::new(condition, move || {
                let log = log.clone();
                async move {
                    tokio::task::yield_now().await;
                    log.lock().push(label);
                    Ok(())
                }
            })
        };

        let sensor = BinarySensor::builder("switch")
            .group_address_state(address())
            .ignore_internal_state(true)
            .action(make_action("first", ActionCondition::new(ActionHook::On)))
            .action(make_action(
                "double",
                ActionCondition::new(ActionHook::On).with_counter(Some(2)),
            ))
            .action(make_action(
                "any",
                ActionCondition::new(ActionHook::On).with_counter(None),
            ))
            .action(make_action("off", ActionCondition::new(ActionHook::Off)))
            .build();

        sensor.process(&write(true)).await.unwrap();
        sensor.process(&write(true)).await.unwrap();

        assert_eq!(*log.lock(), vec!["first", "any", "double", "any"]);
    }

    #[tokio::test]
    async fn test_failing_action_propagates() {
        let action = CallbackAction::new(ActionCondition::new(ActionHook::On), || async {
            Err(KnxError::ActionFailed("boom".to_string()))
        });
        let sensor = BinarySensor::builder("sensor")
            .group_address_state(address())
            .action(action)
            .build();

        assert!(matches!(
            sensor.process(&write(true)).await,
            Err(KnxError::ActionFailed(_))
        ));
        assert!(sensor.is_on());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_reset() {
        let (sensor, updates) = recording_sensor(
            BinarySensor::builder("motion").reset_after(Some(Duration::from_millis(1000))),
        );

        sensor.process(&write(true)).await.unwrap();
        assert!(sensor.is_on());
        assert!(sensor.reset_pending());

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(sensor.is_on());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(sensor.is_off());
        assert!(!sensor.reset_pending());
        assert_eq!(counters(&updates), vec![(true, 1), (false, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_reset_restarts_on_repeat() {
        let (sensor, updates) = recording_sensor(
            BinarySensor::builder("motion").reset_after(Some(Duration::from_millis(1000))),
        );

        sensor.process(&write(true)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        sensor.process(&write(true)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(sensor.is_on());

        tokio::time::sleep(Duration::from_millis(101)).await;
        assert!(sensor.is_off());
        // the repeated "on" was debounced, the reset still moved
        assert_eq!(counters(&updates), vec![(true, 1), (false, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reset_when_off() {
        let sensor = BinarySensor::builder("motion")
            .group_address_state(address())
            .reset_after(Some(Duration::from_millis(1000)))
            .build();

        sensor.process(&write(false)).await.unwrap();
        assert!(!sensor.reset_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_reset() {
        let (sensor, updates) = recording_sensor(
            BinarySensor::builder("motion").reset_after(Some(Duration::from_millis(1000))),
        );

        sensor.process(&write(true)).await.unwrap();
        drop(sensor);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(counters(&updates), vec![(true, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_reset_is_discarded() {
        let (sensor, updates) = recording_sensor(
            BinarySensor::builder("motion").reset_after(Some(Duration::from_millis(1000))),
        );

        sensor.process(&write(true)).await.unwrap();
        let stale = sensor.inner.lock().reset_generation;
        sensor.process(&write(true)).await.unwrap();

        sensor.fire_reset(stale).await.unwrap();
        assert!(sensor.is_on());

        let current = sensor.inner.lock().reset_generation;
        sensor.fire_reset(current).await.unwrap();
        assert!(sensor.is_off());
        assert_eq!(counters(&updates), vec![(true, 1), (false, 1)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_repeated_on_survives_concurrent_reset() {
        let sensor = BinarySensor::builder("motion")
            .group_address_state(address())
            .reset_after(Some(Duration::from_millis(40)))
            .build();

        // land the repeats around the moment the previous reset fires
        for i in 0..40u64 {
            sensor.process(&write(true)).await.unwrap();
            assert!(sensor.is_on(), "sensor off right after an on telegram ({i})");
            tokio::time::sleep(Duration::from_millis(35 + i % 10)).await;
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(sensor.is_off());
        assert!(!sensor.reset_pending());
    }

    #[tokio::test]
    async fn test_from_config() {
        let config: BinarySensorConfig = serde_json::from_str(
            r#"{
                "name": "Kitchen.Switch",
                "group_address_state": "1/2/3",
                "sync_state": false,
                "ignore_internal_state": true,
                "device_class": "motion",
                "reset_after": 2500,
                "actions": [{ "hook": "on", "counter": 2, "target": "1/0/5" }]
            }"#,
        )
        .unwrap();
        let (sender, mut receiver) = TelegramSender::channel();
        let sensor = BinarySensor::from_config(&config, &sender);

        assert_eq!(sensor.name(), "Kitchen.Switch");
        assert_eq!(sensor.device_class(), Some("motion"));
        assert_eq!(sensor.reset_after(), Some(Duration::from_millis(2500)));
        assert!(sensor.has_group_address(address()));
        assert!(sensor.state_addresses().is_empty());

        sensor.set_internal_state(true).await.unwrap();
        assert!(receiver.try_recv().is_err());
        sensor.set_internal_state(true).await.unwrap();
        assert!(receiver.try_recv().is_ok());
    }

    #[test]
    fn test_display() {
        let sensor = BinarySensor::builder("door")
            .group_address_state(address())
            .build();
        assert_eq!(
            sensor.to_string(),
            "BinarySensor(name=\"door\", state_addresses=[1/2/3], state=off)"
        );
    }
}
