//! Actions attached to a binary sensor.
//!
//! An action is evaluated after every state change of its sensor with the
//! new state and the same-context counter, and executed when it applies.

use crate::error::{KnxError, Result};
use crate::knx::{GroupAddress, Telegram};
use crate::queue::TelegramSender;
use crate::remote_value::{RemoteValue, RemoteValueSwitch};
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use strum::{Display, EnumString};

#[async_trait]
pub trait Action: Send + Sync {
    /// Test if the action applies to `state` reached for the `counter`-th
    /// time within the same context.
    fn test_if_applicable(&self, state: bool, counter: u32) -> bool;

    async fn execute(&self) -> Result<()>;
}

/// State an action is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActionHook {
    On,
    Off,
}

fn default_counter() -> Option<u32> {
    Some(1)
}

/// Hook/counter condition shared by the concrete actions.
///
/// `counter: None` matches any count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct ActionCondition {
    pub hook: ActionHook,
    #[serde(default = "default_counter")]
    pub counter: Option<u32>,
}

impl ActionCondition {
    pub fn new(hook: ActionHook) -> Self {
        Self {
            hook,
            counter: default_counter(),
        }
    }

    pub fn with_counter(mut self, counter: Option<u32>) -> Self {
        self.counter = counter;
        self
    }

    pub fn test(&self, state: bool, counter: u32) -> bool {
        let hook_matches = match self.hook {
            ActionHook::On => state,
            ActionHook::Off => !state,
        };
        hook_matches && self.counter.is_none_or(|expected| expected == counter)
    }
}

type ActionCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Action running an async closure.
pub struct CallbackAction {
    condition: ActionCondition,
    callback: ActionCallback,
}

impl CallbackAction {
    pub fn new<F, Fut>(condition: ActionCondition, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            condition,
            callback: Arc::new(move || callback().boxed()),
        }
    }
}

#[async_trait]
impl Action for CallbackAction {
    fn test_if_applicable(&self, state: bool, counter: u32) -> bool {
        self.condition.test(state, counter)
    }

    async fn execute(&self) -> Result<()> {
        (self.callback)().await
    }
}

fn default_value() -> bool {
    true
}

/// Configuration of a [`TelegramAction`].
///
/// ```json
/// { "hook": "on", "counter": 2, "target": "1/0/5", "value": false }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ActionConfig {
    #[serde(flatten)]
    pub condition: ActionCondition,
    pub target: GroupAddress,
    #[serde(default = "default_value")]
    pub value: bool,
    /// Write the inverted payload (0x00 for on).
    #[serde(default)]
    pub invert: bool,
}

/// Action writing an on/off value to a group address.
pub struct TelegramAction {
    condition: ActionCondition,
    target: GroupAddress,
    value: bool,
    remote_value: RemoteValueSwitch,
    sender: TelegramSender,
}

impl TelegramAction {
    pub fn new(
        condition: ActionCondition,
        target: GroupAddress,
        value: bool,
        sender: TelegramSender,
    ) -> Self {
        Self {
            condition,
            target,
            value,
            remote_value: RemoteValueSwitch::new(target.to_string())
                .with_group_address(Some(target)),
            sender,
        }
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.remote_value = self.remote_value.with_invert(invert);
        self
    }

    pub fn from_config(config: &ActionConfig, sender: TelegramSender) -> Self {
        Self::new(config.condition, config.target, config.value, sender).with_invert(config.invert)
    }
}

#[async_trait]
impl Action for TelegramAction {
    fn test_if_applicable(&self, state: bool, counter: u32) -> bool {
        self.condition.test(state, counter)
    }

    async fn execute(&self) -> Result<()> {
        let telegram =
            Telegram::group_write(self.target, self.remote_value.to_payload(&self.value));
        self.sender
            .send(telegram)
            .map_err(|e| KnxError::ActionFailed(format!("write to {}: {}", self.target, e)))
    }
}
