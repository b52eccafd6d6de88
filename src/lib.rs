//! KNX telegram dispatch library.
//!
//! This library provides the message-dispatch core of a KNX bus client:
//! a rate-limited telegram queue fanning incoming traffic out to listeners
//! and addressed devices, and debounced binary sensors with auto-reset.

pub mod config;
pub mod devices;
pub mod error;
pub mod input;
pub mod knx;
pub mod queue;
pub mod remote_value;
pub mod transport;
