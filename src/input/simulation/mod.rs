//! Simulated bus traffic.

mod telegrams;

pub use telegrams::run_telegram_simulation;
