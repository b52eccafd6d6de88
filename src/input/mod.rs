//! Input sources feeding telegrams into the queue.
//!
//! Current input sources:
//! - `simulation`: periodic on/off telegrams for development

pub mod simulation;
