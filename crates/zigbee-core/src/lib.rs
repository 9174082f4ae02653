//! Zigbee domain layer
//!
//! Device identity tracking and reading capture on top of the low-level
//! MT protocol crate: a registry keyed by stable IEEE addresses, JSON
//! persistence, and an append-only reading log.

pub mod device;
pub mod persistence;
pub mod recorder;
pub mod registry;

pub use device::{Endpoint, ZigbeeDevice};
pub use recorder::ReadingRecorder;
pub use registry::DeviceRegistry;
