//! Test doubles for publish runs.
//!
//! This module provides:
//! - `FakePinterestApi`, an in-memory API with eventual-consistency lag
//! - `ManualClock` and `MemoryScheduleStore`, re-exported for convenience

mod mocks;

pub use crate::retry::ManualClock;
pub use crate::schedule::MemoryScheduleStore;
pub use mocks::{ApiCall, FakePinterestApi};
