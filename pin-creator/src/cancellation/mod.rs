//! Cooperative cancellation and deadlines.
//!
//! This module provides:
//! - CancellationToken for cooperative cancellation
//! - RunContext, which layers deadlines over a shared token

mod context;
mod token;

pub use context::{Interrupted, RunContext};
pub use token::CancellationToken;
