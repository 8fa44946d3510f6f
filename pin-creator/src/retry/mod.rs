//! Retry policy and the clock it waits on.

mod clock;
mod policy;

pub use clock::{Clock, ManualClock, TokioClock};
pub use policy::{Failure, RetryError, RetryPolicy};
