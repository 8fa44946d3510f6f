//! Observability utilities.

mod logging;
mod timer;

pub use logging::{env_filter, init_logging};
pub use timer::SpanTimer;
