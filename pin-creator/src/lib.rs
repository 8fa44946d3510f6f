//! # pin-creator
//!
//! Publishes scheduled pins to Pinterest, one per invocation.
//!
//! A run reads a `;`-delimited schedule, picks the first entry not yet
//! created, and:
//!
//! - **Resolves the board** by name, creating it when absent and waiting out
//!   the API's eventual consistency with bounded exponential backoff
//! - **Creates the pin** with the base64-encoded image under its own deadline
//! - **Marks the entry created** with an atomic rewrite of the schedule
//!
//! Every blocking step observes a [`RunContext`](cancellation::RunContext)
//! carrying the layered deadlines and Ctrl-C cancellation.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pin_creator::prelude::*;
//!
//! let config = RunConfig::load("config.yaml".as_ref())?;
//! let token = load_access_token(&config.auth)?;
//! let api = Arc::new(PinterestClient::new(&config.api, token)?);
//! let store = Arc::new(CsvScheduleStore::new(&config.schedule_file_path));
//!
//! let orchestrator = PublishOrchestrator::from_config(&config, store, api, Arc::new(TokioClock));
//! let ctx = RunContext::new().with_timeout(Instant::now(), config.timeouts.run());
//! let outcome = orchestrator.run(&ctx).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod api;
pub mod auth;
pub mod board;
pub mod cancellation;
pub mod config;
pub mod errors;
pub mod observability;
pub mod publish;
pub mod retry;
pub mod schedule;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::api::{
        ApiError, BoardRef, CreatedPin, NewBoard, PinRequest, PinterestApi, PinterestClient,
        Privacy,
    };
    pub use crate::auth::{load_access_token, AccessToken};
    pub use crate::board::BoardResolver;
    pub use crate::cancellation::{CancellationToken, Interrupted, RunContext};
    pub use crate::config::RunConfig;
    pub use crate::errors::{ErrorKind, PinCreatorError, Stage};
    pub use crate::publish::{PublishOrchestrator, PublishOutcome};
    pub use crate::retry::{Clock, RetryPolicy, TokioClock};
    pub use crate::schedule::{CsvScheduleStore, ScheduleEntry, ScheduleStore};
}
