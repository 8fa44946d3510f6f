//! Board lookup and on-demand creation.

mod resolver;

pub use resolver::{BoardResolver, ResolveState};
