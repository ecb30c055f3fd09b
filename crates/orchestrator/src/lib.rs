//! Orchestrator - job lifecycle, result caching and probe scheduling

mod cache;
mod orchestrator;
mod scheduler;
mod store;

#[cfg(test)]
mod testing;

pub use cache::ResultCache;
pub use orchestrator::Orchestrator;
pub use scheduler::{EnumerationScheduler, ScheduleLimits};
pub use store::{JobHandle, JobStore};
