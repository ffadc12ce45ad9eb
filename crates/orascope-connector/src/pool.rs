//! Session pooling

mod pool;
mod stats;

#[cfg(test)]
mod tests;

pub use pool::{PooledSession, SessionFactory, SessionPool};
pub use stats::PoolStats;
