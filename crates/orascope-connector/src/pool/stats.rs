//! Pool statistics

/// A point-in-time snapshot of pool state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Total sessions currently owned by the pool (idle + active)
    pub total: usize,
    /// Sessions sitting in the idle queue
    pub idle: usize,
    /// Sessions borrowed by callers
    pub active: usize,
    /// Callers waiting in acquire
    pub waiting: usize,
}

impl PoolStats {
    pub fn new(total: usize, idle: usize, active: usize, waiting: usize) -> Self {
        Self {
            total,
            idle,
            active,
            waiting,
        }
    }
}
