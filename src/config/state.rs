// Application state module
// Immutable configuration plus the connection counter shared by all tasks

use std::sync::atomic::{AtomicUsize, Ordering};

use super::types::Config;

/// Application state
pub struct AppState {
    pub config: Config,
    active_connections: AtomicUsize,
}

impl AppState {
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            active_connections: AtomicUsize::new(0),
        }
    }

    /// Reserve a connection slot, returns false when the limit is reached
    pub fn try_acquire_connection(&self) -> bool {
        // Increment first, then check limit (prevents race condition)
        let prev_count = self.active_connections.fetch_add(1, Ordering::SeqCst);
        let Some(max_conn) = self.config.performance.max_connections else {
            return true;
        };
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            self.active_connections.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    pub fn release_connection(&self) {
        self.active_connections.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }
}
