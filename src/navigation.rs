//! Navigation side effects requested by the session manager.

use std::sync::{Mutex, PoisonError};

use tracing::info;

/// Application root, where login and logout land.
pub const ROOT: &str = "/";

/// Receives navigation requests from the stores.
pub trait Navigator: Send + Sync + std::fmt::Debug {
    fn navigate(&self, path: &str);
}

/// Logs navigation requests and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, path: &str) {
        info!(name: "navigation.requested", path = %path, "Navigation requested");
    }
}

/// Records navigation requests so a host can replay or inspect them.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths requested so far, oldest first.
    #[must_use]
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Drain the recorded paths.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.visited.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        self.visited.lock().unwrap_or_else(PoisonError::into_inner).push(path.to_string());
    }
}
