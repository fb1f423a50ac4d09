use std::fmt;
use tracing::{debug, warn};

/// Readiness of the host rendering engine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Error(String),
}

impl LoadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LoadState::Error(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Error(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Idle => write!(f, "idle"),
            LoadState::Loading => write!(f, "loading"),
            LoadState::Ready => write!(f, "ready"),
            LoadState::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

/// `Idle -> Loading -> {Ready, Error}`, `Ready -> Error`.
///
/// Only `reset` leaves `Error`. Transitions that the graph does not allow
/// are ignored and reported as `false`.
#[derive(Debug, Default)]
pub struct LoadStateMachine {
    state: LoadState,
}

impl LoadStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn begin_loading(&mut self) -> bool {
        if self.state != LoadState::Idle {
            debug!(state = %self.state, "ignoring begin_loading");
            return false;
        }
        self.state = LoadState::Loading;
        true
    }

    pub fn mark_ready(&mut self) -> bool {
        if self.state != LoadState::Loading {
            debug!(state = %self.state, "ignoring mark_ready");
            return false;
        }
        self.state = LoadState::Ready;
        true
    }

    /// Enter `Error`; an existing error keeps its first reason
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        match self.state {
            LoadState::Error(_) => {
                debug!(%reason, "already failed");
                false
            }
            _ => {
                warn!(from = %self.state, %reason, "map entered error state");
                let reason = if reason.trim().is_empty() {
                    "unknown map error".to_string()
                } else {
                    reason
                };
                self.state = LoadState::Error(reason);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = LoadState::Idle;
    }
}
