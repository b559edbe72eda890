use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the application core.
///
/// `Initializing → Ready → Running → Stopping → Stopped`, with `Error` reachable
/// from a failed initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationState {
    #[default]
    Initializing,
    Ready,
    Running,
    Stopping,
    Stopped,
    Error,
}

impl ApplicationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationState::Initializing => "initializing",
            ApplicationState::Ready => "ready",
            ApplicationState::Running => "running",
            ApplicationState::Stopping => "stopping",
            ApplicationState::Stopped => "stopped",
            ApplicationState::Error => "error",
        }
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(ApplicationState::Initializing.to_string(), "initializing");
        assert_eq!(ApplicationState::Stopping.to_string(), "stopping");
        assert_eq!(ApplicationState::default(), ApplicationState::Initializing);
    }
}
