use serde::{Deserialize, Serialize};

/// Lifecycle of a schedule walk.
///
/// `Stopping` is transient: the walk observes it at its next tick boundary and
/// settles into `Idle`. A walk that reaches the end of the schedule settles
/// into `Finished`.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopping,
    Finished,
}

impl RunState {
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Finished)
    }

    /// A walk exists and has not been asked to stop.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    pub fn is_stopping(&self) -> bool {
        matches!(self, Self::Stopping)
    }

    pub fn pause(&self) -> Option<Self> {
        match self {
            Self::Running => Some(Self::Paused),
            _ => None,
        }
    }

    pub fn resume(&self) -> Option<Self> {
        match self {
            Self::Paused => Some(Self::Running),
            _ => None,
        }
    }

    pub fn toggle_pause(&self) -> Option<Self> {
        self.pause().or_else(|| self.resume())
    }

    /// Every state except `Stopping` itself may be asked to stop.
    pub fn stop(&self) -> Option<Self> {
        match self {
            Self::Stopping => None,
            _ => Some(Self::Stopping),
        }
    }

    /// Where a walk lands once it has exited.
    pub fn settle(&self) -> Self {
        match self {
            Self::Stopping | Self::Idle => Self::Idle,
            Self::Running | Self::Paused | Self::Finished => Self::Finished,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}
