use serde::{Deserialize, Serialize};

/// Sensory channel a cue is presented on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CueModality {
    Audio,
    Visual,
}

impl CueModality {
    /// Resolves the pair of flags used by schedule entries and the wire format.
    /// Audio takes precedence when both are set.
    pub fn from_flags(audio_cue: bool, visual_cue: bool) -> Option<Self> {
        if audio_cue {
            Some(Self::Audio)
        } else if visual_cue {
            Some(Self::Visual)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Audio => "Audio",
            Self::Visual => "Visual",
        }
    }
}

impl std::fmt::Display for CueModality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Object sent to the presentation system when a cue fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueCommand {
    pub audio_cue: bool,
    pub visual_cue: bool,
}

impl From<CueModality> for CueCommand {
    fn from(modality: CueModality) -> Self {
        Self {
            audio_cue: modality == CueModality::Audio,
            visual_cue: modality == CueModality::Visual,
        }
    }
}
