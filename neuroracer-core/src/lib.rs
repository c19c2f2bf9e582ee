pub mod cue;
pub mod device;
pub mod run_state;
pub mod schedule;
pub mod trial;

pub use cue::{CueCommand, CueModality};
pub use device::{DeviceDescriptor, DeviceSet};
pub use run_state::RunState;
pub use schedule::{ScheduleAction, WaitRange};
pub use trial::{MISSED_REACTION_MS, TrialRecord};
