pub mod cadence;
pub mod countdown;

pub use cadence::{CadenceMeter, JitterStats};
pub use countdown::{Countdown, CountdownOutcome, CountdownTick, PauseGate};
