pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod logger;
pub mod monitor;
pub mod paths;
pub mod poller;
pub mod registry;
pub mod schedule;
pub mod session;
pub mod settings;
pub mod state;
pub mod trial;

pub use config::{EngineConfig, WaitBounds};
pub use device::{DeviceBackend, InputDevice, SimulatedBackend};
pub use dispatch::{CueSink, UdpCueDispatcher};
pub use error::{EngineError, EngineResult};
pub use events::{Command, Notification, Notifier};
pub use logger::{CsvJournal, MemoryJournal, MemorySink, TrialSink, TrialSinkFactory};
pub use paths::AppPaths;
pub use registry::{DeviceRegistry, Selection};
pub use schedule::Schedule;
pub use session::{Backends, Session};
pub use settings::{AppSettings, SettingsStore};
pub use state::{RunControl, RunSummary, Sequencer};
