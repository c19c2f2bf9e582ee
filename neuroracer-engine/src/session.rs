//! A running engine: the command controller, the input poller and the device
//! monitor, all bound to one cancellation token.

use std::mem;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use neuroracer_core::{DeviceSet, RunState};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::device::{DeviceBackend, default_backend};
use crate::dispatch::{CueSink, UdpCueDispatcher};
use crate::events::{Command, Notification, Notifier};
use crate::logger::{CsvJournal, TrialSinkFactory};
use crate::monitor::DeviceMonitor;
use crate::paths::AppPaths;
use crate::poller::{ButtonDetector, InputPoller};
use crate::registry::{DeviceRegistry, Selection};
use crate::schedule::Schedule;
use crate::settings::SettingsStore;
use crate::state::{RunControl, RunSummary, Sequencer};
use crate::trial::CueSlot;

/// The outside world a session talks to.
pub struct Backends {
    pub devices: Arc<dyn DeviceBackend>,
    pub cues: Arc<dyn CueSink>,
    pub journal: Arc<dyn TrialSinkFactory>,
    pub settings: Option<SettingsStore>,
}

impl Backends {
    /// Native joystick input, UDP cues, CSV logs and persisted settings.
    pub fn native(config: &EngineConfig, paths: &AppPaths) -> Self {
        Self {
            devices: default_backend(),
            cues: Arc::new(UdpCueDispatcher::new(config.cue_endpoint.clone())),
            journal: Arc::new(CsvJournal),
            settings: Some(SettingsStore::new(paths.settings_file().clone())),
        }
    }
}

pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    registry: Arc<DeviceRegistry>,
    control: Arc<RunControl>,
}

impl Session {
    /// Spawns the session's loops on the current runtime.
    pub fn start(config: EngineConfig, backends: Backends) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (notifier, notifications) = Notifier::channel();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let registry = Arc::new(DeviceRegistry::new(
            backends.devices.enumerate(),
            backends.settings.clone(),
        ));
        if let Some(store) = &backends.settings {
            registry.restore(&store.load());
        }
        let devices = registry.devices();
        notifier.info(format!("{} input devices attached", devices.len()));
        notifier.send(Notification::DeviceSetChanged(devices));
        if let Some(device) = registry.selection().device {
            notifier.info(format!(
                "Selected input device: {}, button {}",
                device.display_name,
                registry.selection().button
            ));
        }

        let schedule = if config.schedule_path.exists() {
            Schedule::load(&config.schedule_path, config.wait_bounds)
        } else {
            Schedule::default()
        };
        notifier.info(format!("Schedule has {} actions", schedule.len()));

        let control = Arc::new(RunControl::new());
        let cues = Arc::new(CueSlot::new());
        let detector = Arc::new(ButtonDetector::default());

        let poller = InputPoller::new(
            backends.devices.clone(),
            registry.clone(),
            cues.clone(),
            detector.clone(),
            notifier.clone(),
            config.poll_interval(),
            config.monitor_interval(),
        );
        let monitor = DeviceMonitor::new(
            backends.devices.clone(),
            registry.clone(),
            notifier.clone(),
            config.monitor_interval(),
        );
        let default_output_dir = config
            .output_dir
            .clone()
            .unwrap_or_else(AppPaths::default_output_dir);
        let controller = Controller {
            test_name: config.default_test_name.clone(),
            output_dir: default_output_dir.clone(),
            default_output_dir,
            schedule,
            config,
            control: control.clone(),
            cues,
            registry: registry.clone(),
            detector,
            dispatcher: backends.cues,
            journal: backends.journal,
            notifier,
            shutdown: cancel.clone(),
            walk: None,
        };

        let tasks = vec![
            tokio::spawn(poller.run(cancel.clone())),
            tokio::spawn(monitor.run(cancel.clone())),
            tokio::spawn(controller.run(command_rx)),
        ];

        let session = Self {
            commands,
            cancel,
            tasks,
            registry,
            control,
        };
        (session, notifications)
    }

    /// Queues a command. Returns false once the session has shut down.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<Command> {
        self.commands.clone()
    }

    pub fn run_state(&self) -> RunState {
        self.control.state()
    }

    pub fn devices(&self) -> DeviceSet {
        self.registry.devices()
    }

    pub fn selection(&self) -> Selection {
        self.registry.selection()
    }

    /// Stops every loop and waits for them to release their resources. Safe to
    /// call more than once.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        let tasks = mem::take(&mut self.tasks);
        if tasks.is_empty() {
            return;
        }
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Session task ended abnormally: {}", e);
            }
        }
        info!("Session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Walk {
    cancel: CancellationToken,
    task: JoinHandle<RunSummary>,
}

struct Controller {
    config: EngineConfig,
    schedule: Schedule,
    test_name: String,
    output_dir: PathBuf,
    default_output_dir: PathBuf,
    control: Arc<RunControl>,
    cues: Arc<CueSlot>,
    registry: Arc<DeviceRegistry>,
    detector: Arc<ButtonDetector>,
    dispatcher: Arc<dyn CueSink>,
    journal: Arc<dyn TrialSinkFactory>,
    notifier: Notifier,
    shutdown: CancellationToken,
    walk: Option<Walk>,
}

impl Controller {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }
        if let Some(walk) = &self.walk {
            walk.cancel.cancel();
        }
        self.join_walk().await;
        debug!("Controller stopped");
    }

    async fn handle(&mut self, command: Command) {
        debug!("Command: {:?}", command);
        match command {
            Command::Start => self.start().await,
            Command::Stop => self.stop().await,
            Command::Pause => match self.control.pause() {
                Some(_) => self.notifier.info("Run paused"),
                None => debug!("Pause ignored in state {}", self.control.state()),
            },
            Command::Resume => match self.control.resume() {
                Some(_) => self.notifier.info("Run resumed"),
                None => debug!("Resume ignored in state {}", self.control.state()),
            },
            Command::TogglePause => match self.control.toggle_pause() {
                Some(RunState::Paused) => self.notifier.info("Run paused"),
                Some(_) => self.notifier.info("Run resumed"),
                None => debug!("Pause toggle ignored in state {}", self.control.state()),
            },
            Command::SelectDevice(key) => match self.registry.select_device(&key) {
                Ok(device) => self
                    .notifier
                    .info(format!("Selected input device: {}", device.display_name)),
                Err(e) => self.notifier.warn(format!("Cannot select device: {}", e)),
            },
            Command::SelectButton(index) => match self.registry.select_button(index) {
                Ok(index) => self.notifier.info(format!("Selected button {}", index)),
                Err(e) => self.notifier.warn(format!("Cannot select button: {}", e)),
            },
            Command::LoadSchedule(path) => {
                self.schedule = Schedule::load(&path, self.config.wait_bounds);
                self.notifier.info(format!(
                    "Loaded {} actions ({} cues) from {}",
                    self.schedule.len(),
                    self.schedule.cue_count(),
                    path.display()
                ));
            }
            Command::SetOutputDirectory(path) => {
                self.notifier
                    .info(format!("Output directory: {}", path.display()));
                self.output_dir = path;
            }
            Command::SetTestName(name) => {
                let name = name.trim();
                self.test_name = if name.is_empty() {
                    self.config.default_test_name.clone()
                } else {
                    name.to_string()
                };
                self.notifier.info(format!("Test name: {}", self.test_name));
            }
            Command::BeginButtonDetection => match self.registry.selection().device {
                Some(device) => {
                    self.detector.arm();
                    self.notifier
                        .info(format!("Press any button on {}", device.display_name));
                }
                None => self.notifier.warn("No input device selected"),
            },
        }
    }

    async fn start(&mut self) {
        let state = self.control.state();
        if state.is_active() {
            self.notifier.info("A run is already in progress");
            return;
        }
        self.join_walk().await;
        if self.schedule.is_empty() {
            self.notifier.warn("Schedule is empty; load a schedule first");
            return;
        }
        if !self.control.begin() {
            debug!("Start ignored in state {}", self.control.state());
            return;
        }

        let output_dir = self.resolve_output_dir();
        let sink = self.journal.open_run(&self.test_name, &output_dir, Local::now());
        let cancel = self.shutdown.child_token();
        let sequencer = Sequencer::new(
            self.schedule.clone(),
            self.control.clone(),
            self.cues.clone(),
            self.dispatcher.clone(),
            self.notifier.clone(),
            self.config.cue_exposure(),
            self.config.countdown_steps,
            StdRng::from_os_rng(),
        );
        let task = tokio::spawn(sequencer.run(sink, cancel.clone()));
        self.walk = Some(Walk { cancel, task });
    }

    async fn stop(&mut self) {
        if self.control.stop().is_none() {
            return;
        }
        let Some(walk) = self.walk.as_ref() else {
            self.control.settle();
            self.notifier
                .reset_progress(self.config.countdown_steps as usize, self.schedule.actions().len());
            return;
        };
        if !walk.task.is_finished() {
            self.notifier.info("Stopping run");
        }
        walk.cancel.cancel();
        self.join_walk().await;
        self.control.settle();
    }

    /// Waits for the previous walk, if any, to exit.
    async fn join_walk(&mut self) {
        let Some(walk) = self.walk.take() else {
            return;
        };
        match walk.task.await {
            Ok(summary) => debug!("Walk ended: {:?}", summary),
            Err(e) => {
                warn!("Walk ended abnormally: {}", e);
                self.control.settle();
            }
        }
    }

    fn resolve_output_dir(&self) -> PathBuf {
        if self.output_dir.is_dir() {
            return self.output_dir.clone();
        }
        self.notifier.warn(format!(
            "Output directory {} does not exist; using {}",
            self.output_dir.display(),
            self.default_output_dir.display()
        ));
        self.default_output_dir.clone()
    }
}
