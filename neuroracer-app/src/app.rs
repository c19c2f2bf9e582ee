use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use neuroracer_core::DeviceSet;
use neuroracer_engine::{
    AppPaths, Backends, EngineConfig, Notification, RunSummary, Session, SimulatedBackend,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::console::{self, HELP, Input};

pub struct App {
    config: EngineConfig,
    paths: AppPaths,
    simulator: Option<SimulatedBackend>,
}

impl App {
    /// Accepts an optional config file path and `--simulate`.
    pub fn new(args: impl Iterator<Item = String>) -> Result<Self> {
        let mut config_path: Option<PathBuf> = None;
        let mut simulate = false;
        for arg in args {
            match arg.as_str() {
                "--simulate" => simulate = true,
                flag if flag.starts_with("--") => bail!("unknown option {}", flag),
                path => config_path = Some(PathBuf::from(path)),
            }
        }

        let config = config_path
            .map(|path| EngineConfig::load_or_default(&path))
            .unwrap_or_default();
        let paths = AppPaths::new(&config);
        let simulator = simulate.then(|| {
            let simulator = SimulatedBackend::new();
            simulator.attach("Simulated Wheel", 12);
            simulator
        });

        Ok(Self {
            config,
            paths,
            simulator,
        })
    }

    pub async fn run(self) -> Result<()> {
        println!("=== NEURORACER TRIAL ENGINE ===");
        println!("Platform: {}", std::env::consts::OS);
        println!("Settings: {}", self.paths.settings_file().display());
        println!("Trial logs: {}", self.paths.output_dir().display());
        println!("Type 'help' for commands.\n");

        let mut backends = Backends::native(&self.config, &self.paths);
        if let Some(simulator) = &self.simulator {
            backends.devices = Arc::new(simulator.clone());
        }
        let (mut session, notifications) = Session::start(self.config.clone(), backends);
        let printer = tokio::spawn(print_notifications(notifications));
        let mut lines = spawn_stdin_reader();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
                line = lines.recv() => {
                    let Some(line) = line else { break };
                    if !self.execute(&session, &line) {
                        break;
                    }
                }
            }
        }

        session.shutdown().await;
        drop(session);
        printer.await?;
        println!("Goodbye.");
        Ok(())
    }

    /// Returns false when the user asked to quit.
    fn execute(&self, session: &Session, line: &str) -> bool {
        let input = match console::parse(line) {
            Ok(Some(input)) => input,
            Ok(None) => return true,
            Err(message) => {
                println!("{}", message);
                return true;
            }
        };
        match input {
            Input::Engine(command) => {
                if !session.send(command) {
                    return false;
                }
            }
            Input::Devices => print_devices(&session.devices()),
            Input::Status => {
                let selection = session.selection();
                println!("Run state: {}", session.run_state());
                match selection.device {
                    Some(device) => println!(
                        "Input: {} ({}), button {}",
                        device.display_name, device.id, selection.button
                    ),
                    None => println!("Input: none"),
                }
            }
            Input::Press(button) => self.drive_simulator(session, button, true),
            Input::Release(button) => self.drive_simulator(session, button, false),
            Input::Help => println!("{}", HELP),
            Input::Quit => return false,
        }
        true
    }

    fn drive_simulator(&self, session: &Session, button: usize, down: bool) {
        let Some(simulator) = &self.simulator else {
            println!("press/release need --simulate");
            return;
        };
        let selection = session.selection();
        let Some(id) = selection.device_id() else {
            println!("No input device selected");
            return;
        };
        if !simulator.set_button(id, button, down) {
            println!("{} has no button {}", id, button);
        }
    }
}

/// Reads stdin on a plain thread so a blocked read never holds up runtime
/// shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
        debug!("stdin closed");
    });
    rx
}

fn print_devices(devices: &DeviceSet) {
    if devices.is_empty() {
        println!("No input devices attached");
        return;
    }
    for device in devices {
        println!(
            "  {:<20} {} ({} buttons)",
            device.id, device.display_name, device.button_count
        );
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Run {}: {} actions, {} cues, {} skipped",
        if summary.stopped { "stopped" } else { "finished" },
        summary.executed,
        summary.cues,
        summary.skipped
    );
}

async fn print_notifications(mut rx: mpsc::UnboundedReceiver<Notification>) {
    while let Some(notification) = rx.recv().await {
        match notification {
            Notification::Log(line) => println!("{}", line),
            Notification::Progress {
                fraction,
                step,
                total,
                elapsed,
                action,
                actions,
            } => {
                let quarter = (total / 4).max(1);
                if action > 0 && step > 0 && step % quarter == 0 {
                    println!(
                        "  {:>3.0}% {:.1}s (Step {} of {})",
                        fraction * 100.0,
                        elapsed.as_secs_f64(),
                        action,
                        actions
                    );
                }
            }
            Notification::DeviceSetChanged(devices) => print_devices(&devices),
            Notification::RunFinished(summary) => print_summary(&summary),
            Notification::ButtonDetected(index) => println!("Response button is now {}", index),
        }
    }
}
