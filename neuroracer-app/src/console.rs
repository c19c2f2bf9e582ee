//! Line-oriented console commands.

use std::path::PathBuf;

use neuroracer_engine::Command;

pub const HELP: &str = "\
Commands:
  start | stop | pause | resume | toggle
  devices              list attached input devices
  device <id|name>     select an input device
  button <n>           select the response button (zero-based)
  detect               use the next button pressed as the response button
  schedule <path>      load a schedule file
  output <dir>         set the trial log directory
  name <test name>     set the test name used in log file names
  press <n> | release <n>   drive the simulated device (--simulate)
  status | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Engine(Command),
    Devices,
    Status,
    Press(usize),
    Release(usize),
    Help,
    Quit,
}

fn index(arg: &str, what: &str) -> Result<usize, String> {
    arg.parse()
        .map_err(|_| format!("{} expects a button number, got '{}'", what, arg))
}

fn required<'a>(arg: &'a str, what: &str) -> Result<&'a str, String> {
    if arg.is_empty() {
        Err(format!("{} needs an argument", what))
    } else {
        Ok(arg)
    }
}

pub fn parse(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let input = match word.to_ascii_lowercase().as_str() {
        "start" => Input::Engine(Command::Start),
        "stop" => Input::Engine(Command::Stop),
        "pause" => Input::Engine(Command::Pause),
        "resume" => Input::Engine(Command::Resume),
        "toggle" => Input::Engine(Command::TogglePause),
        "detect" => Input::Engine(Command::BeginButtonDetection),
        "device" => Input::Engine(Command::SelectDevice(required(rest, "device")?.to_string())),
        "button" => Input::Engine(Command::SelectButton(index(rest, "button")?)),
        "schedule" => Input::Engine(Command::LoadSchedule(PathBuf::from(required(rest, "schedule")?))),
        "output" => Input::Engine(Command::SetOutputDirectory(PathBuf::from(required(rest, "output")?))),
        // An empty name resets to the configured default.
        "name" => Input::Engine(Command::SetTestName(rest.to_string())),
        "devices" => Input::Devices,
        "status" => Input::Status,
        "press" => Input::Press(index(rest, "press")?),
        "release" => Input::Release(index(rest, "release")?),
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(format!("Unknown command '{}'; type 'help'", other)),
    };
    Ok(Some(input))
}
