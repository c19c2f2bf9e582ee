//! Linux joystick API (`/dev/input/js*`).
//!
//! Each device node yields 8-byte events: `u32` timestamp, `i16` value,
//! `u8` type, `u8` number. On open the driver replays the current state as
//! events flagged with `JS_EVENT_INIT`.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use neuroracer_core::DeviceDescriptor;
use tracing::debug;

use super::{ButtonSnapshot, DeviceBackend, InputDevice};
use crate::error::{EngineError, EngineResult};

const JS_EVENT_BUTTON: u8 = 0x01;
const JS_EVENT_INIT: u8 = 0x80;
const JS_EVENT_SIZE: usize = 8;

const JSIOCGBUTTONS: libc::c_ulong = 0x8001_6a12;
const NAME_LEN: usize = 128;

fn jsiocgname(len: usize) -> libc::c_ulong {
    0x8000_6a13 | ((len as libc::c_ulong) << 16)
}

fn open_node(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

fn query_buttons(file: &File) -> usize {
    let mut count: u8 = 0;
    // SAFETY: JSIOCGBUTTONS writes a single byte into `count`.
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), JSIOCGBUTTONS as _, &mut count as *mut u8) };
    if rc < 0 { 0 } else { count as usize }
}

fn query_name(file: &File) -> Option<String> {
    let mut buf = [0u8; NAME_LEN];
    // SAFETY: JSIOCGNAME(len) writes at most `len` bytes into `buf`.
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), jsiocgname(NAME_LEN) as _, buf.as_mut_ptr()) };
    if rc < 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    Some(String::from_utf8_lossy(&buf[..end]).trim().to_string())
}

fn node_number(path: &Path) -> Option<u32> {
    path.file_name()?.to_str()?.strip_prefix("js")?.parse().ok()
}

/// Enumerates joystick nodes under a device directory, `/dev/input` by
/// default.
#[derive(Debug, Clone)]
pub struct JoystickBackend {
    dir: PathBuf,
}

impl JoystickBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn describe(path: &Path) -> std::io::Result<DeviceDescriptor> {
        let file = open_node(path)?;
        let id = path.display().to_string();
        let name = query_name(&file).filter(|n| !n.is_empty()).unwrap_or_else(|| id.clone());
        Ok(DeviceDescriptor::new(id, name, query_buttons(&file)))
    }
}

impl Default for JoystickBackend {
    fn default() -> Self {
        Self::new("/dev/input")
    }
}

impl DeviceBackend for JoystickBackend {
    fn enumerate(&self) -> Vec<DeviceDescriptor> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot read {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };
        let mut nodes: Vec<(u32, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter_map(|path| node_number(&path).map(|n| (n, path)))
            .collect();
        nodes.sort();

        nodes
            .into_iter()
            .filter_map(|(_, path)| match Self::describe(&path) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    debug!("Skipping {}: {}", path.display(), e);
                    None
                }
            })
            .collect()
    }

    fn open(&self, device: &DeviceDescriptor) -> EngineResult<Box<dyn InputDevice>> {
        let file = open_node(Path::new(&device.id)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => EngineError::DeviceNotFound(device.id.clone()),
            _ => EngineError::Io(e),
        })?;
        Ok(Box::new(JoystickDevice {
            descriptor: device.clone(),
            file,
            buttons: vec![false; device.button_count],
        }))
    }
}

struct JoystickDevice {
    descriptor: DeviceDescriptor,
    file: File,
    buttons: Vec<bool>,
}

impl JoystickDevice {
    fn apply(&mut self, event: &[u8; JS_EVENT_SIZE]) {
        let value = i16::from_le_bytes([event[4], event[5]]);
        let kind = event[6] & !JS_EVENT_INIT;
        let number = event[7] as usize;
        if kind != JS_EVENT_BUTTON {
            return;
        }
        if number >= self.buttons.len() {
            self.buttons.resize(number + 1, false);
        }
        self.buttons[number] = value != 0;
    }
}

impl InputDevice for JoystickDevice {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn poll(&mut self) -> EngineResult<ButtonSnapshot> {
        let mut event = [0u8; JS_EVENT_SIZE];
        loop {
            match self.file.read(&mut event) {
                Ok(JS_EVENT_SIZE) => self.apply(&event),
                Ok(0) => return Err(EngineError::Disconnected(self.descriptor.id.clone())),
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Read from {} failed: {}", self.descriptor.id, e);
                    return Err(EngineError::Disconnected(self.descriptor.id.clone()));
                }
            }
        }
        Ok(ButtonSnapshot::new(self.buttons.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: u8, number: u8, value: i16) -> [u8; JS_EVENT_SIZE] {
        let mut e = [0u8; JS_EVENT_SIZE];
        e[4..6].copy_from_slice(&value.to_le_bytes());
        e[6] = kind;
        e[7] = number;
        e
    }

    #[test]
    fn node_numbers_come_from_js_prefix() {
        assert_eq!(node_number(Path::new("/dev/input/js3")), Some(3));
        assert_eq!(node_number(Path::new("/dev/input/event3")), None);
        assert_eq!(node_number(Path::new("/dev/input/jsx")), None);
    }

    #[test]
    fn button_events_update_state_and_axes_are_ignored() {
        let file = match File::open("/dev/null") {
            Ok(file) => file,
            Err(_) => return,
        };
        let mut device = JoystickDevice {
            descriptor: DeviceDescriptor::new("/dev/input/js0", "Pad", 2),
            file,
            buttons: vec![false; 2],
        };
        device.apply(&event(JS_EVENT_BUTTON | JS_EVENT_INIT, 1, 1));
        device.apply(&event(0x02, 0, 1));
        device.apply(&event(JS_EVENT_BUTTON, 4, 1));
        assert_eq!(device.buttons, vec![false, true, false, false, true]);
        device.apply(&event(JS_EVENT_BUTTON, 1, 0));
        assert!(!device.buttons[1]);
    }

    #[test]
    fn missing_directory_enumerates_nothing() {
        assert!(JoystickBackend::new("/nonexistent/input").enumerate().is_empty());
    }
}
