//! Input device access.
//!
//! A [`DeviceBackend`] is the session's device-manager handle: it enumerates
//! attached devices and opens them. An opened [`InputDevice`] is owned by the
//! input poller and released when dropped.

#[cfg(target_os = "linux")]
mod linux;
mod sim;

use std::sync::Arc;

use neuroracer_core::DeviceDescriptor;

use crate::error::EngineResult;

#[cfg(target_os = "linux")]
pub use linux::JoystickBackend;
pub use sim::SimulatedBackend;

/// Digital button states of a device at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonSnapshot(Vec<bool>);

impl ButtonSnapshot {
    pub fn new(buttons: Vec<bool>) -> Self {
        Self(buttons)
    }

    /// Buttons outside the device's range read as released.
    pub fn is_pressed(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    /// Indices released in `previous` and pressed now.
    pub fn rising_edges(&self, previous: &ButtonSnapshot) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|&(i, &down)| down && !previous.is_pressed(i))
            .map(|(i, _)| i)
            .collect()
    }
}

pub trait DeviceBackend: Send + Sync {
    /// Currently attached devices. Enumeration problems are logged and yield
    /// whatever could be found.
    fn enumerate(&self) -> Vec<DeviceDescriptor>;

    fn open(&self, device: &DeviceDescriptor) -> EngineResult<Box<dyn InputDevice>>;
}

pub trait InputDevice: Send {
    fn descriptor(&self) -> &DeviceDescriptor;

    /// Current button states. An error means the device is gone.
    fn poll(&mut self) -> EngineResult<ButtonSnapshot>;
}

/// A backend with nothing attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl DeviceBackend for NullBackend {
    fn enumerate(&self) -> Vec<DeviceDescriptor> {
        Vec::new()
    }

    fn open(&self, device: &DeviceDescriptor) -> EngineResult<Box<dyn InputDevice>> {
        Err(crate::error::EngineError::DeviceNotFound(device.id.clone()))
    }
}

/// The platform's native game-controller backend.
pub fn default_backend() -> Arc<dyn DeviceBackend> {
    #[cfg(target_os = "linux")]
    {
        Arc::new(JoystickBackend::default())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Arc::new(NullBackend)
    }
}
