use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use neuroracer_core::DeviceDescriptor;

use super::{ButtonSnapshot, DeviceBackend, InputDevice};
use crate::error::{EngineError, EngineResult};

#[derive(Debug)]
struct SimPad {
    descriptor: DeviceDescriptor,
    buttons: Vec<bool>,
}

#[derive(Debug, Default)]
struct SimState {
    pads: Vec<SimPad>,
    next_id: usize,
}

/// In-process backend whose devices and buttons are driven by hand. Clones
/// share the same devices.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn attach(&self, name: &str, buttons: usize) -> DeviceDescriptor {
        let mut state = self.lock();
        let descriptor = DeviceDescriptor::new(format!("sim{}", state.next_id), name, buttons);
        state.next_id += 1;
        state.pads.push(SimPad {
            descriptor: descriptor.clone(),
            buttons: vec![false; buttons],
        });
        descriptor
    }

    pub fn detach(&self, id: &str) -> bool {
        let mut state = self.lock();
        let before = state.pads.len();
        state.pads.retain(|p| p.descriptor.id != id);
        state.pads.len() != before
    }

    pub fn set_button(&self, id: &str, button: usize, down: bool) -> bool {
        let mut state = self.lock();
        match state
            .pads
            .iter_mut()
            .find(|p| p.descriptor.id == id)
            .and_then(|p| p.buttons.get_mut(button))
        {
            Some(slot) => {
                *slot = down;
                true
            }
            None => false,
        }
    }

    pub fn press(&self, id: &str, button: usize) -> bool {
        self.set_button(id, button, true)
    }

    pub fn release(&self, id: &str, button: usize) -> bool {
        self.set_button(id, button, false)
    }
}

impl DeviceBackend for SimulatedBackend {
    fn enumerate(&self) -> Vec<DeviceDescriptor> {
        self.lock().pads.iter().map(|p| p.descriptor.clone()).collect()
    }

    fn open(&self, device: &DeviceDescriptor) -> EngineResult<Box<dyn InputDevice>> {
        let state = self.lock();
        let pad = state
            .pads
            .iter()
            .find(|p| p.descriptor.id == device.id)
            .ok_or_else(|| EngineError::DeviceNotFound(device.id.clone()))?;
        Ok(Box::new(SimDevice {
            descriptor: pad.descriptor.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct SimDevice {
    descriptor: DeviceDescriptor,
    state: Arc<Mutex<SimState>>,
}

impl InputDevice for SimDevice {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn poll(&mut self) -> EngineResult<ButtonSnapshot> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .pads
            .iter()
            .find(|p| p.descriptor.id == self.descriptor.id)
            .map(|p| ButtonSnapshot::new(p.buttons.clone()))
            .ok_or_else(|| EngineError::Disconnected(self.descriptor.id.clone()))
    }
}
