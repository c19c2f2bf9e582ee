//! The attached device set and the current device/button selection.
//!
//! Both values live in `watch` channels so readers always see a whole
//! snapshot: the set is swapped, never edited in place.

use neuroracer_core::{DeviceDescriptor, DeviceSet};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::settings::{AppSettings, SettingsStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub device: Option<DeviceDescriptor>,
    pub button: usize,
}

impl Selection {
    pub fn device_id(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.id.as_str())
    }

    fn to_settings(&self) -> AppSettings {
        AppSettings {
            selected_device: self.device.as_ref().map(|d| d.display_name.clone()),
            selected_button_index: self.button,
        }
    }
}

/// Keeps `button` if the device has it, otherwise falls back to the first
/// button.
fn fit_button(device: Option<&DeviceDescriptor>, button: usize) -> usize {
    match device {
        Some(d) if !d.has_button(button) => 0,
        _ => button,
    }
}

pub struct DeviceRegistry {
    devices: watch::Sender<DeviceSet>,
    selection: watch::Sender<Selection>,
    settings: Option<SettingsStore>,
}

impl DeviceRegistry {
    /// Starts from an initial enumeration with the first device selected.
    pub fn new(initial: Vec<DeviceDescriptor>, settings: Option<SettingsStore>) -> Self {
        let set = DeviceSet::new(initial);
        let selection = Selection {
            device: set.first().cloned(),
            button: 0,
        };
        Self {
            devices: watch::Sender::new(set),
            selection: watch::Sender::new(selection),
            settings,
        }
    }

    /// Applies saved settings without writing them back.
    pub fn restore(&self, saved: &AppSettings) {
        let devices = self.devices();
        let device = saved
            .selected_device
            .as_deref()
            .and_then(|name| devices.by_name(name))
            .or_else(|| devices.first())
            .cloned();
        let button = fit_button(device.as_ref(), saved.selected_button_index);
        self.selection.send_replace(Selection { device, button });
    }

    pub fn devices(&self) -> DeviceSet {
        self.devices.borrow().clone()
    }

    pub fn selection(&self) -> Selection {
        self.selection.borrow().clone()
    }

    pub fn subscribe_devices(&self) -> watch::Receiver<DeviceSet> {
        self.devices.subscribe()
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<Selection> {
        self.selection.subscribe()
    }

    /// Installs a fresh enumeration if its size differs from the current set.
    /// The selected device is kept when a device of the same name is still
    /// attached; otherwise the first device is selected.
    pub fn replace_if_count_changed(&self, found: Vec<DeviceDescriptor>) -> Option<DeviceSet> {
        if found.len() == self.devices.borrow().len() {
            return None;
        }
        let set = DeviceSet::new(found);
        self.devices.send_replace(set.clone());

        let previous = self.selection();
        let device = previous
            .device
            .as_ref()
            .and_then(|d| set.by_name(&d.display_name))
            .or_else(|| set.first())
            .cloned();
        let button = fit_button(device.as_ref(), previous.button);
        let next = Selection { device, button };
        if next != previous {
            match &next.device {
                Some(d) => info!("Selected input device: {}", d.display_name),
                None => warn!("No input device attached"),
            }
            self.selection.send_replace(next);
            self.persist();
        }
        Some(set)
    }

    /// Selects a device by id or display name.
    pub fn select_device(&self, key: &str) -> EngineResult<DeviceDescriptor> {
        let device = self
            .devices()
            .find(key)
            .cloned()
            .ok_or_else(|| EngineError::DeviceNotFound(key.to_string()))?;
        self.selection.send_modify(|sel| {
            sel.button = fit_button(Some(&device), sel.button);
            sel.device = Some(device.clone());
        });
        self.persist();
        Ok(device)
    }

    pub fn select_button(&self, index: usize) -> EngineResult<usize> {
        if let Some(device) = self.selection.borrow().device.as_ref() {
            if !device.has_button(index) {
                return Err(EngineError::InvalidButton {
                    device: device.display_name.clone(),
                    index,
                    count: device.button_count,
                });
            }
        }
        self.selection.send_modify(|sel| sel.button = index);
        self.persist();
        Ok(index)
    }

    fn persist(&self) {
        if let Some(store) = &self.settings {
            store.save(&self.selection().to_settings());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wheel() -> DeviceDescriptor {
        DeviceDescriptor::new("js0", "Wheel", 12)
    }

    fn pad() -> DeviceDescriptor {
        DeviceDescriptor::new("js1", "Pad", 4)
    }

    #[test]
    fn equal_count_is_not_a_change() {
        let registry = DeviceRegistry::new(vec![wheel()], None);
        assert!(registry.replace_if_count_changed(vec![pad()]).is_none());
        assert_eq!(registry.devices().first().unwrap().display_name, "Wheel");
    }

    #[test]
    fn selection_survives_when_name_still_present() {
        let registry = DeviceRegistry::new(vec![pad(), wheel()], None);
        registry.select_device("Wheel").unwrap();
        registry.select_button(7).unwrap();

        let moved = DeviceDescriptor::new("js0", "Wheel", 12);
        let set = registry.replace_if_count_changed(vec![moved.clone()]).unwrap();
        assert_eq!(set.len(), 1);
        let sel = registry.selection();
        assert_eq!(sel.device, Some(moved));
        assert_eq!(sel.button, 7);
    }

    #[test]
    fn falls_back_to_first_device_and_valid_button() {
        let registry = DeviceRegistry::new(vec![wheel()], None);
        registry.select_button(9).unwrap();
        registry.replace_if_count_changed(vec![pad(), DeviceDescriptor::new("js2", "Stick", 2)]);
        let sel = registry.selection();
        assert_eq!(sel.device_id(), Some("js1"));
        assert_eq!(sel.button, 0);
    }

    #[test]
    fn removing_every_device_clears_selection() {
        let registry = DeviceRegistry::new(vec![wheel()], None);
        registry.replace_if_count_changed(Vec::new()).unwrap();
        assert_eq!(registry.selection().device, None);
    }

    #[test]
    fn button_must_exist_on_selected_device() {
        let registry = DeviceRegistry::new(vec![pad()], None);
        assert!(matches!(
            registry.select_button(4),
            Err(EngineError::InvalidButton { count: 4, .. })
        ));
        assert_eq!(registry.select_button(3).unwrap(), 3);
    }

    #[test]
    fn restore_matches_saved_name() {
        let registry = DeviceRegistry::new(vec![pad(), wheel()], None);
        registry.restore(&AppSettings {
            selected_device: Some("Wheel".to_string()),
            selected_button_index: 5,
        });
        let sel = registry.selection();
        assert_eq!(sel.device_id(), Some("js0"));
        assert_eq!(sel.button, 5);
    }

    #[test]
    fn selection_changes_are_saved() {
        let path = std::env::temp_dir().join(format!("neuroracer-registry-{}.json", std::process::id()));
        let store = SettingsStore::new(&path);
        let registry = DeviceRegistry::new(vec![pad(), wheel()], Some(store.clone()));
        registry.select_device("js0").unwrap();
        registry.select_button(2).unwrap();
        assert_eq!(
            store.load(),
            AppSettings {
                selected_device: Some("Wheel".to_string()),
                selected_button_index: 2,
            }
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unknown_device_is_rejected() {
        let registry = DeviceRegistry::new(vec![pad()], None);
        assert!(matches!(
            registry.select_device("Joystick"),
            Err(EngineError::DeviceNotFound(_))
        ));
    }
}
