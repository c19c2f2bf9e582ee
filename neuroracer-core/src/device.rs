use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// An attached input device as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub id: String,
    pub display_name: String,
    /// Zero when the backend cannot tell.
    pub button_count: usize,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, button_count: usize) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            button_count,
        }
    }

    /// Whether `index` addresses a real button. Devices with an unknown
    /// button count accept any index.
    pub fn has_button(&self, index: usize) -> bool {
        self.button_count == 0 || index < self.button_count
    }
}

/// Snapshot of attached devices. Replaced wholesale on change; cloning shares
/// the same backing slice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSet(Arc<[DeviceDescriptor]>);

impl DeviceSet {
    pub fn new(devices: Vec<DeviceDescriptor>) -> Self {
        Self(devices.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeviceDescriptor> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&DeviceDescriptor> {
        self.0.first()
    }

    pub fn by_id(&self, id: &str) -> Option<&DeviceDescriptor> {
        self.0.iter().find(|d| d.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&DeviceDescriptor> {
        self.0.iter().find(|d| d.display_name == name)
    }

    /// Looks a device up by id first, then by display name.
    pub fn find(&self, key: &str) -> Option<&DeviceDescriptor> {
        self.by_id(key).or_else(|| self.by_name(key))
    }
}

impl<'a> IntoIterator for &'a DeviceSet {
    type Item = &'a DeviceDescriptor;
    type IntoIter = std::slice::Iter<'a, DeviceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pads() -> DeviceSet {
        DeviceSet::new(vec![
            DeviceDescriptor::new("/dev/input/js0", "Wheel", 12),
            DeviceDescriptor::new("/dev/input/js1", "Pedals", 0),
        ])
    }

    #[test]
    fn find_prefers_id_then_name() {
        let set = pads();
        assert_eq!(set.find("/dev/input/js1").unwrap().display_name, "Pedals");
        assert_eq!(set.find("Wheel").unwrap().id, "/dev/input/js0");
        assert!(set.find("Joystick").is_none());
    }

    #[test]
    fn unknown_button_count_accepts_any_index() {
        let set = pads();
        assert!(set.by_name("Wheel").unwrap().has_button(11));
        assert!(!set.by_name("Wheel").unwrap().has_button(12));
        assert!(set.by_name("Pedals").unwrap().has_button(40));
    }
}
