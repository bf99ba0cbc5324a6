use cync_proto::capability::CapabilitySet;
use serde::{Deserialize, Serialize};

use crate::model::Device;

/// Intersection over member capability sets. A grouping with no members gets
/// an empty set, which disables all control operations on it.
fn intersect<'a>(mut sets: impl Iterator<Item = &'a CapabilitySet>) -> CapabilitySet {
    let Some(first) = sets.next() else {
        return CapabilitySet::new();
    };
    sets.fold(first.clone(), |acc, set| &acc & set)
}

/// A named subgroup of devices inside a room.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    pub group_id: u32,
    pub home_id: u32,
    pub name: String,
    pub devices: Vec<Device>,
    /// Mesh address of the whole subgroup, derived like a device's.
    pub mesh_reference_id: u8,
    /// Cached intersection of the members' capabilities.
    pub capabilities: CapabilitySet,
}

impl Group {
    #[must_use]
    pub fn new(group_id: u32, home_id: u32, name: String, devices: Vec<Device>) -> Self {
        let capabilities = intersect(devices.iter().map(|device| &device.capabilities));
        Self {
            group_id,
            home_id,
            name,
            devices,
            mesh_reference_id: Device::mesh_reference(group_id, home_id),
            capabilities,
        }
    }
}

/// A room: devices plus any subgroups.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Room {
    pub room_id: u32,
    pub home_id: u32,
    pub name: String,
    pub groups: Vec<Group>,
    pub devices: Vec<Device>,
    pub mesh_reference_id: u8,
    pub capabilities: CapabilitySet,
}

impl Room {
    #[must_use]
    pub fn new(
        room_id: u32,
        home_id: u32,
        name: String,
        groups: Vec<Group>,
        devices: Vec<Device>,
    ) -> Self {
        let capabilities = intersect(
            devices
                .iter()
                .map(|device| &device.capabilities)
                .chain(groups.iter().map(|group| &group.capabilities)),
        );
        Self {
            room_id,
            home_id,
            name,
            groups,
            devices,
            mesh_reference_id: Device::mesh_reference(room_id, home_id),
            capabilities,
        }
    }
}

/// A user-defined location owning one Bluetooth mesh.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Home {
    pub home_id: u32,
    pub name: String,
    pub rooms: Vec<Room>,
    /// Devices not assigned to any room or subgroup.
    pub global_devices: Vec<Device>,
    pub capabilities: CapabilitySet,
}

impl Home {
    /// Mesh address targeting the whole mesh.
    pub const MESH_BROADCAST: u8 = 0;

    #[must_use]
    pub fn new(home_id: u32, name: String, rooms: Vec<Room>, global_devices: Vec<Device>) -> Self {
        let capabilities = intersect(
            global_devices
                .iter()
                .map(|device| &device.capabilities)
                .chain(rooms.iter().map(|room| &room.capabilities)),
        );
        Self {
            home_id,
            name,
            rooms,
            global_devices,
            capabilities,
        }
    }

    /// Every device in the home, across global devices, rooms and subgroups.
    /// Each device appears exactly once.
    pub fn flattened_devices(&self) -> impl Iterator<Item = &Device> {
        self.global_devices.iter().chain(self.rooms.iter().flat_map(|room| {
            room.devices
                .iter()
                .chain(room.groups.iter().flat_map(|group| group.devices.iter()))
        }))
    }

    pub(crate) fn flattened_devices_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.global_devices
            .iter_mut()
            .chain(self.rooms.iter_mut().flat_map(|room| {
                room.devices.iter_mut().chain(
                    room.groups
                        .iter_mut()
                        .flat_map(|group| group.devices.iter_mut()),
                )
            }))
    }

    #[must_use]
    pub fn contains_device(&self, device_id: u32) -> bool {
        self.device(device_id).is_some()
    }

    #[must_use]
    pub fn device(&self, device_id: u32) -> Option<&Device> {
        self.flattened_devices()
            .find(|device| device.device_id == device_id)
    }

    /// First device that can bridge commands onto the mesh right now.
    #[must_use]
    pub fn hub_candidate(&self) -> Option<&Device> {
        self.flattened_devices().find(|device| device.is_hub_candidate())
    }
}
