use cync_proto::capability::{Capability, CapabilitySet};

use crate::model::{Device, Group, Home, Room};

/// Anything a command can address: a single device, a subgroup, a room, or a
/// whole home. Collections carry the mesh address of the collection itself
/// and the cached capability intersection of their members, so command
/// validation and frame building never walk the tree.
///
/// Values are snapshots cloned out of the topology store; hub resolution
/// happens against live store state at send time.
#[derive(Clone, Debug)]
pub enum Controllable {
    Device(Device),
    Group(Group),
    Room(Room),
    Home(Home),
}

impl Controllable {
    #[must_use]
    pub const fn home_id(&self) -> u32 {
        match self {
            Self::Device(device) => device.home_id,
            Self::Group(group) => group.home_id,
            Self::Room(room) => room.home_id,
            Self::Home(home) => home.home_id,
        }
    }

    #[must_use]
    pub const fn mesh_reference_id(&self) -> u8 {
        match self {
            Self::Device(device) => device.mesh_reference_id,
            Self::Group(group) => group.mesh_reference_id,
            Self::Room(room) => room.mesh_reference_id,
            Self::Home(_) => Home::MESH_BROADCAST,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Device(device) => &device.name,
            Self::Group(group) => &group.name,
            Self::Room(room) => &room.name,
            Self::Home(home) => &home.name,
        }
    }

    #[must_use]
    pub const fn capabilities(&self) -> &CapabilitySet {
        match self {
            Self::Device(device) => &device.capabilities,
            Self::Group(group) => &group.capabilities,
            Self::Room(room) => &room.capabilities,
            Self::Home(home) => &home.capabilities,
        }
    }

    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl From<Device> for Controllable {
    fn from(device: Device) -> Self {
        Self::Device(device)
    }
}

impl From<Group> for Controllable {
    fn from(group: Group) -> Self {
        Self::Group(group)
    }
}

impl From<Room> for Controllable {
    fn from(room: Room) -> Self {
        Self::Room(room)
    }
}

impl From<Home> for Controllable {
    fn from(home: Home) -> Self {
        Self::Home(home)
    }
}
