//! Per-user directory of homes, rooms, groups and devices.
//!
//! The store is the only shared mutable state between the session's event
//! loop and caller threads. Writes (discovery ingest, inbound state updates)
//! are serialized behind the lock; reads hand out cloned snapshots, so a
//! reader sees either the pre- or post-refresh topology, never a torn
//! intermediate.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use cync_proto::parser::{DeviceStatus, MeshEndpoint};

use crate::error::{CyncError, CyncResult};
use crate::model::{Device, Home};

/// Invoked on the session loop whenever inbound traffic changes device
/// state. Keyed by cloud device id.
pub type DeviceUpdateCallback = Arc<dyn Fn(&HashMap<u32, DeviceStatus>) + Send + Sync>;

#[derive(Default)]
struct UserHomes {
    homes: Vec<Home>,
    on_update: Option<DeviceUpdateCallback>,
}

#[derive(Default)]
pub struct TopologyStore {
    users: RwLock<HashMap<u32, UserHomes>>,
}

impl TopologyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u32, UserHomes>> {
        self.users.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<u32, UserHomes>> {
        self.users.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_user_homes(&self, user_id: u32, homes: Vec<Home>) {
        self.write().entry(user_id).or_default().homes = homes;
    }

    #[must_use]
    pub fn user_homes(&self, user_id: u32) -> Vec<Home> {
        self.read()
            .get(&user_id)
            .map(|user| user.homes.clone())
            .unwrap_or_default()
    }

    pub fn set_update_callback(&self, user_id: u32, callback: DeviceUpdateCallback) {
        self.write().entry(user_id).or_default().on_update = Some(callback);
    }

    #[must_use]
    pub fn update_callback(&self, user_id: u32) -> Option<DeviceUpdateCallback> {
        self.read()
            .get(&user_id)
            .and_then(|user| user.on_update.clone())
    }

    /// The home containing `device_id`.
    pub fn associated_home(&self, user_id: u32, device_id: u32) -> CyncResult<Home> {
        self.read()
            .get(&user_id)
            .and_then(|user| {
                user.homes
                    .iter()
                    .find(|home| home.contains_device(device_id))
            })
            .cloned()
            .ok_or(CyncError::DeviceNotFound(device_id))
    }

    /// Flattened device list of the home containing `device_id`.
    pub fn associated_home_devices(&self, user_id: u32, device_id: u32) -> CyncResult<Vec<Device>> {
        Ok(self
            .associated_home(user_id, device_id)?
            .flattened_devices()
            .cloned()
            .collect())
    }

    /// Flattened device list across all of the user's homes.
    #[must_use]
    pub fn flattened_devices(&self, user_id: u32) -> Vec<Device> {
        self.read()
            .get(&user_id)
            .map(|user| {
                user.homes
                    .iter()
                    .flat_map(Home::flattened_devices)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The parser's view of the topology: one entry per device.
    #[must_use]
    pub fn mesh_endpoints(&self, user_id: u32) -> Vec<MeshEndpoint> {
        self.read()
            .get(&user_id)
            .map(|user| {
                user.homes
                    .iter()
                    .flat_map(Home::flattened_devices)
                    .map(|device| MeshEndpoint {
                        device_id: device.device_id,
                        mesh_ref: device.mesh_reference_id,
                        device_type: device.device_type,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Records the outcome of a reachability probe. Returns whether the
    /// device was found.
    pub fn mark_wifi_connected(&self, user_id: u32, device_id: u32, connected: bool) -> bool {
        let mut users = self.write();
        let Some(user) = users.get_mut(&user_id) else {
            return false;
        };
        for home in &mut user.homes {
            if let Some(device) = home
                .flattened_devices_mut()
                .find(|device| device.device_id == device_id)
            {
                device.wifi_connected = connected;
                return true;
            }
        }
        false
    }

    /// Applies parsed inbound state updates to the device records.
    pub fn apply_status_updates(&self, user_id: u32, updates: &HashMap<u32, DeviceStatus>) {
        let mut users = self.write();
        let Some(user) = users.get_mut(&user_id) else {
            return;
        };
        for home in &mut user.homes {
            for device in home.flattened_devices_mut() {
                if let Some(status) = updates.get(&device.device_id) {
                    device.apply_status(status);
                }
            }
        }
    }

    /// Resolves the hub device to route commands through for `home_id`.
    pub fn hub_device(&self, user_id: u32, home_id: u32) -> CyncResult<Device> {
        self.read()
            .get(&user_id)
            .and_then(|user| user.homes.iter().find(|home| home.home_id == home_id))
            .ok_or(CyncError::NoHub(home_id))?
            .hub_candidate()
            .cloned()
            .ok_or(CyncError::NoHub(home_id))
    }
}
