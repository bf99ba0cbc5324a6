use cync_proto::capability::{Capability, CapabilitySet, capabilities_for};
use cync_proto::parser::DeviceStatus;
use serde::{Deserialize, Serialize};

/// Last known illumination state of a mesh device. Populated exclusively by
/// inbound sync pushes and status pages; user commands never write it.
///
/// `color_mode` and `color_temp` are distinct wire fields and are never
/// derived from one another.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    pub is_on: bool,
    pub brightness: u8,
    pub color_mode: u8,
    pub color_temp: u8,
    pub rgb: (u8, u8, u8),
}

/// One physical device in a home's Bluetooth mesh.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Device {
    /// Cloud-global device id, used to address the device over TCP.
    pub device_id: u32,
    /// Vendor-assigned mesh device id from discovery.
    pub mesh_device_id: u32,
    /// On-wire mesh address within the home; stable for the device's
    /// lifetime.
    pub mesh_reference_id: u8,
    pub home_id: u32,
    pub name: String,
    pub device_type: u16,
    pub mac: String,
    pub product_id: String,
    pub authorize_code: String,
    pub capabilities: CapabilitySet,
    pub is_online: bool,
    /// Set by a probe acknowledgement; a Wi-Fi connected mesh device can act
    /// as the home's hub.
    pub wifi_connected: bool,
    pub state: Option<LightState>,
}

impl Device {
    /// The mesh address is the mesh device id reduced modulo the home id.
    #[must_use]
    pub const fn mesh_reference(mesh_device_id: u32, home_id: u32) -> u8 {
        (mesh_device_id % home_id) as u8
    }

    #[must_use]
    pub fn capabilities_for_type(device_type: u16) -> CapabilitySet {
        capabilities_for(device_type)
    }

    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// A hub candidate bridges cloud traffic onto the Bluetooth mesh.
    #[must_use]
    pub fn is_hub_candidate(&self) -> bool {
        self.wifi_connected && self.supports(Capability::SigMesh)
    }

    pub(crate) fn apply_status(&mut self, status: &DeviceStatus) {
        if let Some(online) = status.is_online {
            self.is_online = online;
        }
        let state = self.state.get_or_insert_with(LightState::default);
        state.is_on = status.is_on;
        state.brightness = status.brightness;
        state.color_mode = status.color_mode;
        state.rgb = status.rgb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(device_id: u32, mesh_device_id: u32, home_id: u32) -> Device {
        Device {
            device_id,
            mesh_device_id,
            mesh_reference_id: Device::mesh_reference(mesh_device_id, home_id),
            home_id,
            name: format!("Light {device_id}"),
            device_type: 137,
            mac: String::new(),
            product_id: String::new(),
            authorize_code: String::new(),
            capabilities: Device::capabilities_for_type(137),
            is_online: true,
            wifi_connected: false,
            state: None,
        }
    }

    #[test]
    fn mesh_reference_is_mesh_id_modulo_home_id() {
        for (mesh_device_id, home_id) in [(4u32, 5432u32), (232, 5432), (5436, 5432), (30, 29)] {
            let device = light(1, mesh_device_id, home_id);
            assert_eq!(u32::from(device.mesh_reference_id), mesh_device_id % home_id);
        }
    }

    #[test]
    fn status_updates_mutate_state_but_not_color_temp() {
        let mut device = light(1234, 4, 5432);
        device.state = Some(LightState {
            color_temp: 42,
            ..LightState::default()
        });

        device.apply_status(&DeviceStatus {
            is_online: Some(true),
            is_on: true,
            brightness: 80,
            color_mode: 57,
            rgb: (215, 150, 255),
        });

        let state = device.state.unwrap();
        assert!(state.is_on);
        assert_eq!(state.brightness, 80);
        assert_eq!(state.color_mode, 57);
        assert_eq!(state.rgb, (215, 150, 255));
        assert_eq!(state.color_temp, 42);
        assert!(device.is_online);
    }

    #[test]
    fn hub_candidates_need_wifi_and_mesh() {
        let mut device = light(1, 4, 5432);
        assert!(!device.is_hub_candidate());
        device.wifi_connected = true;
        assert!(device.is_hub_candidate());

        let mut thermostat = light(2, 5, 5432);
        thermostat.device_type = 224;
        thermostat.capabilities = Device::capabilities_for_type(224);
        thermostat.wifi_connected = true;
        assert!(!thermostat.is_hub_candidate());
    }
}
