//! Topology discovery.
//!
//! Two REST endpoints describe a user's installation: the subscribe list
//! (every cloud-registered device, with homes flagged by `source == 5`) and
//! each home's property blob (`bulbsArray` mesh devices and `groupsArray`
//! rooms/subgroups). Ingest joins the two and partitions devices into
//! subgroups, rooms and home-global leftovers; every device lands in exactly
//! one place.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::auth::{REST_API_BASE_URL, UserCredentials, check_status};
use crate::error::CyncResult;
use crate::model::{Device, Group, Home, Room};

const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct RawSubscribedDevice {
    id: u32,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    source: Option<u32>,
    #[serde(default)]
    product_id: String,
    #[serde(default)]
    mac: Option<String>,
    #[serde(default)]
    authorize_code: Option<String>,
    #[serde(default)]
    is_online: bool,
}

#[derive(Clone, Debug, Deserialize)]
struct RawMeshDevice {
    #[serde(rename = "deviceID")]
    device_id: u32,
    #[serde(rename = "switchID")]
    switch_id: u32,
    #[serde(rename = "displayName", default)]
    display_name: String,
    #[serde(rename = "deviceType")]
    device_type: u16,
}

#[derive(Clone, Debug, Deserialize)]
struct RawGroup {
    #[serde(rename = "groupID")]
    group_id: u32,
    #[serde(rename = "displayName", default)]
    display_name: String,
    #[serde(rename = "isSubgroup", default)]
    is_subgroup: bool,
    #[serde(rename = "deviceIDArray", default)]
    device_ids: Vec<u32>,
    #[serde(rename = "subgroupIDArray", default)]
    subgroup_ids: Vec<u32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct RawHomeProperty {
    #[serde(rename = "bulbsArray", default)]
    bulbs: Vec<RawMeshDevice>,
    #[serde(rename = "groupsArray", default)]
    groups: Vec<RawGroup>,
}

/// REST client for the discovery endpoints.
pub(crate) struct CloudApi {
    http: reqwest::Client,
    base_url: Url,
}

impl CloudApi {
    pub fn new() -> CyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: Url::parse(REST_API_BASE_URL)?,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        credentials: &UserCredentials,
        endpoint: &str,
    ) -> CyncResult<T> {
        let url = self.base_url.join(endpoint)?;
        let response = self
            .http
            .get(url)
            .header("Access-Token", &credentials.access_token)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Fetches and ingests the user's full topology.
    pub async fn discover_homes(&self, credentials: &UserCredentials) -> CyncResult<Vec<Home>> {
        let subscribed: Vec<RawSubscribedDevice> = self
            .get_json(
                credentials,
                &format!("/v2/user/{}/subscribe/devices", credentials.user_id),
            )
            .await?;

        let mut homes = Vec::new();
        for entry in subscribed.iter().filter(|entry| entry.source == Some(5)) {
            let property: RawHomeProperty = self
                .get_json(
                    credentials,
                    &format!(
                        "/v2/product/{}/device/{}/property",
                        entry.product_id, entry.id
                    ),
                )
                .await?;
            homes.push(build_home(entry, property, &subscribed));
        }

        log::info!(
            "discovered {} home(s) with {} device(s) total",
            homes.len(),
            homes.iter().map(|home| home.flattened_devices().count()).sum::<usize>()
        );
        Ok(homes)
    }
}

fn build_device(home_id: u32, mesh: &RawMeshDevice, cloud: &RawSubscribedDevice) -> Device {
    Device {
        device_id: cloud.id,
        mesh_device_id: mesh.device_id,
        mesh_reference_id: Device::mesh_reference(mesh.device_id, home_id),
        home_id,
        name: mesh.display_name.clone(),
        device_type: mesh.device_type,
        mac: cloud.mac.clone().unwrap_or_default(),
        product_id: cloud.product_id.clone(),
        authorize_code: cloud.authorize_code.clone().unwrap_or_default(),
        capabilities: Device::capabilities_for_type(mesh.device_type),
        is_online: cloud.is_online,
        wifi_connected: false,
        state: None,
    }
}

/// Joins one home's property blob against the subscribe list and partitions
/// the devices: subgroups claim theirs first, rooms take what remains of
/// their membership lists, and anything left over becomes home-global.
fn build_home(
    entry: &RawSubscribedDevice,
    property: RawHomeProperty,
    subscribed: &[RawSubscribedDevice],
) -> Home {
    let home_id = entry.id;

    // Pool of unassigned devices, keyed by mesh device id.
    let mut pool: BTreeMap<u32, Device> = property
        .bulbs
        .iter()
        .filter_map(|mesh| {
            let Some(cloud) = subscribed.iter().find(|device| device.id == mesh.switch_id) else {
                log::warn!(
                    "mesh device {} has no subscribe entry (switch id {})",
                    mesh.device_id,
                    mesh.switch_id
                );
                return None;
            };
            Some((mesh.device_id, build_device(home_id, mesh, cloud)))
        })
        .collect();

    let mut groups: BTreeMap<u32, Group> = BTreeMap::new();
    for raw in property.groups.iter().filter(|group| group.is_subgroup) {
        let devices: Vec<Device> = raw
            .device_ids
            .iter()
            .filter_map(|id| pool.remove(id))
            .collect();
        groups.insert(
            raw.group_id,
            Group::new(raw.group_id, home_id, raw.display_name.clone(), devices),
        );
    }

    let mut rooms = Vec::new();
    for raw in property.groups.iter().filter(|group| !group.is_subgroup) {
        let devices: Vec<Device> = raw
            .device_ids
            .iter()
            .filter_map(|id| pool.remove(id))
            .collect();
        let room_groups: Vec<Group> = raw
            .subgroup_ids
            .iter()
            .filter_map(|id| groups.remove(id))
            .collect();
        rooms.push(Room::new(
            raw.group_id,
            home_id,
            raw.display_name.clone(),
            room_groups,
            devices,
        ));
    }

    // Anything unclaimed lives directly on the home. A subgroup no room
    // adopted would orphan its devices, so those are dissolved back into the
    // global list to keep the partition exhaustive.
    let mut global_devices: Vec<Device> = pool.into_values().collect();
    for group in groups.into_values() {
        if !group.devices.is_empty() {
            log::warn!(
                "subgroup {} ({}) is not referenced by any room; keeping its devices home-global",
                group.group_id,
                group.name
            );
            global_devices.extend(group.devices);
        }
    }

    Home::new(
        home_id,
        entry.name.clone().unwrap_or_default(),
        rooms,
        global_devices,
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const HOME_ID: u32 = 5432;

    fn subscribed() -> Vec<RawSubscribedDevice> {
        serde_json::from_value(serde_json::json!([
            {
                "id": HOME_ID,
                "name": "House",
                "source": 5,
                "product_id": "1007d2ad150c4000",
                "mac": "A4:C1:38:00:00:01",
                "authorize_code": "home-auth",
                "is_online": true
            },
            {"id": 1234, "product_id": "p1", "mac": "m1", "authorize_code": "a1", "is_online": true},
            {"id": 2345, "product_id": "p2", "mac": "m2", "authorize_code": "a2", "is_online": true},
            {"id": 3456, "product_id": "p3", "mac": "m3", "authorize_code": "a3", "is_online": false},
            {"id": 4567, "product_id": "p4", "mac": "m4", "authorize_code": "a4", "is_online": true}
        ]))
        .unwrap()
    }

    fn property() -> RawHomeProperty {
        serde_json::from_value(serde_json::json!({
            "bulbsArray": [
                {"deviceID": 4, "switchID": 1234, "displayName": "Desk", "deviceType": 137},
                {"deviceID": 7, "switchID": 2345, "displayName": "Shelf", "deviceType": 137},
                {"deviceID": 2, "switchID": 3456, "displayName": "Ceiling", "deviceType": 131},
                {"deviceID": 232, "switchID": 4567, "displayName": "Porch", "deviceType": 137}
            ],
            "groupsArray": [
                {"groupID": 100, "displayName": "Desk group", "isSubgroup": true, "deviceIDArray": [4]},
                {
                    "groupID": 200,
                    "displayName": "Office",
                    "isSubgroup": false,
                    "deviceIDArray": [4, 7],
                    "subgroupIDArray": [100]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn partition_is_exhaustive_and_exclusive() {
        let subscribed = subscribed();
        let home = build_home(&subscribed[0], property(), &subscribed);

        assert_eq!(home.home_id, HOME_ID);
        assert_eq!(home.name, "House");

        let ids: Vec<u32> = home.flattened_devices().map(|d| d.device_id).collect();
        let unique: HashSet<u32> = ids.iter().copied().collect();
        assert_eq!(unique, HashSet::from([1234, 2345, 3456, 4567]));
        assert_eq!(ids.len(), unique.len());

        // Subgroups claim their devices before the room does.
        let office = &home.rooms[0];
        assert_eq!(office.name, "Office");
        assert_eq!(office.groups[0].devices[0].device_id, 1234);
        assert_eq!(office.devices[0].device_id, 2345);

        // Devices in no room or subgroup are home-global.
        let global: HashSet<u32> = home.global_devices.iter().map(|d| d.device_id).collect();
        assert_eq!(global, HashSet::from([3456, 4567]));
    }

    #[test]
    fn devices_join_cloud_and_mesh_fields() {
        let subscribed = subscribed();
        let home = build_home(&subscribed[0], property(), &subscribed);

        let porch = home.device(4567).unwrap();
        assert_eq!(porch.mesh_device_id, 232);
        assert_eq!(porch.mesh_reference_id, 232);
        assert_eq!(porch.name, "Porch");
        assert_eq!(porch.mac, "m4");
        assert_eq!(porch.device_type, 137);
        assert!(porch.is_online);
        assert!(!porch.wifi_connected);
    }

    #[test]
    fn orphan_subgroups_dissolve_into_global_devices() {
        let subscribed = subscribed();
        let property: RawHomeProperty = serde_json::from_value(serde_json::json!({
            "bulbsArray": [
                {"deviceID": 4, "switchID": 1234, "displayName": "Desk", "deviceType": 137}
            ],
            "groupsArray": [
                {"groupID": 100, "displayName": "Lost", "isSubgroup": true, "deviceIDArray": [4]}
            ]
        }))
        .unwrap();

        let home = build_home(&subscribed[0], property, &subscribed);
        assert!(home.rooms.is_empty());
        assert_eq!(home.global_devices.len(), 1);
        assert_eq!(home.global_devices[0].device_id, 1234);
    }
}
