//! High-level command client.
//!
//! [`Cync`] is the user-facing entry point: it ingests the account topology,
//! owns the protocol session, and turns intents like "turn on light X" into
//! pipe frames routed through the right hub. Write operations are fire and
//! forget: they return once the frame is queued, and the eventual inbound
//! sync or status page is the source of truth for device state.

use std::sync::Arc;

use tokio::time::{Duration, sleep};

use cync_proto::Capability;
use cync_proto::builder;

use crate::auth::UserCredentials;
use crate::config::SessionConfig;
use crate::discovery::CloudApi;
use crate::error::{CyncError, CyncResult};
use crate::model::{Controllable, Device, Home};
use crate::session::{Session, SessionState};
use crate::topology::{DeviceUpdateCallback, TopologyStore};

/// How often the hub gate re-checks whether the probe burst has landed.
const PROBE_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct Cync {
    credentials: UserCredentials,
    store: Arc<TopologyStore>,
    api: CloudApi,
    session: Session,
}

impl Cync {
    /// Ingests the account's topology and opens the cloud session.
    pub async fn connect(credentials: UserCredentials) -> CyncResult<Self> {
        Self::connect_with_config(credentials, SessionConfig::default()).await
    }

    pub async fn connect_with_config(
        credentials: UserCredentials,
        config: SessionConfig,
    ) -> CyncResult<Self> {
        let api = CloudApi::new()?;
        let store = Arc::new(TopologyStore::new());

        let homes = api.discover_homes(&credentials).await?;
        store.set_user_homes(credentials.user_id, homes);

        let session = Session::spawn(credentials.clone(), store.clone(), config);

        Ok(Self {
            credentials,
            store,
            api,
            session,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> u32 {
        self.credentials.user_id
    }

    /// Snapshot of the current topology.
    #[must_use]
    pub fn homes(&self) -> Vec<Home> {
        self.store.user_homes(self.user_id())
    }

    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Registers a callback invoked (on the session loop) for every inbound
    /// device state change.
    pub fn set_update_callback(&self, callback: DeviceUpdateCallback) {
        self.store.set_update_callback(self.user_id(), callback);
    }

    /// Re-ingests discovery and replaces the stored topology.
    pub async fn refresh_home_info(&self) -> CyncResult<Vec<Home>> {
        let homes = self.api.discover_homes(&self.credentials).await?;
        self.store.set_user_homes(self.user_id(), homes.clone());
        Ok(homes)
    }

    /// Asks each home's hub for a full status-page refresh. Results arrive
    /// through the update callback.
    pub async fn update_mesh_devices(&self) -> CyncResult<()> {
        for home in self.homes() {
            let hub = self.fetch_hub_device(home.home_id).await?;
            self.session.post(builder::state_query_request(hub.device_id))?;
        }
        Ok(())
    }

    pub async fn set_power(&self, target: &Controllable, is_on: bool) -> CyncResult<()> {
        require_capability(target, Capability::OnOff)?;

        let hub = self.fetch_hub_device(target.home_id()).await?;
        self.session.post(builder::set_power_request(
            hub.device_id,
            target.mesh_reference_id(),
            is_on,
        ))
    }

    /// Brightness is a percentage, 0..=100.
    pub async fn set_brightness(&self, target: &Controllable, brightness: u8) -> CyncResult<()> {
        if brightness > 100 {
            return Err(CyncError::InvalidArgument(format!(
                "brightness must be between 0 and 100 inclusive, got {brightness}"
            )));
        }
        require_capability(target, Capability::Dimming)?;

        let hub = self.fetch_hub_device(target.home_id()).await?;
        self.session.post(builder::set_brightness_request(
            hub.device_id,
            target.mesh_reference_id(),
            brightness,
        ))
    }

    /// Color temperature on a 1..=100 scale, 1 being the most blue and 100
    /// the most orange.
    pub async fn set_color_temp(&self, target: &Controllable, color_temp: u8) -> CyncResult<()> {
        if !(1..=100).contains(&color_temp) {
            return Err(CyncError::InvalidArgument(format!(
                "color temperature must be between 1 and 100 inclusive, got {color_temp}"
            )));
        }
        require_capability(target, Capability::CctColor)?;

        let hub = self.fetch_hub_device(target.home_id()).await?;
        self.session.post(builder::set_color_temp_request(
            hub.device_id,
            target.mesh_reference_id(),
            color_temp,
        ))
    }

    pub async fn set_rgb(&self, target: &Controllable, rgb: (u8, u8, u8)) -> CyncResult<()> {
        require_capability(target, Capability::RgbColor)?;

        let hub = self.fetch_hub_device(target.home_id()).await?;
        self.session.post(builder::set_rgb_request(
            hub.device_id,
            target.mesh_reference_id(),
            rgb,
        ))
    }

    /// Sends a Disconnect to the server and stops the session task.
    pub fn shut_down(&self) {
        self.session.shut_down();
    }

    /// Resolves a hub for `home_id`, waiting until the post-login probe
    /// burst has reported at least one device so the lookup cannot race it.
    async fn fetch_hub_device(&self, home_id: u32) -> CyncResult<Device> {
        while !self.session.statuses_updated() {
            if self.session.is_closing() {
                return Err(CyncError::ShuttingDown);
            }
            log::debug!("awaiting probe results before resolving hub");
            sleep(PROBE_POLL_INTERVAL).await;
        }
        self.store.hub_device(self.user_id(), home_id)
    }
}

fn require_capability(target: &Controllable, capability: Capability) -> CyncResult<()> {
    if target.supports(capability) {
        return Ok(());
    }
    Err(CyncError::UnsupportedCapability(capability))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Group;

    fn dimmer_group() -> Controllable {
        let device = Device {
            device_id: 1,
            mesh_device_id: 11,
            mesh_reference_id: Device::mesh_reference(11, 5432),
            home_id: 5432,
            name: "Dimmer".into(),
            device_type: 114,
            mac: String::new(),
            product_id: String::new(),
            authorize_code: String::new(),
            capabilities: Device::capabilities_for_type(114),
            is_online: true,
            wifi_connected: true,
            state: None,
        };
        Controllable::Group(Group::new(100, 5432, "Hall".into(), vec![device]))
    }

    #[test]
    fn capability_checks_fail_before_io() {
        let target = dimmer_group();
        assert!(require_capability(&target, Capability::OnOff).is_ok());
        assert!(require_capability(&target, Capability::Dimming).is_ok());
        assert!(matches!(
            require_capability(&target, Capability::RgbColor),
            Err(CyncError::UnsupportedCapability(Capability::RgbColor))
        ));
    }
}
