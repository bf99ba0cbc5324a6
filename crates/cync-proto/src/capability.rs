//! Device-type lookup tables.
//!
//! The vendor app ships a large metadata catalog keyed by the numeric device
//! type reported in discovery. The client only needs the slices of it that
//! gate behavior: the broad device class, and which control capabilities a
//! type supports. Types missing from the table get an empty capability set,
//! which disables both control operations and mesh decoding for them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    OnOff,
    Dimming,
    CctColor,
    RgbColor,
    SigMesh,
}

impl Capability {
    pub const ALL: [Self; 5] = [
        Self::OnOff,
        Self::Dimming,
        Self::CctColor,
        Self::RgbColor,
        Self::SigMesh,
    ];
}

pub type CapabilitySet = BTreeSet<Capability>;

/// The full capability universe, used as the identity element when
/// intersecting member sets.
#[must_use]
pub fn all_capabilities() -> CapabilitySet {
    Capability::ALL.into_iter().collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Light,
    Switch,
    Plug,
    Thermostat,
    Unknown,
}

#[must_use]
pub const fn device_class(device_type: u16) -> DeviceClass {
    match device_type {
        64..=68 => DeviceClass::Plug,
        113..=118 => DeviceClass::Switch,
        128..=148 => DeviceClass::Light,
        224 | 225 => DeviceClass::Thermostat,
        _ => DeviceClass::Unknown,
    }
}

#[must_use]
pub fn capabilities_for(device_type: u16) -> CapabilitySet {
    use Capability::{CctColor, Dimming, OnOff, RgbColor, SigMesh};

    let caps: &[Capability] = match device_type {
        // Smart plugs.
        64..=68 => &[OnOff, SigMesh],
        // In-wall dimmer switches.
        113..=118 => &[OnOff, Dimming, SigMesh],
        // Tunable-white bulbs.
        128..=130 | 135 | 136 => &[OnOff, Dimming, CctColor, SigMesh],
        // Full-color bulbs and strips (direct-connect and single-chip lines).
        131..=133 | 137..=139 | 146..=148 => &[OnOff, Dimming, CctColor, RgbColor, SigMesh],
        // Thermostats report through the probe channel only; no mesh control.
        224 | 225 => &[],
        _ => &[],
    };
    caps.iter().copied().collect()
}

#[must_use]
pub fn is_mesh_device(device_type: u16) -> bool {
    capabilities_for(device_type).contains(&Capability::SigMesh)
}
