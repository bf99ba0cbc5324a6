//! Client library for the Cync (GE Lighting) smart lighting ecosystem.
//!
//! Cync devices are organized into Bluetooth-mesh "homes" and are reached
//! indirectly: this client holds a persistent TLS session to the vendor's
//! cloud gateway, which forwards framed commands down to a Wi-Fi connected
//! hub device inside each home; the hub relays them over the local mesh.
//! Asynchronous state updates flow back over the same session.
//!
//! Typical use: authenticate with [`Auth`] to obtain [`UserCredentials`],
//! open a client with [`Cync::connect`] (which discovers the account's
//! homes and starts the background session), then issue commands against any
//! [`Controllable`]: a device, subgroup, room or whole home. Commands are
//! fire and forget; register an update callback to observe the resulting
//! state changes.
//!
//! The wire protocol itself (outer frames, inner pipe frames, builders and
//! parsers) lives in the `cync-proto` crate.

pub mod auth;
pub mod client;
pub mod config;
mod discovery;
pub mod error;
pub mod model;
pub mod session;
pub mod topology;

pub use auth::{Auth, UserCredentials};
pub use client::Cync;
pub use config::SessionConfig;
pub use error::{CyncError, CyncResult};
pub use model::{Controllable, Device, Group, Home, LightState, Room};
pub use session::SessionState;
pub use topology::{DeviceUpdateCallback, TopologyStore};

pub use cync_proto::{Capability, CapabilitySet, DeviceClass, DeviceStatus};
