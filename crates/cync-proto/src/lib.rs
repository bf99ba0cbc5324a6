//! Wire protocol for the Cync cloud gateway.
//!
//! The cloud speaks a bespoke binary protocol over a long-lived TLS session:
//! big-endian outer frames wrapping little-endian, byte-stuffed,
//! checksum-protected inner "pipe" frames that the Wi-Fi hub relays onto the
//! home's Bluetooth mesh. This crate owns the framing, the packet builders
//! and parsers, the shared wire counters, and the device-type lookup tables.
//! It does not touch the network; the session layer in the `cync` crate
//! feeds it bytes and writes out what it builds.

pub mod builder;
pub mod capability;
pub mod error;
pub mod frame;
pub mod parser;
pub mod pipe;
pub mod seq;
pub mod wire;

pub use capability::{Capability, CapabilitySet, DeviceClass};
pub use error::{ProtoError, ProtoResult};
pub use frame::{FrameAssembler, FrameHeader};
pub use parser::{DeviceStatus, InboundMessage, MeshEndpoint};
pub use wire::{MessageType, PipeCommand, PipeDirection, PROTOCOL_VERSION};
