//! Protocol constants shared by the builders and parsers.

/// Protocol version emitted in every outer frame header.
pub const PROTOCOL_VERSION: u8 = 3;

/// Outer frame message types (high nibble of the header info byte).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Login = 1,
    Handshake = 2,
    Sync = 4,
    Pipe = 7,
    PipeSync = 8,
    Probe = 10,
    Ping = 13,
    Disconnect = 14,
}

impl MessageType {
    #[must_use]
    pub const fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::Login),
            2 => Some(Self::Handshake),
            4 => Some(Self::Sync),
            7 => Some(Self::Pipe),
            8 => Some(Self::PipeSync),
            10 => Some(Self::Probe),
            13 => Some(Self::Ping),
            14 => Some(Self::Disconnect),
            _ => None,
        }
    }
}

/// Command codes carried by inner pipe frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PipeCommand {
    QueryDeviceStatusPages = 0x52,
    SetPower = 0xD0,
    SetBrightness = 0xD2,
    DeviceStatus = 0xDB,
    SetColor = 0xE2,
    ComboControl = 0xF0,
}

impl PipeCommand {
    #[must_use]
    pub const fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            0x52 => Some(Self::QueryDeviceStatusPages),
            0xD0 => Some(Self::SetPower),
            0xD2 => Some(Self::SetBrightness),
            0xDB => Some(Self::DeviceStatus),
            0xE2 => Some(Self::SetColor),
            0xF0 => Some(Self::ComboControl),
            _ => None,
        }
    }

    /// Set-style commands repeat the frame sequence number between the
    /// argument length and the arguments themselves.
    #[must_use]
    pub const fn echoes_sequence(self) -> bool {
        matches!(
            self,
            Self::SetPower | Self::SetBrightness | Self::SetColor | Self::ComboControl
        )
    }
}

/// Direction marker of an inner pipe frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PipeDirection {
    Request = 0xF8,
    Response = 0xF9,
    Announce = 0xFA,
}
