use thiserror::Error;

/// Wire-level encoding/decoding errors.
///
/// All of these are fatal to the frame being decoded, but none of them are
/// fatal to the session: the read loop logs the error and skips the frame.
#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("packet length did not match actual packet length: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("invalid checksum for inner pipe frame: expected {expected:#04x}, got {actual:#04x}")]
    BadChecksum { expected: u8, actual: u8 },

    #[error("invalid delimiters for inner pipe frame")]
    InvalidDelimiter,

    /// The frame is well-formed but carries a message or payload shape this
    /// client does not interpret.
    #[error("unsupported frame: {0}")]
    NotImplemented(&'static str),

    #[error("device id {0} not present in topology")]
    DeviceNotFound(u32),
}

pub type ProtoResult<T> = Result<T, ProtoError>;
