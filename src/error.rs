use cync_proto::Capability;
use cync_proto::error::ProtoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CyncError {
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("two-factor verification required; a code has been sent to the account email")]
    TwoFactorRequired,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("no logged in user; log in first")]
    MissingAuth,

    #[error("no Wi-Fi connected mesh hub available in home {0}")]
    NoHub(u32),

    #[error("device id {0} not found on this account")]
    DeviceNotFound(u32),

    #[error("target does not support {0:?}")]
    UnsupportedCapability(Capability),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("client shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Proto(#[from] ProtoError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Tls(#[from] native_tls::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

pub type CyncResult<T> = Result<T, CyncError>;
