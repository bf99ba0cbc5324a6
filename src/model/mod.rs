mod controllable;
mod device;
mod home;

pub use controllable::Controllable;
pub use device::{Device, LightState};
pub use home::{Group, Home, Room};
