pub mod frame;
pub mod hazard;

pub use frame::Frame;
pub use hazard::{Hazard, HazardCategory};
