pub mod light_client;
pub mod signature;
pub mod waypoint;

pub use light_client::*;
pub use signature::*;
pub use waypoint::*;
