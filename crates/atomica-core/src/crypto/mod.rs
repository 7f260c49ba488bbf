pub mod hash;
pub mod pairing;

pub use hash::*;
pub use pairing::*;
