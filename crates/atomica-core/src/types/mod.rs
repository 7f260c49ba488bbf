pub mod codec;
pub mod events;
pub mod ledger;
pub mod validator;

pub use codec::*;
pub use events::*;
pub use ledger::*;
pub use validator::*;
