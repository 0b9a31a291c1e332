pub mod conversation;
pub mod entitlement;

pub use conversation::*;
pub use entitlement::*;
