pub mod account;
pub mod capabilities;

pub use account::AccountSummary;
pub use capabilities::{resolve, Capability, CapabilitySet};
