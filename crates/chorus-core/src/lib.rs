pub mod config;
pub mod error;
pub mod types;

pub use config::{ChorusConfig, IdentityConfig};
pub use error::{ChorusError, Result};
pub use types::{Capability, CapabilitySet, Destination, HistoryRecord, IdentityId, Requirement};
