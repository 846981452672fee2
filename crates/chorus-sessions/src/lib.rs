pub mod counter;
pub mod types;

pub use counter::DmSessionCounter;
pub use types::{DmKey, DmSession};
