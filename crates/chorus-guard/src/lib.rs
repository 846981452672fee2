//! Admission guards applied before an identity answers a message:
//! the bot-to-bot loop guard and the destination eligibility gate.

pub mod eligibility;
pub mod loop_guard;

pub use eligibility::{can_respond, check, Eligibility};
pub use loop_guard::{ChainState, ChainTracker};
