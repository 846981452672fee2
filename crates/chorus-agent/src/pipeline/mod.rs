//! Message pipeline shared by every identity.
//!
//! `Router::handle` runs one incoming message through the loop guard, the
//! eligibility gate, and the addressed/ambient decision, then produces and
//! delivers a reply. Transports only convert platform events into
//! `IncomingMessage` and call in through `EventSink`.

pub mod direct;
pub mod respond;
pub mod router;

pub use respond::{IgnoreReason, Outcome, ReplyMode, RouteError};
pub use router::{is_addressed, Router};
