pub mod channel;
pub mod error;
pub mod manager;
pub mod state;
pub mod types;

pub use channel::{Connector, EventSink, Transport};
pub use error::ChannelError;
pub use manager::IdentityManager;
pub use state::RuntimeState;
pub use types::{Author, IdentityStatus, IncomingMessage, SelfInfo};
