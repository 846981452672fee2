//! Discord transport: one serenity client per configured identity.

pub mod connector;
pub mod error;
pub mod handler;
pub mod send;
pub mod transport;

pub use connector::DiscordConnector;
pub use error::DiscordError;
pub use transport::DiscordTransport;
