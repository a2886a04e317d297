pub mod config;
pub mod conn;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod state;

pub use config::{Cli, Config, ReadErrorPolicy};
pub use error::RelayError;
pub use protocol::Payload;
pub use server::{Relay, Server};
