use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::protocol::Payload;

pub const MAX_CLIENTS: usize = 10;
pub const BACKLOG: u32 = 5;

/// What to do with a connection whose read fails with an error other than EOF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadErrorPolicy {
    /// Log and keep the connection registered.
    #[default]
    Keep,
    /// Close the socket and drop it from the table.
    Close,
}

#[derive(Parser, Debug)]
#[command(name = "chat-relay")]
#[command(about = "Relays colon-delimited chat messages between TCP clients")]
#[command(version)]
pub struct Cli {
    /// TCP port to listen on
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Connections beyond this are closed on accept
    #[arg(long, default_value_t = MAX_CLIENTS)]
    pub max_clients: usize,

    /// Listen backlog
    #[arg(long, default_value_t = BACKLOG)]
    pub backlog: u32,

    /// Upper bound on one wait of the event loop
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// What other clients receive for each message
    #[arg(long, value_enum, default_value_t = Payload::ClientId)]
    pub payload: Payload,

    /// Drop connections on read errors instead of keeping them
    #[arg(long)]
    pub close_on_read_error: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub max_clients: usize,
    pub backlog: u32,
    pub poll_interval: Duration,
    pub payload: Payload,
    pub read_errors: ReadErrorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            max_clients: MAX_CLIENTS,
            backlog: BACKLOG,
            poll_interval: Duration::from_secs(1),
            payload: Payload::ClientId,
            read_errors: ReadErrorPolicy::Keep,
        }
    }
}

impl From<&Cli> for Config {
    fn from(cli: &Cli) -> Self {
        Self {
            addr: SocketAddr::new(cli.bind, cli.port),
            max_clients: cli.max_clients,
            backlog: cli.backlog,
            poll_interval: Duration::from_millis(cli.poll_interval_ms.max(1)),
            payload: cli.payload,
            read_errors: if cli.close_on_read_error {
                ReadErrorPolicy::Close
            } else {
                ReadErrorPolicy::Keep
            },
        }
    }
}
