use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::config::{Config, ReadErrorPolicy};
use crate::conn::{self, Deliver, Event, Outbox};
use crate::error::{RelayError, Result};
use crate::protocol::{Payload, parse_message};
use crate::state::{ConnId, ConnectionTable};

const EVENT_QUEUE: usize = 256;

/// Connection bookkeeping and message relaying, independent of sockets.
pub struct Relay<W> {
    table: ConnectionTable<W>,
    payload: Payload,
    read_errors: ReadErrorPolicy,
}

impl<W: Deliver> Relay<W> {
    pub fn new(config: &Config) -> Self {
        Self {
            table: ConnectionTable::new(config.max_clients),
            payload: config.payload,
            read_errors: config.read_errors,
        }
    }

    pub fn table(&self) -> &ConnectionTable<W> {
        &self.table
    }

    /// Registers a freshly accepted connection. A full table hands the writer
    /// back so the caller can close the socket.
    pub fn admit(&mut self, id: ConnId, peer: SocketAddr, writer: W) -> std::result::Result<(), W> {
        match self.table.try_add(id, peer, writer) {
            Ok(()) => {
                info!(conn = %id, %peer, clients = self.table.len(), "client joined");
                self.dump_clients();
                Ok(())
            }
            Err(writer) => {
                warn!(conn = %id, %peer, "too many clients, closing connection");
                Err(writer)
            }
        }
    }

    /// Applies one reader event. Returns the writer of a connection that left
    /// the table so the caller can release it.
    pub fn handle(&mut self, event: Event) -> Option<W> {
        match event {
            Event::Data { id, bytes } => {
                self.on_data(id, &bytes);
                None
            }
            Event::Closed { id } => {
                let conn = self.table.remove(id)?;
                info!(conn = %id, name = %conn.name_lossy(), "disconnected");
                self.dump_clients();
                Some(conn.into_writer())
            }
            Event::ReadFailed { id, error } => {
                warn!(conn = %id, %error, "read failed");
                if self.read_errors == ReadErrorPolicy::Close {
                    let conn = self.table.remove(id)?;
                    self.dump_clients();
                    return Some(conn.into_writer());
                }
                None
            }
        }
    }

    fn on_data(&mut self, id: ConnId, bytes: &[u8]) {
        if !self.table.contains(id) {
            trace!(conn = %id, "data for unknown connection");
            return;
        }

        let Some(msg) = parse_message(bytes) else {
            let name = self.table.get(id).map(|c| c.name_lossy()).unwrap_or_default();
            debug!(conn = %id, %name, "invalid message syntax");
            return;
        };

        self.table.update_name(id, msg.body);

        let client_id = String::from_utf8_lossy(msg.client_id);
        let name = self.table.get(id).map(|c| c.name_lossy()).unwrap_or_default();
        info!(conn = %id, %client_id, %name, "renamed");

        let payload = msg.payload(self.payload);
        let (mut sent, mut dropped) = (0usize, 0usize);
        self.table.for_each_other(id, |_, w| {
            if w.deliver(payload) {
                sent += 1;
            } else {
                dropped += 1;
            }
        });
        debug!(conn = %id, bytes = payload.len(), recipients = sent, dropped, "broadcast");
    }

    fn dump_clients(&self) {
        info!(clients = ?self.table.names(), "current clients");
    }
}

/// A bound listener plus the relay state it feeds.
pub struct Server {
    listener: TcpListener,
    relay: Relay<Outbox>,
    events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
    clients: watch::Sender<usize>,
    poll_interval: Duration,
    read_errors: ReadErrorPolicy,
    next_id: u64,
}

impl Server {
    pub fn bind(config: &Config) -> Result<Self> {
        let addr = config.addr;

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(RelayError::Socket)?;

        socket
            .bind(addr)
            .map_err(|source| RelayError::Bind { addr, source })?;

        let listener = socket
            .listen(config.backlog)
            .map_err(|source| RelayError::Listen { addr, source })?;

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        let (clients, _) = watch::channel(0);

        Ok(Self {
            listener,
            relay: Relay::new(config),
            events_tx,
            events_rx,
            clients,
            poll_interval: config.poll_interval,
            read_errors: config.read_errors,
            next_id: 0,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Live connection count, updated after every change to the table.
    pub fn clients(&self) -> watch::Receiver<usize> {
        self.clients.subscribe()
    }

    /// Runs the event loop. Only returns if the runtime is shutting down.
    pub async fn run(mut self) -> Result<()> {
        info!(addr = %self.local_addr().map_err(RelayError::Socket)?, "listening");

        loop {
            // Pending accepts win over client events; one unit of work per turn.
            tokio::select! {
                biased;

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.accept(stream, peer),
                    Err(e) => warn!(error = %e, "accept failed"),
                },

                Some(event) = self.events_rx.recv() => {
                    // Dropping a released outbox closes that socket.
                    drop(self.relay.handle(event));
                }

                _ = tokio::time::sleep(self.poll_interval) => {
                    trace!("idle");
                    continue;
                }
            }

            self.clients.send_replace(self.relay.table().len());
        }
    }

    fn accept(&mut self, stream: TcpStream, peer: SocketAddr) {
        let id = ConnId(self.next_id);
        self.next_id += 1;

        let (reader, writer) = stream.into_split();
        let outbox = conn::spawn_writer(id, writer);

        // A rejected outbox is dropped along with the read half, closing the socket.
        if self.relay.admit(id, peer, outbox).is_err() {
            return;
        }

        tokio::spawn(conn::read_loop(
            id,
            reader,
            self.events_tx.clone(),
            self.read_errors,
        ));
    }
}
