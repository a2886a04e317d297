use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::config::ReadErrorPolicy;
use crate::protocol::READ_BUF;
use crate::state::ConnId;

/// What a connection's reader reports back to the event loop.
#[derive(Debug)]
pub enum Event {
    Data { id: ConnId, bytes: Vec<u8> },
    Closed { id: ConnId },
    ReadFailed { id: ConnId, error: io::Error },
}

/// Payloads a connection may have waiting before new ones are dropped.
pub const OUTBOX_DEPTH: usize = 64;

/// Best-effort, fire-and-forget delivery of one relayed payload. Returns
/// false if the payload was dropped.
pub trait Deliver {
    fn deliver(&mut self, payload: &[u8]) -> bool;
}

/// Sending side of a connection. Payloads are queued to a writer task so the
/// event loop never waits on a slow peer; dropping the outbox closes the
/// socket's write half once the queue drains.
pub struct Outbox {
    id: ConnId,
    tx: mpsc::Sender<Vec<u8>>,
}

impl Deliver for Outbox {
    fn deliver(&mut self, payload: &[u8]) -> bool {
        match self.tx.try_send(payload.to_vec()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!(conn = %self.id, "outbox full, payload dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                trace!(conn = %self.id, "writer gone, payload dropped");
                false
            }
        }
    }
}

pub fn spawn_writer(id: ConnId, mut writer: OwnedWriteHalf) -> Outbox {
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(OUTBOX_DEPTH);

    tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if let Err(e) = writer.write_all(&bytes).await {
                trace!(conn = %id, error = %e, "write failed");
                break;
            }
        }
    });

    Outbox { id, tx }
}

/// Reads one chunk at a time and forwards it to the loop until EOF or until
/// the loop goes away.
pub async fn read_loop(
    id: ConnId,
    mut reader: OwnedReadHalf,
    events: mpsc::Sender<Event>,
    policy: ReadErrorPolicy,
) {
    let mut buf = [0u8; READ_BUF];

    loop {
        let event = match reader.read(&mut buf).await {
            Ok(0) => {
                let _ = events.send(Event::Closed { id }).await;
                return;
            }
            Ok(n) => Event::Data {
                id,
                bytes: buf[..n].to_vec(),
            },
            Err(error) => {
                let stop = policy == ReadErrorPolicy::Close;
                if events.send(Event::ReadFailed { id, error }).await.is_err() || stop {
                    return;
                }
                continue;
            }
        };

        if events.send(event).await.is_err() {
            return;
        }
    }
}
