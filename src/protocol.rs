//! Wire format: one read is one message, `<clientId>:<message>`.

/// Size of the buffer a single read fills.
pub const READ_BUF: usize = 1024;

/// What peers receive when a message is relayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Payload {
    /// Only the text before the first colon, as the original relay sent it.
    #[default]
    ClientId,
    /// The whole `clientId:message` text.
    Full,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Message<'a> {
    /// Everything up to the terminator, colon included.
    pub raw: &'a [u8],
    pub client_id: &'a [u8],
    pub body: &'a [u8],
}

impl<'a> Message<'a> {
    pub fn payload(&self, mode: Payload) -> &'a [u8] {
        match mode {
            Payload::ClientId => self.client_id,
            Payload::Full => self.raw,
        }
    }
}

/// Parses one read. The text ends at the first NUL byte, if any; `None`
/// means there was no colon and the message is dropped.
pub fn parse_message(buf: &[u8]) -> Option<Message<'_>> {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let raw = &buf[..end];

    let colon = raw.iter().position(|&b| b == b':')?;

    Some(Message {
        raw,
        client_id: &raw[..colon],
        body: &raw[colon + 1..],
    })
}
