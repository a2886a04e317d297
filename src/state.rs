use std::fmt;
use std::net::SocketAddr;

/// Longest display name kept for a connection, in bytes.
pub const NAME_CAP: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct Connection<W> {
    pub id: ConnId,
    pub peer: SocketAddr,
    name: Vec<u8>,
    writer: W,
}

impl<W> Connection<W> {
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

/// Bounded, insertion-ordered set of live connections.
///
/// Removal shifts later entries down, so survivors keep their relative order.
pub struct ConnectionTable<W> {
    conns: Vec<Connection<W>>,
    capacity: usize,
}

impl<W> ConnectionTable<W> {
    pub fn new(capacity: usize) -> Self {
        Self {
            conns: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_full(&self) -> bool {
        self.conns.len() >= self.capacity
    }

    pub fn contains(&self, id: ConnId) -> bool {
        self.position(id).is_some()
    }

    /// Registers a new connection with an empty name.
    ///
    /// When the table is full the writer is handed back untouched; the caller
    /// owns closing it.
    pub fn try_add(&mut self, id: ConnId, peer: SocketAddr, writer: W) -> Result<(), W> {
        if self.is_full() || self.contains(id) {
            return Err(writer);
        }

        self.conns.push(Connection {
            id,
            peer,
            name: Vec::new(),
            writer,
        });

        Ok(())
    }

    pub fn remove(&mut self, id: ConnId) -> Option<Connection<W>> {
        let pos = self.position(id)?;
        Some(self.conns.remove(pos))
    }

    /// Stores `name` as the display name of `id`, cut to [`NAME_CAP`] bytes.
    /// Returns false if `id` is not registered.
    pub fn update_name(&mut self, id: ConnId, name: &[u8]) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };

        let keep = name.len().min(NAME_CAP);
        let conn = &mut self.conns[pos];
        conn.name.clear();
        conn.name.extend_from_slice(&name[..keep]);

        true
    }

    pub fn get(&self, id: ConnId) -> Option<&Connection<W>> {
        self.conns.iter().find(|c| c.id == id)
    }

    pub fn for_each_other<F>(&mut self, exclude: ConnId, mut f: F)
    where
        F: FnMut(ConnId, &mut W),
    {
        for conn in self.conns.iter_mut().filter(|c| c.id != exclude) {
            f(conn.id, &mut conn.writer);
        }
    }

    #[cfg(test)]
    pub(crate) fn ids(&self) -> Vec<ConnId> {
        self.conns.iter().map(|c| c.id).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.conns.iter().map(Connection::name_lossy).collect()
    }

    fn position(&self, id: ConnId) -> Option<usize> {
        self.conns.iter().position(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    fn table_with(n: u64, cap: usize) -> ConnectionTable<Vec<u8>> {
        let mut table = ConnectionTable::new(cap);
        for i in 0..n {
            table.try_add(ConnId(i), peer(), Vec::new()).unwrap();
        }
        table
    }

    #[test]
    fn add_until_full_then_reject() {
        let mut table = table_with(10, 10);
        assert!(table.is_full());

        let back = table.try_add(ConnId(99), peer(), b"w".to_vec());
        assert_eq!(back, Err(b"w".to_vec()));
        assert_eq!(table.len(), 10);
        assert!(!table.contains(ConnId(99)));
    }

    #[test]
    fn duplicate_handle_is_rejected() {
        let mut table = table_with(1, 10);
        assert!(table.try_add(ConnId(0), peer(), Vec::new()).is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn new_connection_has_empty_name() {
        let table = table_with(1, 10);
        assert!(table.get(ConnId(0)).unwrap().name().is_empty());
    }

    #[test]
    fn remove_keeps_relative_order() {
        let mut table = table_with(5, 10);

        let gone = table.remove(ConnId(2)).unwrap();
        assert_eq!(gone.id, ConnId(2));
        assert_eq!(table.ids(), vec![ConnId(0), ConnId(1), ConnId(3), ConnId(4)]);

        assert!(table.remove(ConnId(2)).is_none());
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn remove_frees_a_slot() {
        let mut table = table_with(2, 2);
        table.remove(ConnId(0));
        assert!(table.try_add(ConnId(7), peer(), Vec::new()).is_ok());
        assert_eq!(table.ids(), vec![ConnId(1), ConnId(7)]);
    }

    #[test]
    fn update_name_truncates() {
        let mut table = table_with(1, 10);
        let long = vec![b'n'; 400];

        assert!(table.update_name(ConnId(0), &long));
        assert_eq!(table.get(ConnId(0)).unwrap().name().len(), NAME_CAP);

        assert!(table.update_name(ConnId(0), b"bob"));
        assert_eq!(table.names(), vec!["bob".to_string()]);

        assert!(!table.update_name(ConnId(5), b"ghost"));
    }

    #[test]
    fn for_each_other_skips_excluded() {
        let mut table = table_with(3, 10);
        let mut seen = Vec::new();

        table.for_each_other(ConnId(1), |id, w| {
            w.extend_from_slice(b"x");
            seen.push(id);
        });

        assert_eq!(seen, vec![ConnId(0), ConnId(2)]);
        assert!(table.remove(ConnId(1)).unwrap().into_writer().is_empty());
    }
}
