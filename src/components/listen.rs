//! Listener Registry Component
//!
//! Fixed table of the ports currently listened on. `listen` and `unlisten`
//! run in normal context; `find_listener` and `accept_connection` run on the
//! packet dispatch path. Both sides go through the same [`NetLock`], held for
//! short, non-blocking work only.

use crate::config::CONFIG_NET_MAX_LISTENPORTS;
use crate::conn::{AcceptFn, ConnId, ConnTable, TcpConn};
use crate::device::DevId;
use crate::error::{NetError, NetResult};
use crate::events::{EventNotifier, TcpEvents};
use crate::lock::{IrqControl, NetLock, NoIrq};

/// One occupied listener slot
///
/// The port is captured at `listen` time. A bound port does not change while
/// the connection listens.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Listener {
    pub conn: ConnId,
    pub port: u16,
}

/// How an inbound connection was taken by its listener
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,   // The listener's accept handler took it
    Queued,     // Parked on the listener's backlog
}

/// Listener table with `N` slots
///
/// Slots hold non-owning handles. A listener must be removed with
/// [`unlisten`](Self::unlisten) before its connection record is freed.
pub struct ListenerRegistry<I: IrqControl = NoIrq, const N: usize = { CONFIG_NET_MAX_LISTENPORTS }> {
    slots: NetLock<[Option<Listener>; N], I>,
}

impl<I: IrqControl, const N: usize> ListenerRegistry<I, N> {
    pub const fn new() -> Self {
        Self {
            slots: NetLock::new([None; N]),
        }
    }

    /// Clear every slot. Used while the stack is brought up.
    pub fn reset(&self) {
        self.slots.with(|slots| slots.fill(None));
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.with(|slots| slots.iter().flatten().count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the table, for diagnostics
    pub fn snapshot(&self) -> [Option<Listener>; N] {
        *self.slots.lock()
    }

    fn lookup(slots: &[Option<Listener>; N], port: u16) -> Option<ConnId> {
        slots
            .iter()
            .flatten()
            .find(|l| l.port == port)
            .map(|l| l.conn)
    }

    /// Listener for connections on `port`, if any
    ///
    /// Callable from the dispatch path.
    pub fn find_listener(&self, port: u16) -> Option<ConnId> {
        let slots = self.slots.lock();
        Self::lookup(&slots, port)
    }

    pub fn is_listening(&self, port: u16) -> bool {
        self.find_listener(port).is_some()
    }

    /// Start listening on `port` with `conn`
    ///
    /// The duplicate check and the insertion happen in one critical section,
    /// so two callers can never both claim a free port.
    pub fn listen(&self, conn: ConnId, port: u16) -> NetResult<()> {
        let mut slots = self.slots.lock();

        if Self::lookup(&slots, port).is_some() {
            log::debug!("tcp_listen: port {} already in use", port);
            return Err(NetError::AddressInUse);
        }

        let slot = slots.iter_mut().find(|s| s.is_none()).ok_or_else(|| {
            log::warn!("tcp_listen: no free slot for port {} ({} in use)", port, N);
            NetError::NoBuffers
        })?;

        *slot = Some(Listener { conn, port });
        log::debug!("tcp_listen: {:?} listening on port {}", conn, port);
        Ok(())
    }

    /// Stop listening with `conn`
    ///
    /// Matches on the handle, not the port.
    pub fn unlisten(&self, conn: ConnId) -> NetResult<()> {
        let mut slots = self.slots.lock();

        let slot = slots
            .iter_mut()
            .find(|s| matches!(s, Some(l) if l.conn == conn))
            .ok_or(NetError::NotFound)?;

        if let Some(l) = slot.take() {
            log::debug!("tcp_unlisten: {:?} released port {}", conn, l.port);
        }
        Ok(())
    }

    /// Hand a freshly created connection to the listener of `port`
    ///
    /// Runs on the dispatch path. A listener with an accept handler gets the
    /// connection synchronously and its verdict is returned. Otherwise the
    /// connection is queued on the listener's backlog and `notifier` receives
    /// `BACKLOG` for the listener. No listener, no backlog or a full backlog
    /// yields `Rejected`.
    ///
    /// The registry stays locked until the connection table is locked, so
    /// the listener cannot be unlistened and its slot reused between lookup
    /// and hand-off. Locks nest registry first, then connections. Both are
    /// released before the handler or the notifier runs.
    pub fn accept_connection<E: EventNotifier + ?Sized>(
        &self,
        dev: DevId,
        conns: &NetLock<ConnTable, I>,
        new_conn: ConnId,
        port: u16,
        notifier: &mut E,
    ) -> NetResult<AcceptOutcome> {
        let handoff = {
            let slots = self.slots.lock();
            let listener = Self::lookup(&slots, port).ok_or_else(|| {
                log::trace!("tcp_accept_connection: no listener on port {}", port);
                NetError::Rejected
            })?;

            let mut table = conns.lock();
            // The record may have been freed without unlisten; treat as absent.
            let record = table.get_mut(listener).ok_or(NetError::Rejected)?;

            match record.accept {
                Some(accept) => Handoff::Handler(listener, accept),
                None => {
                    queue_backlog(record, new_conn)?;
                    Handoff::Queued(listener)
                }
            }
        };

        match handoff {
            Handoff::Handler(listener, accept) => {
                accept(listener, new_conn)?;
                Ok(AcceptOutcome::Accepted)
            }
            Handoff::Queued(listener) => {
                // Wake anyone blocked in accept()/poll() on the listener
                notifier.notify(dev, listener, TcpEvents::BACKLOG);
                Ok(AcceptOutcome::Queued)
            }
        }
    }
}

impl<I: IrqControl, const N: usize> Default for ListenerRegistry<I, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// What to do with a new connection once the locks are dropped
enum Handoff {
    Handler(ConnId, AcceptFn),
    Queued(ConnId),
}

#[cfg(feature = "backlog")]
fn queue_backlog(listener: &mut TcpConn, new_conn: ConnId) -> NetResult<()> {
    match listener.backlog.as_mut() {
        Some(backlog) => backlog.add(new_conn),
        None => Err(NetError::Rejected),
    }
}

#[cfg(not(feature = "backlog"))]
fn queue_backlog(_listener: &mut TcpConn, _new_conn: ConnId) -> NetResult<()> {
    Err(NetError::Rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    type Registry = ListenerRegistry<NoIrq, 3>;

    #[test]
    fn test_listen_find_unlisten() {
        let reg = Registry::new();
        reg.listen(ConnId(1), 80).unwrap();
        assert_eq!(reg.find_listener(80), Some(ConnId(1)));
        assert!(reg.is_listening(80));
        assert!(!reg.is_listening(81));

        reg.unlisten(ConnId(1)).unwrap();
        assert_eq!(reg.find_listener(80), None);
        assert_eq!(reg.unlisten(ConnId(1)), Err(NetError::NotFound));
    }

    #[test]
    fn test_reuses_first_free_slot() {
        let reg = Registry::new();
        reg.listen(ConnId(1), 80).unwrap();
        reg.listen(ConnId(2), 81).unwrap();
        reg.unlisten(ConnId(1)).unwrap();
        reg.listen(ConnId(3), 82).unwrap();

        let snap = reg.snapshot();
        assert_eq!(snap[0], Some(Listener { conn: ConnId(3), port: 82 }));
        assert_eq!(snap[1], Some(Listener { conn: ConnId(2), port: 81 }));
        assert_eq!(snap[2], None);
    }

    #[test]
    fn test_reset_clears_all() {
        let reg = Registry::new();
        reg.listen(ConnId(1), 80).unwrap();
        reg.listen(ConnId(2), 81).unwrap();
        reg.reset();
        assert!(reg.is_empty());
        assert_eq!(reg.capacity(), 3);
    }
}
