//! TCP Stack Context
//!
//! Owns everything the listen and flow control paths share: the listener
//! table, the connection arena, the registered devices and the IOB pool view.
//! One instance is created at start-up and handed to both the normal-context
//! API and the packet dispatch path.

use crate::components::{self, AcceptOutcome, ListenerRegistry, WindowDecision};
use crate::config::CONFIG_NET_MAX_LISTENPORTS;
#[cfg(feature = "backlog")]
use crate::config::CONFIG_NET_TCP_NBACKLOG;
use crate::conn::{AcceptFn, ConnId, ConnTable, TcpConn};
use crate::device::{DevId, NetDevice};
use crate::error::{NetError, NetResult};
use crate::events::EventNotifier;
use crate::iob::IobPool;
use crate::lock::{IrqControl, NetLock, NoIrq};

#[cfg(feature = "backlog")]
use crate::components::Backlog;

pub struct TcpStack<P, D, I = NoIrq, const N: usize = { CONFIG_NET_MAX_LISTENPORTS }>
where
    P: IobPool,
    D: NetDevice,
    I: IrqControl,
{
    listeners: ListenerRegistry<I, N>,
    conns: NetLock<ConnTable, I>,
    devices: Vec<D>,
    pool: P,
}

impl<P, D, I, const N: usize> TcpStack<P, D, I, N>
where
    P: IobPool,
    D: NetDevice,
    I: IrqControl,
{
    /// Bring up the stack with room for `max_conns` connection records
    pub fn new(pool: P, max_conns: usize) -> Self {
        let listeners = ListenerRegistry::new();
        listeners.reset();
        log::debug!("tcp_init: {} listener slots, {} connections", N, max_conns);

        Self {
            listeners,
            conns: NetLock::new(ConnTable::new(max_conns)),
            devices: Vec::new(),
            pool,
        }
    }

    // ------------------------------------------------------------------------
    // Devices and connections
    // ------------------------------------------------------------------------

    pub fn add_device(&mut self, dev: D) -> NetResult<DevId> {
        let id = u8::try_from(self.devices.len()).map_err(|_| NetError::NoBuffers)?;
        self.devices.push(dev);
        Ok(DevId(id))
    }

    pub fn device(&self, id: DevId) -> Option<&D> {
        self.devices.get(id.0 as usize)
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn listeners(&self) -> &ListenerRegistry<I, N> {
        &self.listeners
    }

    pub fn conns(&self) -> &NetLock<ConnTable, I> {
        &self.conns
    }

    pub fn alloc_conn(&self, conn: TcpConn) -> NetResult<ConnId> {
        self.conns.with(|table| table.alloc(conn))
    }

    /// Release a connection record
    ///
    /// Drops its listener slot and any backlog entry first so no handle to
    /// the freed slot survives in this stack. Connections still pending on
    /// the record's own backlog are released along with it.
    pub fn free_conn(&self, id: ConnId) -> NetResult<TcpConn> {
        // Not listening is fine here
        let _ = self.listeners.unlisten(id);

        self.conns.with(|table| {
            #[allow(unused_mut)]
            let mut conn = table.free(id)?;

            #[cfg(feature = "backlog")]
            {
                for (_, other) in table.iter_mut() {
                    if let Some(backlog) = other.backlog.as_mut() {
                        backlog.remove(id);
                    }
                }

                if let Some(mut backlog) = conn.backlog.take() {
                    while let Some(pending) = backlog.take() {
                        if table.free(pending).is_ok() {
                            log::debug!("tcp_free: {:?} dropped pending {:?}", id, pending);
                        }
                    }
                }
            }

            Ok(conn)
        })
    }

    /// Install or clear the accept handler of `conn`
    pub fn set_accept(&self, conn: ConnId, accept: Option<AcceptFn>) -> NetResult<()> {
        self.conns.with(|table| {
            let conn = table.get_mut(conn).ok_or(NetError::Invalid)?;
            conn.accept = accept;
            Ok(())
        })
    }

    // ------------------------------------------------------------------------
    // Listener registry
    // ------------------------------------------------------------------------

    /// Listen on the local port `conn` is bound to
    pub fn listen(&self, conn: ConnId) -> NetResult<()> {
        let port = self
            .conns
            .with(|table| table.get(conn).map(|c| c.lport))
            .ok_or(NetError::Invalid)?;
        self.listeners.listen(conn, port)
    }

    pub fn unlisten(&self, conn: ConnId) -> NetResult<()> {
        self.listeners.unlisten(conn)
    }

    pub fn find_listener(&self, port: u16) -> Option<ConnId> {
        self.listeners.find_listener(port)
    }

    pub fn is_listening(&self, port: u16) -> bool {
        self.listeners.is_listening(port)
    }

    /// Dispatch path: hand `new_conn` to the listener of `port`
    pub fn accept_connection<E: EventNotifier + ?Sized>(
        &self,
        dev: DevId,
        new_conn: ConnId,
        port: u16,
        notifier: &mut E,
    ) -> NetResult<AcceptOutcome> {
        self.listeners
            .accept_connection(dev, &self.conns, new_conn, port, notifier)
    }

    // ------------------------------------------------------------------------
    // Backlog
    // ------------------------------------------------------------------------

    /// Give `listener` a backlog of `nblg` entries, replacing any previous one
    ///
    /// Connections pending on a replaced backlog are dropped from it.
    #[cfg(feature = "backlog")]
    pub fn backlog_create(&self, listener: ConnId, nblg: usize) -> NetResult<()> {
        let backlog = Backlog::new(nblg)?;
        self.conns.with(|table| {
            let conn = table.get_mut(listener).ok_or(NetError::Invalid)?;
            conn.backlog = Some(backlog);
            Ok(())
        })
    }

    /// Give `listener` a backlog of the configured default length
    #[cfg(feature = "backlog")]
    pub fn backlog_create_default(&self, listener: ConnId) -> NetResult<()> {
        self.backlog_create(listener, CONFIG_NET_TCP_NBACKLOG)
    }

    /// Remove the backlog of `listener`, returning it with its pending entries
    #[cfg(feature = "backlog")]
    pub fn backlog_destroy(&self, listener: ConnId) -> NetResult<Option<Backlog>> {
        self.conns.with(|table| {
            let conn = table.get_mut(listener).ok_or(NetError::Invalid)?;
            Ok(conn.backlog.take())
        })
    }

    /// Claim the oldest connection pending on `listener`
    #[cfg(feature = "backlog")]
    pub fn backlog_take(&self, listener: ConnId) -> Option<ConnId> {
        self.conns.with(|table| {
            table
                .get_mut(listener)
                .and_then(|c| c.backlog.as_mut())
                .and_then(Backlog::take)
        })
    }

    #[cfg(feature = "backlog")]
    pub fn backlog_available(&self, listener: ConnId) -> bool {
        self.conns.with(|table| {
            table
                .get(listener)
                .and_then(|c| c.backlog.as_ref())
                .map_or(false, Backlog::available)
        })
    }

    // ------------------------------------------------------------------------
    // Receive window
    // ------------------------------------------------------------------------

    pub fn max_recv_window(&self) -> u16 {
        components::max_recv_window(self.pool.config())
    }

    fn with_conn_dev<R>(&self, id: ConnId, f: impl FnOnce(&TcpConn, &D) -> R) -> NetResult<R> {
        self.conns.with(|table| {
            let conn = table.get(id).ok_or(NetError::Invalid)?;
            let dev = self.device(conn.dev).ok_or(NetError::Invalid)?;
            Ok(f(conn, dev))
        })
    }

    /// Receive window to advertise for `conn` now
    pub fn recv_window(&self, conn: ConnId) -> NetResult<u16> {
        self.with_conn_dev(conn, |c, dev| components::recv_window(&self.pool, dev, c))
    }

    pub fn advertise_decision(&self, conn: ConnId) -> NetResult<WindowDecision> {
        self.with_conn_dev(conn, |c, dev| components::advertise_decision(&self.pool, dev, c))
    }

    /// Whether a window update for `conn` is worth a segment
    pub fn should_send_recv_window(&self, conn: ConnId) -> NetResult<bool> {
        self.with_conn_dev(conn, |c, dev| {
            components::should_send_recv_window(&self.pool, dev, c)
        })
    }

    /// Record that `wnd` was advertised from the current `rcv_seq`
    pub fn set_advertised(&self, conn: ConnId, wnd: u16) -> NetResult<()> {
        self.conns.with(|table| {
            let conn = table.get_mut(conn).ok_or(NetError::Invalid)?;
            conn.update_rcv_adv(wnd);
            Ok(())
        })
    }
}
