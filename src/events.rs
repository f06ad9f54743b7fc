//! Connection events
//!
//! The socket layer waits on these (poll/select style). This crate only
//! raises them.

use bitflags::bitflags;

use crate::conn::ConnId;
use crate::device::DevId;

bitflags! {
    /// Event bits passed to an [`EventNotifier`]
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct TcpEvents: u16 {
        const BACKLOG   = 1 << 5;  // A connection was queued on a listener
    }
}

/// Receiver of connection events
///
/// Called from the dispatch path: implementations must not block. The return
/// value holds the flags left unhandled.
pub trait EventNotifier {
    fn notify(&mut self, dev: DevId, conn: ConnId, events: TcpEvents) -> TcpEvents;
}

impl<F> EventNotifier for F
where
    F: FnMut(DevId, ConnId, TcpEvents) -> TcpEvents,
{
    fn notify(&mut self, dev: DevId, conn: ConnId, events: TcpEvents) -> TcpEvents {
        self(dev, conn, events)
    }
}

/// Notifier that drops every event
pub struct NoNotify;

impl EventNotifier for NoNotify {
    fn notify(&mut self, _dev: DevId, _conn: ConnId, events: TcpEvents) -> TcpEvents {
        events
    }
}
