//! TCP Connection Records
//!
//! Connection records live in a fixed-capacity [`ConnTable`] and are referred
//! to by [`ConnId`] handles. Other components (listener slots, backlogs) store
//! handles only and never own a record.
//!
//! # Handle lifetime
//!
//! Nothing tracks outstanding handles. Before a record is freed, the caller
//! must `unlisten` it if it was listening and remove it from its listener's
//! backlog if it was pending there. A stale handle may otherwise alias a newer
//! record occupying the same slot.

use crate::device::DevId;
use crate::error::{NetError, NetResult};

#[cfg(feature = "backlog")]
use crate::components::Backlog;

/// Non-owning handle to a connection record
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub u16);

/// Accept handler of a listener
///
/// Runs on the dispatch path with the listener and the newly created
/// connection. Must not block.
pub type AcceptFn = fn(listener: ConnId, conn: ConnId) -> NetResult<()>;

/// Connection record
pub struct TcpConn {
    pub lport: u16,              // Local port, in host order
    pub rcv_seq: u32,            // Next sequence number expected from the peer
    pub rcv_adv: u32,            // Right edge of the last advertised window
    pub dev: DevId,              // Device the connection is bound to
    pub readahead: usize,        // IOB chains queued for the application
    pub accept: Option<AcceptFn>,
    #[cfg(feature = "backlog")]
    pub backlog: Option<Backlog>,
}

impl TcpConn {
    pub fn new(dev: DevId, lport: u16) -> Self {
        Self {
            lport,
            rcv_seq: 0,
            rcv_adv: 0,
            dev,
            readahead: 0,
            accept: None,
            #[cfg(feature = "backlog")]
            backlog: None,
        }
    }

    /// No read-ahead data is waiting for the application
    pub fn readahead_empty(&self) -> bool {
        self.readahead == 0
    }

    /// Record that a window reaching `rcv_seq + wnd` has been sent
    pub fn update_rcv_adv(&mut self, wnd: u16) {
        self.rcv_adv = self.rcv_seq.wrapping_add(wnd as u32);
    }
}

/// Fixed-capacity arena of connection records
pub struct ConnTable {
    slots: Vec<Option<TcpConn>>,
}

impl ConnTable {
    /// Preallocate `capacity` slots
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(u16::MAX as usize);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a record in the first free slot
    pub fn alloc(&mut self, conn: TcpConn) -> NetResult<ConnId> {
        let ndx = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(NetError::NoBuffers)?;
        self.slots[ndx] = Some(conn);
        Ok(ConnId(ndx as u16))
    }

    /// Release a record, returning it
    pub fn free(&mut self, id: ConnId) -> NetResult<TcpConn> {
        self.slots
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(NetError::Invalid)
    }

    pub fn get(&self, id: ConnId) -> Option<&TcpConn> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ConnId) -> Option<&mut TcpConn> {
        self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Iterate over live records
    pub fn iter(&self) -> impl Iterator<Item = (ConnId, &TcpConn)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(ndx, slot)| slot.as_ref().map(|c| (ConnId(ndx as u16), c)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ConnId, &mut TcpConn)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(ndx, slot)| slot.as_mut().map(|c| (ConnId(ndx as u16), c)))
    }
}
