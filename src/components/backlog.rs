//! Listener Backlog Component
//!
//! Bounded FIFO of connections accepted on the dispatch path but not yet
//! claimed by the application.

use std::collections::VecDeque;

use crate::conn::ConnId;
use crate::error::{NetError, NetResult};

/// Pending connections of one listener
///
/// Storage is reserved up front so `add` never allocates.
#[derive(Debug)]
pub struct Backlog {
    pending: VecDeque<ConnId>,
    capacity: usize,
}

impl Backlog {
    pub fn new(capacity: usize) -> NetResult<Self> {
        if capacity == 0 {
            return Err(NetError::Invalid);
        }

        Ok(Self {
            pending: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// At least one connection is waiting to be accepted
    pub fn available(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Queue a new connection
    pub fn add(&mut self, conn: ConnId) -> NetResult<()> {
        if self.pending.len() >= self.capacity {
            log::debug!("backlog add: full, capacity={}", self.capacity);
            return Err(NetError::Rejected);
        }

        self.pending.push_back(conn);
        Ok(())
    }

    /// Claim the oldest pending connection
    pub fn take(&mut self) -> Option<ConnId> {
        self.pending.pop_front()
    }

    /// Forget a pending connection that is being torn down
    pub fn remove(&mut self, conn: ConnId) -> bool {
        match self.pending.iter().position(|c| *c == conn) {
            Some(ndx) => {
                self.pending.remove(ndx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, conn: ConnId) -> bool {
        self.pending.contains(&conn)
    }
}
