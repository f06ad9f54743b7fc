//! Error codes shared with the C side of the stack
//!
//! Every failure of this crate is one of the variants below. Each maps onto the
//! negated errno value the C networking layer expects.

use core::fmt;

/// Negated POSIX errno values used on the C boundary
pub const EINVAL: i32 = 22;
pub const ENOBUFS: i32 = 105;
pub const EADDRINUSE: i32 = 98;
pub const ECONNREFUSED: i32 = 111;

/// Network error kinds
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NetError {
    AddressInUse,   // Another listener already owns the port
    NotFound,       // Connection is not registered as a listener
    NoBuffers,      // Listener table is full
    Rejected,       // No listener or no backlog room for a new connection
    Invalid,        // Illegal argument or unknown connection handle
}

/// Result alias used throughout the crate
pub type NetResult<T> = Result<T, NetError>;

impl NetError {
    /// Convert to the negated errno returned to C callers
    pub fn to_errno(self) -> i32 {
        match self {
            NetError::AddressInUse => -EADDRINUSE,
            NetError::NotFound => -EINVAL, // unlisten has always reported EINVAL
            NetError::NoBuffers => -ENOBUFS,
            NetError::Rejected => -ECONNREFUSED,
            NetError::Invalid => -EINVAL,
        }
    }

    /// Convert from a negated errno
    ///
    /// `-EINVAL` is ambiguous and decodes as `Invalid`. Unknown codes are
    /// treated as `Invalid` as well.
    pub fn from_errno(val: i32) -> Self {
        match -val {
            EADDRINUSE => NetError::AddressInUse,
            ENOBUFS => NetError::NoBuffers,
            ECONNREFUSED => NetError::Rejected,
            _ => NetError::Invalid,
        }
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            NetError::AddressInUse => "address in use",
            NetError::NotFound => "listener not found",
            NetError::NoBuffers => "no free listener slot",
            NetError::Rejected => "connection rejected",
            NetError::Invalid => "invalid argument",
        };
        f.write_str(msg)
    }
}

/// Collapse a result into the C return convention (0 or negated errno)
pub fn to_c_ret(res: NetResult<()>) -> i32 {
    match res {
        Ok(()) => 0,
        Err(err) => err.to_errno(),
    }
}
