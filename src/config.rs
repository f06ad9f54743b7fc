//! Build-time configuration
//!
//! Mirrors the stack's `CONFIG_*` knobs. Runtime values default to these.

/// Number of ports that may be listened on at the same time
pub const CONFIG_NET_MAX_LISTENPORTS: usize = 20;

/// Total number of I/O buffers in the pool
pub const CONFIG_IOB_NBUFFERS: usize = 36;

/// I/O buffers held back from throttled (read-ahead) allocations
pub const CONFIG_IOB_THROTTLE: usize = 8;

/// Payload bytes held by one I/O buffer
pub const CONFIG_IOB_BUFSIZE: usize = 196;

/// Number of I/O buffer chains (queue entries)
pub const CONFIG_IOB_NCHAINS: usize = 8;

/// Default backlog length for a listener
pub const CONFIG_NET_TCP_NBACKLOG: usize = 4;

/// Largest value representable in the TCP window field
pub const TCP_MAX_WINDOW: u16 = u16::MAX;

/// I/O buffer pool geometry
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IobConfig {
    pub nbuffers: usize,   // Total buffers
    pub throttle: usize,   // Reserved from throttled allocations
    pub bufsize: usize,    // Bytes per buffer
    pub nchains: usize,    // Chain (queue entry) slots
}

impl IobConfig {
    pub const fn new(nbuffers: usize, throttle: usize, bufsize: usize, nchains: usize) -> Self {
        Self { nbuffers, throttle, bufsize, nchains }
    }

    /// Whether part of the pool is reserved from read-ahead buffering
    pub fn throttled(&self) -> bool {
        self.throttle > 0
    }
}

impl Default for IobConfig {
    fn default() -> Self {
        Self::new(
            CONFIG_IOB_NBUFFERS,
            CONFIG_IOB_THROTTLE,
            CONFIG_IOB_BUFSIZE,
            CONFIG_IOB_NCHAINS,
        )
    }
}
