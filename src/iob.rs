//! I/O buffer pool view
//!
//! The IOB allocator itself lives outside this crate. The receive-window logic
//! only needs its availability counters, read through [`IobPool`].
//! [`IobCounters`] is a lock-free counter set for hosted builds and tests.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::config::IobConfig;

/// Availability counters of the shared I/O buffer pool
pub trait IobPool {
    /// Free buffers. A throttled count excludes the reserved throttle margin.
    fn navail(&self, throttled: bool) -> usize;

    /// Free chain (queue entry) slots
    fn qentry_navail(&self) -> usize;

    /// Pool geometry
    fn config(&self) -> &IobConfig;
}

impl<P: IobPool + ?Sized> IobPool for &P {
    fn navail(&self, throttled: bool) -> usize {
        (**self).navail(throttled)
    }

    fn qentry_navail(&self) -> usize {
        (**self).qentry_navail()
    }

    fn config(&self) -> &IobConfig {
        (**self).config()
    }
}

/// Atomic buffer and chain counters
///
/// Every read is a single-word atomic load, safe from the dispatch path.
#[derive(Debug)]
pub struct IobCounters {
    config: IobConfig,
    free: AtomicUsize,
    free_chains: AtomicUsize,
}

impl IobCounters {
    /// A pool with every buffer and chain free
    pub fn new(config: IobConfig) -> Self {
        Self {
            free: AtomicUsize::new(config.nbuffers),
            free_chains: AtomicUsize::new(config.nchains),
            config,
        }
    }

    /// Force the free buffer count, clamped to the pool size
    pub fn set_free(&self, n: usize) {
        self.free.store(n.min(self.config.nbuffers), Ordering::Release);
    }

    /// Force the free chain count, clamped to the chain count
    pub fn set_free_chains(&self, n: usize) {
        self.free_chains.store(n.min(self.config.nchains), Ordering::Release);
    }

    /// Take one buffer. Throttled allocations may not dip into the reserve.
    pub fn alloc(&self, throttled: bool) -> bool {
        let floor = if throttled { self.config.throttle } else { 0 };
        self.free
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n > floor { Some(n - 1) } else { None }
            })
            .is_ok()
    }

    /// Return `n` buffers
    pub fn release(&self, n: usize) {
        let max = self.config.nbuffers;
        let _ = self.free.fetch_update(Ordering::AcqRel, Ordering::Acquire, |free| {
            Some(free.saturating_add(n).min(max))
        });
    }

    /// Take one chain slot
    pub fn alloc_chain(&self) -> bool {
        self.free_chains
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Return one chain slot
    pub fn release_chain(&self) {
        let max = self.config.nchains;
        let _ = self.free_chains.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            if n < max { Some(n + 1) } else { None }
        });
    }
}

impl IobPool for IobCounters {
    fn navail(&self, throttled: bool) -> usize {
        let free = self.free.load(Ordering::Acquire);
        if throttled {
            free.saturating_sub(self.config.throttle)
        } else {
            free
        }
    }

    fn qentry_navail(&self) -> usize {
        self.free_chains.load(Ordering::Acquire)
    }

    fn config(&self) -> &IobConfig {
        &self.config
    }
}
