//! Network critical section
//!
//! State shared between normal context and the packet dispatch path sits
//! behind a [`NetLock`]. Taking the lock first masks interrupts through the
//! platform [`IrqControl`] hook and then acquires a spin mutex, so a dispatch
//! handler can never preempt a holder on the same CPU and spin forever.
//! Guards release the mutex before interrupts are restored.
//!
//! Hold the lock only for short, non-blocking, non-allocating work.

use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

/// Platform hook for masking interrupts around the net lock
pub trait IrqControl {
    /// Saved interrupt state
    type Flags;

    /// Mask interrupts, returning the previous state
    fn save_and_disable() -> Self::Flags;

    /// Restore a state returned by `save_and_disable`
    fn restore(flags: Self::Flags);
}

/// Hosted targets: nothing to mask
///
/// The dispatch path runs as a high-priority task and the spin mutex alone
/// provides exclusion.
pub struct NoIrq;

impl IrqControl for NoIrq {
    type Flags = ();

    #[inline]
    fn save_and_disable() {}

    #[inline]
    fn restore(_flags: ()) {}
}

/// Interrupt-safe spin lock
pub struct NetLock<T, I: IrqControl = NoIrq> {
    inner: spin::Mutex<T>,
    _irq: PhantomData<fn() -> I>,
}

impl<T, I: IrqControl> NetLock<T, I> {
    pub const fn new(data: T) -> Self {
        Self {
            inner: spin::Mutex::new(data),
            _irq: PhantomData,
        }
    }

    /// Enter the critical section
    pub fn lock(&self) -> NetLockGuard<'_, T, I> {
        let flags = I::save_and_disable();
        let guard = self.inner.lock();
        NetLockGuard {
            guard,
            _restore: IrqRestore { flags: Some(flags) },
        }
    }

    /// Enter the critical section only if nobody holds it
    pub fn try_lock(&self) -> Option<NetLockGuard<'_, T, I>> {
        let restore = IrqRestore::<I> { flags: Some(I::save_and_disable()) };
        // On failure `restore` drops here and unmasks again
        let guard = self.inner.try_lock()?;
        Some(NetLockGuard { guard, _restore: restore })
    }

    /// Run `f` inside the critical section
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

/// Guard of a [`NetLock`]
///
/// Field order matters: the mutex guard drops before interrupts are restored.
pub struct NetLockGuard<'a, T, I: IrqControl> {
    guard: spin::MutexGuard<'a, T>,
    _restore: IrqRestore<I>,
}

impl<T, I: IrqControl> Deref for NetLockGuard<'_, T, I> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, I: IrqControl> DerefMut for NetLockGuard<'_, T, I> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

struct IrqRestore<I: IrqControl> {
    flags: Option<I::Flags>,
}

impl<I: IrqControl> Drop for IrqRestore<I> {
    fn drop(&mut self) {
        if let Some(flags) = self.flags.take() {
            I::restore(flags);
        }
    }
}
