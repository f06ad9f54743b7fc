//! Flow Control Component
//!
//! Sizes the receive window from I/O buffer availability and decides when a
//! grown window is worth a window update segment.
//!
//! The window assumes every free IOB can buffer read-ahead data for the
//! connection being sized. With several active read-ahead connections, or
//! other IOB consumers such as write buffering, the advertised window can
//! exceed what is really left for this connection. That overestimate is
//! accepted behaviour; tightening it would change how peers are throttled
//! under load.

use crate::config::{IobConfig, TCP_MAX_WINDOW};
use crate::conn::TcpConn;
use crate::device::NetDevice;
use crate::iob::IobPool;
use crate::seq::{seq_gt, seq_sub};

#[inline]
fn clamp_window(bytes: usize) -> u16 {
    bytes.min(TCP_MAX_WINDOW as usize) as u16
}

/// Largest window any connection can be offered
///
/// The throttled part of the pool is never available to read-ahead buffering.
/// Must stay in sync with [`recv_window`].
pub fn max_recv_window(cfg: &IobConfig) -> u16 {
    clamp_window(cfg.nbuffers.saturating_sub(cfg.throttle).saturating_mul(cfg.bufsize))
}

/// Receive window to advertise for `conn` on `dev`
pub fn recv_window<P, D>(pool: &P, dev: &D, conn: &TcpConn) -> u16
where
    P: IobPool + ?Sized,
    D: NetDevice + ?Sized,
{
    let cfg = pool.config();
    let niob_avail = pool.navail(true);
    let nqentry_avail = pool.qentry_navail();

    // One chain to hold the data plus the free buffers to fill it
    if nqentry_avail > 0 && niob_avail > 0 {
        return clamp_window(niob_avail.saturating_mul(cfg.bufsize));
    }

    // Nothing queued yet: leave room for one segment. A single segment can
    // still be buffered past the throttle.
    if cfg.throttled() && conn.readahead_empty() {
        let unthrottled = pool.navail(false).saturating_mul(cfg.bufsize);
        return clamp_window(unthrottled.min(dev.rx_mss() as usize));
    }

    // Window closed. The next segment is dropped unless it is consumed
    // straight away.
    0
}

/// Why a window update was or was not sent
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WindowUpdate {
    NotGrown,       // New window does not reach past the advertised edge
    TooSmall,       // Grew, but by less than both thresholds
    HalfMax,        // Grew by at least half of the largest window
    TwoSegments,    // Grew by at least two full segments
}

/// Outcome of comparing the advertised window against a fresh one
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WindowDecision {
    pub old_wnd: u16,
    pub new_wnd: u16,
    pub verdict: WindowUpdate,
}

impl WindowDecision {
    pub fn should_send(&self) -> bool {
        matches!(self.verdict, WindowUpdate::HalfMax | WindowUpdate::TwoSegments)
    }

    /// Window growth since the last advertisement
    pub fn delta(&self) -> u16 {
        self.new_wnd.saturating_sub(self.old_wnd)
    }
}

/// Window still open from the last advertisement
///
/// `rcv_adv` can trail `rcv_seq`, e.g. after shrinking the window or after
/// zero window probes advanced `rcv_seq`; the open window is zero then.
pub fn advertised_window(conn: &TcpConn) -> u16 {
    if seq_gt(conn.rcv_adv, conn.rcv_seq) {
        clamp_window(seq_sub(conn.rcv_adv, conn.rcv_seq) as usize)
    } else {
        0
    }
}

/// Compare the advertised window with what could be offered now
pub fn advertise_decision<P, D>(pool: &P, dev: &D, conn: &TcpConn) -> WindowDecision
where
    P: IobPool + ?Sized,
    D: NetDevice + ?Sized,
{
    let old_wnd = advertised_window(conn);
    let new_wnd = recv_window(pool, dev, conn);

    let verdict = if new_wnd <= old_wnd {
        WindowUpdate::NotGrown
    } else {
        // Thresholds follow the NetBSD stack
        let adv = (new_wnd - old_wnd) as u32;
        let maxwin = max_recv_window(pool.config()) as u32;
        let mss = dev.rx_mss() as u32;

        if 2 * adv >= maxwin {
            WindowUpdate::HalfMax
        } else if adv >= 2 * mss {
            WindowUpdate::TwoSegments
        } else {
            WindowUpdate::TooSmall
        }
    };

    WindowDecision { old_wnd, new_wnd, verdict }
}

/// Whether a window update segment should be sent for `conn`
pub fn should_send_recv_window<P, D>(pool: &P, dev: &D, conn: &TcpConn) -> bool
where
    P: IobPool + ?Sized,
    D: NetDevice + ?Sized,
{
    let decision = advertise_decision(pool, dev, conn);
    log::trace!(
        "tcp_should_send_recvwindow: {}: rcvseq={}, rcv_adv={}, old win={}, new win={}, {:?}",
        decision.should_send(),
        conn.rcv_seq,
        conn.rcv_adv,
        decision.old_wnd,
        decision.new_wnd,
        decision.verdict
    );
    decision.should_send()
}
