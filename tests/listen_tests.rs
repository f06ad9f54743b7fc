//! Listener Registry Tests
//!
//! Port registration, lookup and the hand-off of inbound connections to
//! accept handlers and backlogs.


use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use embnet_tcp_rust::{
    AcceptOutcome, ConnId, DevId, IobConfig, ListenerRegistry, NetError, NetResult, NoIrq,
    NoNotify, TcpConn, TcpEvents,
};
use test_helpers::*;

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_listen_then_find_until_unlisten() {
    let stack = create_test_stack(IobConfig::default());
    let conn = bind_conn(&stack, TEST_PORT);

    stack.listen(conn).unwrap();
    assert_eq!(stack.find_listener(TEST_PORT), Some(conn));
    assert!(stack.is_listening(TEST_PORT));
    assert_eq!(stack.find_listener(TEST_OTHER_PORT), None);

    stack.unlisten(conn).unwrap();
    assert_eq!(stack.find_listener(TEST_PORT), None);
    assert!(!stack.is_listening(TEST_PORT));
}

#[test]
fn test_every_port_round_trips() {
    let reg: ListenerRegistry<NoIrq, 2> = ListenerRegistry::new();
    for port in [0u16, 1, 80, 443, 8080, u16::MAX] {
        reg.listen(ConnId(7), port).unwrap();
        assert_eq!(reg.find_listener(port), Some(ConnId(7)));
        reg.unlisten(ConnId(7)).unwrap();
        assert_eq!(reg.find_listener(port), None);
    }
}

#[test]
fn test_duplicate_port_is_address_in_use() {
    let stack = create_test_stack(IobConfig::default());
    let first = bind_conn(&stack, TEST_PORT);
    let second = bind_conn(&stack, TEST_PORT);

    stack.listen(first).unwrap();
    assert_eq!(stack.listen(second), Err(NetError::AddressInUse));
    assert_eq!(stack.find_listener(TEST_PORT), Some(first));
}

#[test]
fn test_address_in_use_wins_over_full_table() {
    let stack = create_test_stack(IobConfig::default());
    for port in 0..TEST_LISTENPORTS as u16 {
        let conn = bind_conn(&stack, 1000 + port);
        stack.listen(conn).unwrap();
    }

    let dup = bind_conn(&stack, 1000);
    assert_eq!(stack.listen(dup), Err(NetError::AddressInUse));
}

#[test]
fn test_capacity_then_no_buffers() {
    let stack = create_test_stack(IobConfig::default());
    for port in 0..TEST_LISTENPORTS as u16 {
        let conn = bind_conn(&stack, 2000 + port);
        stack.listen(conn).unwrap();
    }
    assert_eq!(stack.listeners().len(), TEST_LISTENPORTS);

    let extra = bind_conn(&stack, 3000);
    assert_eq!(stack.listen(extra), Err(NetError::NoBuffers));
    assert!(!stack.is_listening(3000));

    // A freed slot can be taken again
    let first = stack.find_listener(2000).unwrap();
    stack.unlisten(first).unwrap();
    stack.listen(extra).unwrap();
    assert_eq!(stack.find_listener(3000), Some(extra));
}

#[test]
fn test_unlisten_matches_handle_not_port() {
    let stack = create_test_stack(IobConfig::default());
    let listener = bind_conn(&stack, TEST_PORT);
    let other = bind_conn(&stack, TEST_PORT);

    stack.listen(listener).unwrap();
    assert_eq!(stack.unlisten(other), Err(NetError::NotFound));
    assert_eq!(stack.find_listener(TEST_PORT), Some(listener));
}

#[test]
fn test_listen_unknown_handle() {
    let stack = create_test_stack(IobConfig::default());
    assert_eq!(stack.listen(ConnId(99)), Err(NetError::Invalid));
}

#[test]
fn test_concurrent_listen_single_winner() {
    let reg: Arc<ListenerRegistry<NoIrq, 8>> = Arc::new(ListenerRegistry::new());

    let handles: Vec<_> = (0..8u16)
        .map(|n| {
            let reg = Arc::clone(&reg);
            thread::spawn(move || reg.listen(ConnId(n), 80))
        })
        .collect();

    let results: Vec<NetResult<()>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let in_use = results
        .iter()
        .filter(|r| **r == Err(NetError::AddressInUse))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(in_use, 7);
    assert_eq!(reg.len(), 1);
}

// ============================================================================
// Accepting connections
// ============================================================================

static ACCEPTED: AtomicU32 = AtomicU32::new(0);

fn count_accept(_listener: ConnId, _conn: ConnId) -> NetResult<()> {
    ACCEPTED.fetch_add(1, Ordering::SeqCst);
    Ok(())
}

fn accept_quietly(_listener: ConnId, _conn: ConnId) -> NetResult<()> {
    Ok(())
}

fn refuse_accept(_listener: ConnId, _conn: ConnId) -> NetResult<()> {
    Err(NetError::NoBuffers)
}

#[test]
fn test_accept_handler_takes_connection() {
    let stack = create_test_stack(IobConfig::default());
    let listener = bind_conn(&stack, TEST_PORT);
    stack.set_accept(listener, Some(count_accept)).unwrap();
    stack.listen(listener).unwrap();

    let before = ACCEPTED.load(Ordering::SeqCst);
    let new_conn = bind_conn(&stack, TEST_PORT);
    let mut notifier = RecordingNotifier::default();

    let res = stack.accept_connection(DevId(0), new_conn, TEST_PORT, &mut notifier);
    assert_eq!(res, Ok(AcceptOutcome::Accepted));
    assert_eq!(ACCEPTED.load(Ordering::SeqCst), before + 1);
    assert!(notifier.events.is_empty());
}

#[test]
fn test_accept_handler_verdict_is_returned() {
    let stack = create_test_stack(IobConfig::default());
    let listener = bind_conn(&stack, TEST_PORT);
    stack.set_accept(listener, Some(refuse_accept)).unwrap();
    stack.listen(listener).unwrap();

    let new_conn = bind_conn(&stack, TEST_PORT);
    let res = stack.accept_connection(DevId(0), new_conn, TEST_PORT, &mut NoNotify);
    assert_eq!(res, Err(NetError::NoBuffers));
}

#[test]
fn test_no_listener_is_rejected() {
    let stack = create_test_stack(IobConfig::default());
    let new_conn = bind_conn(&stack, TEST_PORT);
    let res = stack.accept_connection(DevId(0), new_conn, TEST_PORT, &mut NoNotify);
    assert_eq!(res, Err(NetError::Rejected));
}

#[test]
fn test_listener_without_backlog_is_rejected() {
    let stack = create_test_stack(IobConfig::default());
    let listener = bind_conn(&stack, TEST_PORT);
    stack.listen(listener).unwrap();

    let new_conn = bind_conn(&stack, TEST_PORT);
    let mut notifier = RecordingNotifier::default();
    let res = stack.accept_connection(DevId(0), new_conn, TEST_PORT, &mut notifier);
    assert_eq!(res, Err(NetError::Rejected));
    assert!(notifier.events.is_empty());
}

#[cfg(feature = "backlog")]
#[test]
fn test_backlog_queues_and_notifies() {
    let stack = create_test_stack(IobConfig::default());
    let listener = bind_conn(&stack, TEST_PORT);
    stack.listen(listener).unwrap();
    stack.backlog_create(listener, 2).unwrap();

    let a = bind_conn(&stack, TEST_PORT);
    let b = bind_conn(&stack, TEST_PORT);
    let c = bind_conn(&stack, TEST_PORT);
    let mut notifier = RecordingNotifier::default();

    assert_eq!(
        stack.accept_connection(DevId(0), a, TEST_PORT, &mut notifier),
        Ok(AcceptOutcome::Queued)
    );
    assert_eq!(
        stack.accept_connection(DevId(0), b, TEST_PORT, &mut notifier),
        Ok(AcceptOutcome::Queued)
    );
    assert_eq!(
        stack.accept_connection(DevId(0), c, TEST_PORT, &mut notifier),
        Err(NetError::Rejected)
    );

    // One wakeup per queued connection, addressed to the listener
    assert_eq!(
        notifier.events,
        vec![
            (DevId(0), listener, TcpEvents::BACKLOG),
            (DevId(0), listener, TcpEvents::BACKLOG),
        ]
    );

    assert!(stack.backlog_available(listener));
    assert_eq!(stack.backlog_take(listener), Some(a));
    assert_eq!(stack.backlog_take(listener), Some(b));
    assert_eq!(stack.backlog_take(listener), None);
    assert!(!stack.backlog_available(listener));
}

#[cfg(feature = "backlog")]
#[test]
fn test_accept_handler_bypasses_backlog() {
    let stack = create_test_stack(IobConfig::default());
    let listener = bind_conn(&stack, TEST_PORT);
    stack.listen(listener).unwrap();
    stack.backlog_create(listener, 2).unwrap();
    stack.set_accept(listener, Some(accept_quietly)).unwrap();

    let new_conn = bind_conn(&stack, TEST_PORT);
    let res = stack.accept_connection(DevId(0), new_conn, TEST_PORT, &mut NoNotify);
    assert_eq!(res, Ok(AcceptOutcome::Accepted));
    assert!(!stack.backlog_available(listener));
}

#[cfg(feature = "backlog")]
#[test]
fn test_backlog_create_and_destroy() {
    let stack = create_test_stack(IobConfig::default());
    let listener = bind_conn(&stack, TEST_PORT);
    stack.listen(listener).unwrap();

    assert_eq!(stack.backlog_create(listener, 0), Err(NetError::Invalid));
    assert_eq!(stack.backlog_create(ConnId(99), 4), Err(NetError::Invalid));

    stack.backlog_create(listener, 4).unwrap();
    let pending = bind_conn(&stack, TEST_PORT);
    stack
        .accept_connection(DevId(0), pending, TEST_PORT, &mut NoNotify)
        .unwrap();

    let backlog = stack.backlog_destroy(listener).unwrap().unwrap();
    assert!(backlog.contains(pending));
    assert_eq!(backlog.capacity(), 4);

    // Without a backlog new connections are refused again
    let late = bind_conn(&stack, TEST_PORT);
    assert_eq!(
        stack.accept_connection(DevId(0), late, TEST_PORT, &mut NoNotify),
        Err(NetError::Rejected)
    );
}

#[cfg(feature = "backlog")]
#[test]
fn test_free_conn_drops_stale_handles() {
    let stack = create_test_stack(IobConfig::default());
    let listener = bind_conn(&stack, TEST_PORT);
    stack.listen(listener).unwrap();
    stack.backlog_create(listener, 4).unwrap();

    let pending = bind_conn(&stack, TEST_PORT);
    stack
        .accept_connection(DevId(0), pending, TEST_PORT, &mut NoNotify)
        .unwrap();

    // The pending connection goes away before it is accepted
    stack.free_conn(pending).unwrap();
    assert_eq!(stack.backlog_take(listener), None);

    // Freeing the listener releases its port
    stack.free_conn(listener).unwrap();
    assert!(!stack.is_listening(TEST_PORT));
    assert_eq!(stack.free_conn(listener).err(), Some(NetError::Invalid));
}

#[cfg(feature = "backlog")]
#[test]
fn test_notifier_closure() {
    let stack = create_test_stack(IobConfig::default());
    let listener = bind_conn(&stack, TEST_PORT);
    stack.listen(listener).unwrap();
    stack.backlog_create(listener, 1).unwrap();

    let mut seen = Vec::new();
    let mut notifier = |_dev: DevId, conn: ConnId, ev: TcpEvents| {
        seen.push((conn, ev));
        TcpEvents::empty()
    };
    let new_conn = bind_conn(&stack, TEST_PORT);
    let res = stack.accept_connection(DevId(0), new_conn, TEST_PORT, &mut notifier);

    assert_eq!(res, Ok(AcceptOutcome::Queued));
    assert_eq!(seen, vec![(listener, TcpEvents::BACKLOG)]);
}

#[cfg(feature = "backlog")]
#[test]
fn test_free_listener_releases_pending() {
    let stack = create_test_stack(IobConfig::default());
    let listener = bind_conn(&stack, TEST_PORT);
    stack.listen(listener).unwrap();
    stack.backlog_create(listener, 4).unwrap();

    for _ in 0..3 {
        let pending = bind_conn(&stack, TEST_PORT);
        stack
            .accept_connection(DevId(0), pending, TEST_PORT, &mut NoNotify)
            .unwrap();
    }
    assert_eq!(stack.conns().with(|t| t.len()), 4);

    let freed = stack.free_conn(listener).unwrap();
    assert!(freed.backlog.is_none());
    assert_eq!(stack.conns().with(|t| t.len()), 0);
}

#[cfg(feature = "backlog")]
#[test]
fn test_default_backlog_length() {
    let stack = create_test_stack(IobConfig::default());
    let listener = bind_conn(&stack, TEST_PORT);
    stack.listen(listener).unwrap();
    stack.backlog_create_default(listener).unwrap();

    let backlog = stack.backlog_destroy(listener).unwrap().unwrap();
    assert_eq!(backlog.capacity(), embnet_tcp_rust::config::CONFIG_NET_TCP_NBACKLOG);
}

#[cfg(feature = "backlog")]
#[test]
fn test_accept_never_reaches_reused_slot() {
    let stack = create_test_stack(IobConfig::default());
    let first = bind_conn(&stack, TEST_PORT);
    stack.backlog_create(first, 4).unwrap();
    stack.listen(first).unwrap();

    let done = AtomicBool::new(false);
    let misrouted = AtomicU32::new(0);

    thread::scope(|s| {
        // Dispatch side: keep offering connections on TEST_PORT
        s.spawn(|| {
            while !done.load(Ordering::Acquire) {
                let conn = match stack.alloc_conn(TcpConn::new(DevId(0), TEST_PORT)) {
                    Ok(conn) => conn,
                    Err(_) => {
                        thread::yield_now();
                        continue;
                    }
                };
                if stack
                    .accept_connection(DevId(0), conn, TEST_PORT, &mut NoNotify)
                    .is_err()
                {
                    let _ = stack.free_conn(conn);
                }
            }
        });

        // Normal context: tear the listener down and hand slots to a record
        // bound elsewhere
        let mut listener = first;
        for _ in 0..500 {
            stack.free_conn(listener).unwrap();

            let other = bind_conn(&stack, TEST_OTHER_PORT);
            stack.backlog_create(other, 4).unwrap();
            for _ in 0..4 {
                thread::yield_now();
            }
            if stack.backlog_available(other) {
                misrouted.fetch_add(1, Ordering::SeqCst);
            }
            stack.free_conn(other).unwrap();

            listener = bind_conn(&stack, TEST_PORT);
            stack.backlog_create(listener, 4).unwrap();
            stack.listen(listener).unwrap();
        }
        done.store(true, Ordering::Release);
    });

    assert_eq!(misrouted.load(Ordering::SeqCst), 0);
}
