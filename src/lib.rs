//! TCP listener table and receive window management for an embedded stack
//!
//! This crate covers two pieces of the TCP layer that are shared between
//! normal execution context and the packet dispatch path:
//!
//! - the listener registry, mapping local ports to listening connections and
//!   handing inbound connections to an accept handler or a backlog, and
//! - the receive window estimator, which sizes the advertised window from I/O
//!   buffer availability and filters out window updates too small to be worth
//!   a segment.
//!
//! Connection records, devices and the IOB pool are owned elsewhere; they are
//! reached through [`ConnId`] handles and the [`IobPool`] / [`NetDevice`]
//! traits. [`TcpStack`] ties them together for one running stack.

pub mod components;
pub mod config;
pub mod conn;
pub mod device;
pub mod error;
pub mod events;
pub mod iob;
pub mod lock;
pub mod seq;
pub mod stack;

pub use components::{
    AcceptOutcome,
    Backlog,
    Listener,
    ListenerRegistry,
    WindowDecision,
    WindowUpdate,
};
pub use config::IobConfig;
pub use conn::{AcceptFn, ConnId, ConnTable, TcpConn};
pub use device::{DevId, DeviceMtu, IpDomain, NetDevice};
pub use error::{NetError, NetResult};
pub use events::{EventNotifier, NoNotify, TcpEvents};
pub use iob::{IobCounters, IobPool};
pub use lock::{IrqControl, NetLock, NoIrq};
pub use stack::TcpStack;
