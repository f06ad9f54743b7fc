//! TCP Listen and Flow Control Components
//!
//! 1. Listener Registry - ports being listened on, inbound connection hand-off
//! 2. Backlog - connections waiting for the application to accept them
//! 3. Flow Control - receive window sizing and window update decisions

mod backlog;
mod flow_control;
mod listen;

pub use backlog::Backlog;
pub use flow_control::{
    advertise_decision,
    advertised_window,
    max_recv_window,
    recv_window,
    should_send_recv_window,
    WindowDecision,
    WindowUpdate,
};
pub use listen::{AcceptOutcome, Listener, ListenerRegistry};
