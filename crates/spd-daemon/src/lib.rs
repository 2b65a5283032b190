//! spd-daemon library surface.
//!
//! Exposed so the scenario tests under `tests/` can compose the router
//! in-process without binding a socket.

pub mod api_types;
pub mod routes;
pub mod state;
