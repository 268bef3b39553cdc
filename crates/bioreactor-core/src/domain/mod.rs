//! Domain entities for the bioreactor gateway.
//!
//! Nothing in this module performs I/O.  The gateway crate wraps these types
//! in sockets and files; tests can exercise them directly.

/// Connection roles and session identity.
pub mod role;

/// The operator command set and its validation rules.
pub mod command;
