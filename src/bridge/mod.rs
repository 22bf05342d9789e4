//! Remote bridge: newline-delimited JSON over a Unix socket.
//!
//! Each request line carries a serialized table state plus one operation;
//! the response line carries the exception flag, the primary result and
//! the new table state. Breakpoint traces stay in-process; the wire is
//! for state, not for animation frames.

pub mod protocol;
pub mod server;

pub use protocol::{handle_line, Request, Response, WireState};
pub use server::run;
