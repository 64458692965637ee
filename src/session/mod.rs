//! Session layer: wire protocol, per-connection state machine, TCP server.

pub mod protocol;
pub mod server;
pub mod state;

pub use protocol::{ClientMessage, ErrorCode, ServerMessage};
pub use server::{run_server, ServerConfig};
pub use state::Session;
