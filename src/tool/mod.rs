//! Tool-server transport: JSON-RPC protocol types, the child-process client,
//! and the stdio server the client spawns.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{ClientState, ToolClient};
pub use protocol::{ToolKind, ToolOutput};
