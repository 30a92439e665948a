//! blade-core: Shared protocol library for the Blade signaling session.
//!
//! Provides JSON-RPC 2.0 envelopes, the Blade method builders, the
//! authentication request/result types, inbound frame classification and
//! response validation. Nothing here touches a socket or a runtime.

pub mod codec;
pub mod error;
pub mod messages;

// Re-export commonly used items at crate root.
pub use codec::{decode, encode, Inbound};
pub use error::{BladeError, BladeResult};
pub use messages::{
    parse_rpc_response, Authorization, ConnectResult, JsonRpcRequest, JsonRpcResponse, Message,
    BLADE_VERSION, JSONRPC_VERSION,
};
