//! Streaming RPC channel for the Stowbox client.
//!
//! One WebSocket connection carries three call shapes: unary
//! request/response correlated by UUID, ordered chunk enqueue with deferred
//! per-chunk acknowledgments (client streaming), and server streams routing
//! multi-frame responses to a per-stream channel.

pub mod client;
pub(crate) mod pumps;
pub mod streams;

pub use client::{ChunkAckTicket, RpcClient, RpcError};
pub use streams::{ServerStream, StreamFrame};
