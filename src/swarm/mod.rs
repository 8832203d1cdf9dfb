//! Remote transport (component C8): the gRPC bridge between a scheduler
//! and a remote worker node, generated at build time from
//! `proto/swarm.proto` (see `build.rs`).

pub mod client;
pub mod server;

/// Generated request/response types and the `SwarmNodeService`
/// client/server traits.
pub mod proto {
    tonic::include_proto!("swarm");
}

pub use client::SwarmNodeClient;
pub use server::SwarmNodeServicer;

/// Default bind port for a `swarm-node` server process.
pub const DEFAULT_PORT: u16 = 50051;
