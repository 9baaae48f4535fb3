//! Transport abstraction for the challenge channel.
//!
//! The socket stack itself lives outside the core. Production uses
//! `garagepi-server`'s stream listener, tests use the harness's scripted
//! listener.

use async_trait::async_trait;

use crate::error::TransportError;

/// Identifier advertised by the challenge service.
pub const SERVICE_NAME: &str = "garagepi";

/// A single accepted peer connection.
#[async_trait]
pub trait Connection: Send {
    /// Human-readable peer address for logs.
    fn peer(&self) -> String;

    /// Write all of `bytes`.
    async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read at most `buf.len()` bytes. Returns 0 once the peer has finished
    /// sending.
    ///
    /// Must be cancel-safe: the response wait drops this future on timeout.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Tear down the connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Source of incoming connection attempts. Backlog of one.
#[async_trait]
pub trait Listener: Send {
    /// Connection type produced by this listener.
    type Connection: Connection;

    /// Wait for the next connection.
    ///
    /// Must be cancel-safe: the dispatcher races this against its tick budget.
    async fn accept(&mut self) -> Result<Self::Connection, TransportError>;
}
