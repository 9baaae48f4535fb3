//! In-memory transport.
//!
//! [`sim_listener`] returns the dispatcher-side [`SimListener`] and a
//! [`SimConnector`] the test uses to open connections. Each connection has a
//! [`SimPeer`] handle playing the remote phone. Link and accept failures
//! are injected through the connector.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use garagepi_core::{CHALLENGE_LEN, Challenge, Connection, Listener, TransportError};
use tokio::sync::mpsc;

/// Create a connected listener/connector pair.
pub fn sim_listener() -> (SimListener, SimConnector) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SimListener { incoming: rx }, SimConnector { outgoing: tx, next_id: 0 })
}

type Incoming = Result<SimConnection, io::ErrorKind>;

/// Dispatcher side of the simulated transport.
#[derive(Debug)]
pub struct SimListener {
    incoming: mpsc::UnboundedReceiver<Incoming>,
}

#[async_trait]
impl Listener for SimListener {
    type Connection = SimConnection;

    async fn accept(&mut self) -> Result<SimConnection, TransportError> {
        match self.incoming.recv().await {
            Some(Ok(conn)) => Ok(conn),
            Some(Err(kind)) => Err(TransportError::Io(io::Error::from(kind))),
            None => std::future::pending().await,
        }
    }
}

/// Test side: opens connections towards the listener.
#[derive(Debug)]
pub struct SimConnector {
    outgoing: mpsc::UnboundedSender<Incoming>,
    next_id: u32,
}

/// Failure injected into one simulated connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFault {
    /// Sending the challenge fails with a broken pipe.
    SendFails,
    /// Reading the response fails with a connection reset.
    RecvFails,
}

impl SimConnector {
    /// Queue a new connection and return the peer's handle.
    pub fn connect(&mut self) -> SimPeer {
        self.open(None)
    }

    /// Queue a connection whose link fails as described by `fault`.
    pub fn connect_faulty(&mut self, fault: LinkFault) -> SimPeer {
        self.open(Some(fault))
    }

    /// Make the next `accept` fail with `kind`.
    pub fn fail_accept(&self, kind: io::ErrorKind) {
        if self.outgoing.send(Err(kind)).is_err() {
            tracing::debug!("listener dropped, accept failure discarded");
        }
    }

    fn open(&mut self, fault: Option<LinkFault>) -> SimPeer {
        self.next_id += 1;
        let (to_peer, from_server) = mpsc::unbounded_channel();
        let (to_server, from_peer) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let conn = SimConnection {
            peer: format!("sim-peer-{}", self.next_id),
            to_peer,
            from_peer,
            pending: Vec::new(),
            closed: Arc::clone(&closed),
            fault,
        };

        if self.outgoing.send(Ok(conn)).is_err() {
            tracing::debug!("listener dropped, connection discarded");
        }

        SimPeer { from_server, to_server: Some(to_server), closed }
    }
}

/// Dispatcher side of one simulated connection.
#[derive(Debug)]
pub struct SimConnection {
    peer: String,
    to_peer: mpsc::UnboundedSender<Vec<u8>>,
    from_peer: mpsc::UnboundedReceiver<Vec<u8>>,
    pending: Vec<u8>,
    closed: Arc<AtomicBool>,
    fault: Option<LinkFault>,
}

impl Drop for SimConnection {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for SimConnection {
    fn peer(&self) -> String {
        self.peer.clone()
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.fault == Some(LinkFault::SendFails) {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe).into());
        }
        self.to_peer.send(bytes.to_vec()).map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.fault == Some(LinkFault::RecvFails) {
            return Err(io::Error::from(io::ErrorKind::ConnectionReset).into());
        }
        if self.pending.is_empty() {
            match self.from_peer.recv().await {
                Some(chunk) => self.pending = chunk,
                None => return Ok(0),
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        self.from_peer.close();
        Ok(())
    }
}

/// Remote side of one simulated connection.
#[derive(Debug)]
pub struct SimPeer {
    from_server: mpsc::UnboundedReceiver<Vec<u8>>,
    to_server: Option<mpsc::UnboundedSender<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl SimPeer {
    /// Wait for the challenge the server sends on accept.
    pub async fn recv_challenge(&mut self) -> Option<Challenge> {
        let bytes = self.from_server.recv().await?;
        let bytes: [u8; CHALLENGE_LEN] = bytes.try_into().ok()?;
        Some(Challenge::from_bytes(bytes))
    }

    /// Send raw response bytes.
    pub fn respond(&self, bytes: &[u8]) {
        if let Some(tx) = &self.to_server {
            if tx.send(bytes.to_vec()).is_err() {
                tracing::debug!("server side already closed");
            }
        }
    }

    /// Close the sending half.
    pub fn hang_up(&mut self) {
        self.to_server = None;
    }

    /// Returns true once the server has closed or dropped the connection.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
