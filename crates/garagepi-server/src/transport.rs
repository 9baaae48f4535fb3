//! Stream-socket transport for the challenge channel.

use std::net::SocketAddr;

use async_trait::async_trait;
use garagepi_core::{Connection, Listener, SERVICE_NAME, TransportError};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpSocket, TcpStream},
};

use crate::error::ServerError;

/// Pending-connection backlog. One phone at a time.
const BACKLOG: u32 = 1;

/// Listening socket accepting challenge connections.
#[derive(Debug)]
pub struct StreamListener {
    listener: TcpListener,
}

impl StreamListener {
    /// Bind to `address` with a backlog of one.
    pub fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address {address}: {e}")))?;

        let socket = if addr.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(BACKLOG)?;

        tracing::info!(
            service = SERVICE_NAME,
            addr = %listener.local_addr()?,
            "advertising service"
        );
        Ok(Self { listener })
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

#[async_trait]
impl Listener for StreamListener {
    type Connection = StreamConnection;

    async fn accept(&mut self) -> Result<StreamConnection, TransportError> {
        let (stream, peer) = self.listener.accept().await?;
        tracing::debug!(%peer, "connection accepted");
        Ok(StreamConnection { stream, peer })
    }
}

/// One accepted stream connection.
#[derive(Debug)]
pub struct StreamConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

#[async_trait]
impl Connection for StreamConnection {
    fn peer(&self) -> String {
        self.peer.to_string()
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(self.stream.read(buf).await?)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.shutdown().await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
