//! Listeners, connectors and connected byte streams.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{tcp, unix, TcpListener, TcpStream, UdpSocket, UnixListener, UnixStream};

use crate::endpoint::Endpoint;
use crate::protocol::error::{RompError, Result};

/// A connected bidirectional byte stream.
pub enum Stream {
    Tcp(TcpStream),
    Unix(UnixStream),
    Datagram(DatagramStream),
}

impl Stream {
    /// Splits into independently owned read and write halves so a session
    /// can serve concurrent readers and writers.
    pub fn split(self) -> (StreamReader, StreamWriter) {
        match self {
            Stream::Tcp(s) => {
                let (r, w) = s.into_split();
                (StreamReader::Tcp(r), StreamWriter::Tcp(w))
            }
            Stream::Unix(s) => {
                let (r, w) = s.into_split();
                (StreamReader::Unix(r), StreamWriter::Unix(w))
            }
            Stream::Datagram(d) => {
                let socket = d.socket.clone();
                (
                    StreamReader::Datagram(DatagramReader {
                        socket: d.socket,
                        buf: Vec::new(),
                        pos: 0,
                    }),
                    StreamWriter::Datagram(socket),
                )
            }
        }
    }
}

/// Read half of a [`Stream`].
pub enum StreamReader {
    Tcp(tcp::OwnedReadHalf),
    Unix(unix::OwnedReadHalf),
    Datagram(DatagramReader),
}

impl StreamReader {
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        match self {
            StreamReader::Tcp(r) => r.read_exact(buf).await.map(|_| ()),
            StreamReader::Unix(r) => r.read_exact(buf).await.map(|_| ()),
            StreamReader::Datagram(r) => r.read_exact(buf).await,
        }
    }
}

/// Write half of a [`Stream`].
pub enum StreamWriter {
    Tcp(tcp::OwnedWriteHalf),
    Unix(unix::OwnedWriteHalf),
    Datagram(Arc<UdpSocket>),
}

impl StreamWriter {
    pub async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            StreamWriter::Tcp(w) => w.write_all(buf).await,
            StreamWriter::Unix(w) => w.write_all(buf).await,
            StreamWriter::Datagram(socket) => {
                // One frame per datagram; a short send loses the frame.
                let sent = socket.send(buf).await?;
                if sent != buf.len() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "short datagram send",
                    ));
                }
                Ok(())
            }
        }
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        match self {
            StreamWriter::Tcp(w) => w.flush().await,
            StreamWriter::Unix(w) => w.flush().await,
            StreamWriter::Datagram(_) => Ok(()),
        }
    }
}

/// Stream-shaped wrapper over a connected datagram socket (known-weak).
pub struct DatagramStream {
    socket: Arc<UdpSocket>,
}

/// Buffers whole datagrams and serves byte-exact reads out of them.
pub struct DatagramReader {
    socket: Arc<UdpSocket>,
    buf: Vec<u8>,
    pos: usize,
}

impl DatagramReader {
    async fn read_exact(&mut self, out: &mut [u8]) -> std::io::Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            if self.pos == self.buf.len() {
                self.buf.resize(64 * 1024, 0);
                let n = self.socket.recv(&mut self.buf).await?;
                self.buf.truncate(n);
                self.pos = 0;
                continue;
            }
            let take = (out.len() - filled).min(self.buf.len() - self.pos);
            out[filled..filled + take].copy_from_slice(&self.buf[self.pos..self.pos + take]);
            self.pos += take;
            filled += take;
        }
        Ok(())
    }
}

/// Identity of an accepted peer, handed to the accept predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    Tcp(SocketAddr),
    Unix,
    Datagram(SocketAddr),
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Tcp(addr) => write!(f, "tcp:{addr}"),
            Peer::Unix => write!(f, "unix"),
            Peer::Datagram(addr) => write!(f, "udp:{addr}"),
        }
    }
}

/// A bound listener producing connected streams.
pub enum Acceptor {
    Tcp(TcpListener),
    Unix(UnixListener),
    Datagram {
        socket: Arc<UdpSocket>,
        accepted: AtomicBool,
    },
}

impl Acceptor {
    /// Waits for the next peer. Accepted TCP streams get `TCP_NODELAY`.
    ///
    /// The datagram acceptor yields a single session bound to the first
    /// peer that sends anything, then pends forever; one socket backs all
    /// traffic in that mode.
    pub async fn accept(&self) -> Result<(Stream, Peer)> {
        match self {
            Acceptor::Tcp(listener) => {
                let (stream, addr) = listener
                    .accept()
                    .await
                    .map_err(|e| RompError::Transport(format!("accept failed: {e}")))?;
                stream
                    .set_nodelay(true)
                    .map_err(|e| RompError::Transport(format!("failed to set nodelay: {e}")))?;
                Ok((Stream::Tcp(stream), Peer::Tcp(addr)))
            }
            Acceptor::Unix(listener) => {
                let (stream, _) = listener
                    .accept()
                    .await
                    .map_err(|e| RompError::Transport(format!("accept failed: {e}")))?;
                Ok((Stream::Unix(stream), Peer::Unix))
            }
            Acceptor::Datagram { socket, accepted } => {
                if accepted.swap(true, Ordering::SeqCst) {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                let mut probe = [0u8; 1];
                let (_, peer) = socket
                    .peek_from(&mut probe)
                    .await
                    .map_err(|e| RompError::Transport(format!("datagram peek failed: {e}")))?;
                socket
                    .connect(peer)
                    .await
                    .map_err(|e| RompError::Transport(format!("datagram connect failed: {e}")))?;
                Ok((
                    Stream::Datagram(DatagramStream {
                        socket: socket.clone(),
                    }),
                    Peer::Datagram(peer),
                ))
            }
        }
    }

    /// The locally bound socket address, when the transport has one.
    /// Useful after binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Acceptor::Tcp(listener) => listener.local_addr().ok(),
            Acceptor::Unix(_) => None,
            Acceptor::Datagram { socket, .. } => socket.local_addr().ok(),
        }
    }
}

/// Binds a listener for the endpoint. Bind failures are transport errors.
pub async fn listen(endpoint: &Endpoint) -> Result<Acceptor> {
    match endpoint {
        Endpoint::Tcp { host, port } => {
            let addr = (host.as_deref().unwrap_or("0.0.0.0"), *port);
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|e| RompError::Transport(format!("failed to bind {endpoint}: {e}")))?;
            Ok(Acceptor::Tcp(listener))
        }
        Endpoint::Unix { path } => {
            let listener = UnixListener::bind(path)
                .map_err(|e| RompError::Transport(format!("failed to bind {endpoint}: {e}")))?;
            Ok(Acceptor::Unix(listener))
        }
        Endpoint::Udp { host, port } => {
            let addr = (host.as_deref().unwrap_or("0.0.0.0"), *port);
            let socket = UdpSocket::bind(addr)
                .await
                .map_err(|e| RompError::Transport(format!("failed to bind {endpoint}: {e}")))?;
            Ok(Acceptor::Datagram {
                socket: Arc::new(socket),
                accepted: AtomicBool::new(false),
            })
        }
    }
}

/// Connects to the endpoint. Wildcard hosts are rejected here, not at
/// parse time; the same URI may be valid for a listener.
pub async fn connect(endpoint: &Endpoint) -> Result<Stream> {
    match endpoint {
        Endpoint::Tcp { port, .. } => {
            let host = endpoint.connect_host()?;
            let stream = TcpStream::connect((host, *port))
                .await
                .map_err(|e| RompError::Transport(format!("failed to connect {endpoint}: {e}")))?;
            stream
                .set_nodelay(true)
                .map_err(|e| RompError::Transport(format!("failed to set nodelay: {e}")))?;
            Ok(Stream::Tcp(stream))
        }
        Endpoint::Unix { path } => {
            let stream = UnixStream::connect(path)
                .await
                .map_err(|e| RompError::Transport(format!("failed to connect {endpoint}: {e}")))?;
            Ok(Stream::Unix(stream))
        }
        Endpoint::Udp { port, .. } => {
            let host = endpoint.connect_host()?;
            let socket = UdpSocket::bind("0.0.0.0:0")
                .await
                .map_err(|e| RompError::Transport(format!("failed to bind datagram socket: {e}")))?;
            socket
                .connect((host, *port))
                .await
                .map_err(|e| RompError::Transport(format!("failed to connect {endpoint}: {e}")))?;
            Ok(Stream::Datagram(DatagramStream {
                socket: Arc::new(socket),
            }))
        }
    }
}
