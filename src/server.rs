use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::dns::DNSPacket;
use crate::error::MdnsError;
use crate::handler::{HandleOutcome, MdnsHandler};
use crate::shutdown::{GracefulShutdown, RequestTracker};
use crate::transport::{TcpTransport, UdpTransport};

/// Largest datagram read from the UDP socket
const UDP_BUFFER_SIZE: usize = 4096;

/// UDP and TCP listeners on one address, sharing a dispatcher
pub struct DnsServer {
    udp: Arc<UdpSocket>,
    tcp: TcpListener,
    handler: Arc<MdnsHandler>,
    tcp_idle_timeout: Duration,
}

impl DnsServer {
    /// Bind both listeners. With port 0 the TCP port picked by the OS is
    /// reused for UDP.
    pub async fn bind(config: &Config, handler: Arc<MdnsHandler>) -> Result<Self, MdnsError> {
        let addr = config.bind_addr()?;
        let tcp = TcpListener::bind(addr).await?;
        let tcp_addr = tcp.local_addr()?;
        let udp = UdpSocket::bind(SocketAddr::new(addr.ip(), tcp_addr.port())).await?;

        info!("TCP DNS server listening on {}", tcp_addr);
        info!("UDP DNS server listening on {}", udp.local_addr()?);

        Ok(Self {
            udp: Arc::new(udp),
            tcp,
            handler,
            tcp_idle_timeout: config.tcp_idle_timeout(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    /// Serve until `shutdown` is triggered. In-flight requests are not
    /// awaited here; see [`GracefulShutdown::drain`].
    pub async fn run(self, shutdown: &GracefulShutdown) -> Result<(), MdnsError> {
        let udp = tokio::spawn(run_udp_server(
            self.udp,
            self.handler.clone(),
            shutdown.tracker(),
            shutdown.subscribe(),
        ));
        let tcp = tokio::spawn(run_tcp_server(
            self.tcp,
            self.handler,
            shutdown.tracker(),
            self.tcp_idle_timeout,
            shutdown.subscribe(),
        ));

        let (udp, tcp) = tokio::join!(udp, tcp);
        udp.map_err(|e| MdnsError::Io(io::Error::other(e)))??;
        tcp.map_err(|e| MdnsError::Io(io::Error::other(e)))??;
        Ok(())
    }
}

/// Run UDP server with graceful shutdown support
pub async fn run_udp_server(
    sock: Arc<UdpSocket>,
    handler: Arc<MdnsHandler>,
    tracker: RequestTracker,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), MdnsError> {
    let mut buf = vec![0u8; UDP_BUFFER_SIZE];

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("UDP server received shutdown signal");
                break;
            }

            result = sock.recv_from(&mut buf) => {
                let (read_bytes, src_addr) = match result {
                    Ok(received) => received,
                    Err(e) => {
                        warn!("UDP receive failed: {}", e);
                        continue;
                    }
                };

                let query_data = buf[..read_bytes].to_vec();
                let sock = sock.clone();
                let handler = handler.clone();
                let guard = tracker.start();

                tokio::spawn(async move {
                    let _guard = guard;
                    let Some(request) = parse_request(&query_data, src_addr) else {
                        return;
                    };
                    let mut transport =
                        UdpTransport::new(sock, src_addr, request.max_udp_payload_size());
                    let outcome = handler.handle(&request, &mut transport).await;
                    trace!("UDP request from {} finished: {:?}", src_addr, outcome);
                });
            }
        }
    }

    Ok(())
}

/// Run TCP server with graceful shutdown support
pub async fn run_tcp_server(
    listener: TcpListener,
    handler: Arc<MdnsHandler>,
    tracker: RequestTracker,
    idle_timeout: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), MdnsError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("TCP server received shutdown signal");
                break;
            }

            result = listener.accept() => {
                let (stream, src_addr) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("TCP accept failed: {}", e);
                        continue;
                    }
                };
                let handler = handler.clone();
                let tracker = tracker.clone();
                let connection_shutdown = shutdown_rx.resubscribe();

                tokio::spawn(async move {
                    if let Err(e) = handle_tcp_connection(
                        stream,
                        src_addr,
                        handler,
                        tracker,
                        idle_timeout,
                        connection_shutdown,
                    )
                    .await
                    {
                        warn!("TCP connection error from {}: {}", src_addr, e);
                    }
                });
            }
        }
    }

    Ok(())
}

/// Serve length-prefixed requests from one connection, one at a time, until
/// EOF, an idle timeout, shutdown or a failed write.
async fn handle_tcp_connection(
    stream: TcpStream,
    src_addr: SocketAddr,
    handler: Arc<MdnsHandler>,
    tracker: RequestTracker,
    idle_timeout: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), MdnsError> {
    let (mut reader, writer) = stream.into_split();
    let mut transport = TcpTransport::new(writer, src_addr);

    loop {
        let mut len_buf = [0u8; 2];
        let read = tokio::select! {
            _ = shutdown_rx.recv() => break,
            read = tokio::time::timeout(idle_timeout, reader.read_exact(&mut len_buf)) => read,
        };
        match read {
            Err(_) => {
                debug!("Closing idle TCP connection from {}", src_addr);
                break;
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(_)) => {}
        }

        let msg_len = u16::from_be_bytes(len_buf) as usize;
        let mut msg_buf = vec![0u8; msg_len];
        match tokio::time::timeout(idle_timeout, reader.read_exact(&mut msg_buf)).await {
            Err(_) => {
                debug!("Timed out reading TCP request from {}", src_addr);
                break;
            }
            Ok(result) => {
                result?;
            }
        }

        let _guard = tracker.start();
        let Some(request) = parse_request(&msg_buf, src_addr) else {
            break;
        };
        let outcome = handler.handle(&request, &mut transport).await;
        trace!("TCP request from {} finished: {:?}", src_addr, outcome);
        if let HandleOutcome::Aborted { .. } = outcome {
            break;
        }
    }

    Ok(())
}

/// Parse an inbound query; malformed messages and responses are dropped
fn parse_request(buf: &[u8], src_addr: SocketAddr) -> Option<DNSPacket> {
    match DNSPacket::parse(buf) {
        Ok(packet) if packet.header.qr => {
            debug!("Received DNS response instead of query from {}", src_addr);
            None
        }
        Ok(packet) => Some(packet),
        Err(e) => {
            debug!(
                "Malformed packet from {} ({} bytes): {}",
                src_addr,
                buf.len(),
                e
            );
            None
        }
    }
}
