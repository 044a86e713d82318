//! NetworkSink - pushes records to a single remote collector
//!
//! TCP keeps one connection and reconnects at most once per retry interval after
//! a failure. UDP sends one datagram per record; send errors are not remembered.

use contracts::{
    ContractError, DataSink, Delivery, FormattedRecord, NetworkSinkConfig, TransportProtocol,
};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpStream, UdpSocket};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::outbound::{OutboundBuffer, SendStatus};

enum TcpState {
    Disconnected,
    Connected(TcpStream),
}

/// TCP connection with reconnect bookkeeping
struct TcpLink {
    state: TcpState,
    /// Last connect attempt or teardown
    last_attempt: Option<Instant>,
    outbound: OutboundBuffer,
    connect_attempts: u64,
}

enum Transport {
    Tcp(TcpLink),
    Udp(UdpSocket),
}

/// Sink that streams records to one host over TCP or UDP
pub struct NetworkSink {
    name: String,
    target: SocketAddr,
    blocking: bool,
    reconnect_interval: Duration,
    connect_timeout: Duration,
    transport: Transport,
}

impl NetworkSink {
    /// Create a new NetworkSink
    ///
    /// TCP attempts one connection up front; an unreachable collector is not an
    /// error. A UDP socket that cannot be bound is.
    #[instrument(name = "network_sink_new", skip(name, config), fields(addr = %config.addr, port = config.port))]
    pub fn new(name: impl Into<String>, config: &NetworkSinkConfig) -> Result<Self, ContractError> {
        let name = name.into();
        let target = SocketAddr::new(config.addr, config.port);

        let transport = match config.protocol {
            TransportProtocol::Tcp => Transport::Tcp(TcpLink {
                state: TcpState::Disconnected,
                last_attempt: None,
                outbound: OutboundBuffer::new(),
                connect_attempts: 0,
            }),
            TransportProtocol::Udp => Transport::Udp(
                bind_udp(target, config.blocking)
                    .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?,
            ),
        };

        let mut sink = Self {
            name,
            target,
            blocking: config.blocking,
            reconnect_interval: Duration::from_secs(config.reconnect_interval_secs),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms.max(1)),
            transport,
        };
        sink.connect();

        debug!(sink = %sink.name, target = %target, protocol = ?config.protocol, "NetworkSink created");
        Ok(sink)
    }

    /// Number of TCP connection attempts so far (always 0 for UDP)
    pub fn connect_attempts(&self) -> u64 {
        match &self.transport {
            Transport::Tcp(link) => link.connect_attempts,
            Transport::Udp(_) => 0,
        }
    }

    /// Whether a TCP connection is established (always true for UDP)
    pub fn is_connected(&self) -> bool {
        match &self.transport {
            Transport::Tcp(link) => matches!(link.state, TcpState::Connected(_)),
            Transport::Udp(_) => true,
        }
    }

    /// Attempt a TCP connection, recording the attempt
    fn connect(&mut self) {
        let Transport::Tcp(link) = &mut self.transport else {
            return;
        };

        link.connect_attempts += 1;
        link.last_attempt = Some(Instant::now());

        match open_tcp(self.target, self.connect_timeout, self.blocking) {
            Ok(stream) => {
                info!(sink = %self.name, target = %self.target, "Connected");
                link.state = TcpState::Connected(stream);
            }
            Err(e) => {
                warn!(sink = %self.name, target = %self.target, error = %e, "Connection failed");
                link.state = TcpState::Disconnected;
            }
        }
    }

    fn reconnect_due(&self) -> bool {
        match &self.transport {
            Transport::Tcp(link) => link
                .last_attempt
                .is_none_or(|at| at.elapsed() >= self.reconnect_interval),
            Transport::Udp(_) => false,
        }
    }

    fn deliver_tcp(&mut self, message: &[u8]) -> Delivery {
        let disconnected = matches!(
            &self.transport,
            Transport::Tcp(TcpLink {
                state: TcpState::Disconnected,
                ..
            })
        );
        if disconnected && self.reconnect_due() {
            self.connect();
        }

        let Transport::Tcp(link) = &mut self.transport else {
            return Delivery::Skipped;
        };
        let TcpState::Connected(stream) = &mut link.state else {
            return Delivery::Skipped;
        };

        match link.outbound.send(stream, message) {
            SendStatus::Sent => Delivery::Delivered,
            SendStatus::WouldBlock => Delivery::Skipped,
            SendStatus::Failed(e) => {
                warn!(sink = %self.name, target = %self.target, error = %e, "Connection lost");
                let _ = stream.shutdown(Shutdown::Both);
                link.state = TcpState::Disconnected;
                link.outbound.clear();
                link.last_attempt = Some(Instant::now());
                Delivery::Skipped
            }
        }
    }
}

fn open_tcp(target: SocketAddr, timeout: Duration, blocking: bool) -> io::Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&target, timeout)?;
    stream.set_nonblocking(!blocking)?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

fn bind_udp(target: SocketAddr, blocking: bool) -> io::Result<UdpSocket> {
    let local = if target.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket = UdpSocket::bind(local)?;
    socket.connect(target)?;
    socket.set_nonblocking(!blocking)?;
    Ok(socket)
}

impl DataSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&mut self, record: &FormattedRecord) -> Result<Delivery, ContractError> {
        if let Transport::Udp(socket) = &self.transport {
            return match socket.send(record) {
                Ok(_) => Ok(Delivery::Delivered),
                Err(e) => {
                    // Best-effort: the next datagram is tried as usual
                    debug!(sink = %self.name, error = %e, "UDP send failed");
                    Ok(Delivery::Skipped)
                }
            };
        }
        Ok(self.deliver_tcp(record))
    }

    fn flush(&mut self) {
        if let Transport::Tcp(TcpLink {
            state: TcpState::Connected(stream),
            outbound,
            ..
        }) = &mut self.transport
        {
            if let SendStatus::Failed(e) = outbound.send(stream, &[]) {
                debug!(sink = %self.name, error = %e, "Flush of pending data failed");
            }
        }
    }

    #[instrument(name = "network_sink_close", skip(self), fields(sink = %self.name))]
    fn close(&mut self) -> Result<(), ContractError> {
        if let Transport::Tcp(link) = &mut self.transport {
            if let TcpState::Connected(stream) = &link.state {
                let _ = stream.shutdown(Shutdown::Both);
            }
            link.state = TcpState::Disconnected;
            link.outbound.clear();
        }
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}
