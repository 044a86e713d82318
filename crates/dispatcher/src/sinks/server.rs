//! ServerSink - TCP fan-out to every connected client
//!
//! An acceptor thread takes new connections and parks them in a staging list.
//! Delivery merges staged clients into the active set when the acceptor has
//! flagged new arrivals, then offers the record to each client. A client that
//! cannot keep up loses records; it never holds more than one message remainder.

use contracts::{ContractError, DataSink, Delivery, FormattedRecord, ServerSinkConfig};
use std::io::{self, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::outbound::{OutboundBuffer, SendStatus};
use crate::handle::{StopSignal, WorkerHandle};

/// Back-off after a failed accept
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);
/// Timeout of the connection that wakes the acceptor on shutdown
const WAKE_TIMEOUT: Duration = Duration::from_millis(500);

/// One connected client
struct Client {
    peer: SocketAddr,
    stream: TcpStream,
    outbound: OutboundBuffer,
}

impl Client {
    fn new(stream: TcpStream, peer: SocketAddr, blocking: bool) -> io::Result<Self> {
        stream.set_nonblocking(!blocking)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            peer,
            stream,
            outbound: OutboundBuffer::new(),
        })
    }
}

/// Clients accepted but not yet picked up by delivery
#[derive(Default)]
struct Staging {
    clients: Mutex<Vec<Client>>,
    ready: AtomicBool,
}

impl Staging {
    fn push(&self, client: Client) {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.push(client);
        self.ready.store(true, Ordering::Release);
    }

    /// Move staged clients into `active` if any arrived since the last call
    fn drain_into(&self, active: &mut Vec<Client>) {
        if self.ready.swap(false, Ordering::AcqRel) {
            let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
            active.append(&mut clients);
        }
    }
}

fn accept_loop(
    name: &str,
    listener: &TcpListener,
    staging: &Staging,
    blocking: bool,
    stop: &StopSignal,
) {
    while !stop.is_stopped() {
        match listener.accept() {
            Ok((stream, peer)) => {
                if stop.is_stopped() {
                    break;
                }
                match Client::new(stream, peer, blocking) {
                    Ok(client) => {
                        info!(sink = %name, peer = %peer, "Client connected");
                        staging.push(client);
                    }
                    Err(e) => warn!(sink = %name, peer = %peer, error = %e, "Client setup failed"),
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(sink = %name, error = %e, "Accept failed");
                stop.wait(ACCEPT_RETRY_DELAY);
            }
        }
    }
    debug!(sink = %name, "Acceptor stopped");
}

/// Bind on every local address: dual-stack IPv6 when available, IPv4 otherwise
fn bind_all(port: u16) -> io::Result<TcpListener> {
    TcpListener::bind((Ipv6Addr::UNSPECIFIED, port)).or_else(|e| {
        debug!(port, error = %e, "IPv6 bind failed, falling back to IPv4");
        TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
    })
}

/// Sink that serves records to every connected TCP client
pub struct ServerSink {
    name: String,
    local_addr: SocketAddr,
    clients: Vec<Client>,
    staging: Arc<Staging>,
    acceptor: Option<WorkerHandle>,
}

impl ServerSink {
    /// Bind the listening socket and start accepting clients
    #[instrument(name = "server_sink_new", skip(name, config), fields(port = config.port))]
    pub fn new(name: impl Into<String>, config: &ServerSinkConfig) -> Result<Self, ContractError> {
        let name = name.into();
        let listener = bind_all(config.port).map_err(|e| {
            ContractError::sink_connection(&name, format!("cannot bind port {}: {e}", config.port))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?;

        let staging = Arc::new(Staging::default());
        let blocking = config.blocking;
        let worker_name = name.clone();
        let worker_staging = Arc::clone(&staging);
        let loopback = if local_addr.is_ipv6() {
            IpAddr::V6(Ipv6Addr::LOCALHOST)
        } else {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        };
        let wake_addr = SocketAddr::new(loopback, local_addr.port());
        let waker_name = name.clone();

        let acceptor = WorkerHandle::spawn(format!("{name}-accept"), move |stop| {
            accept_loop(&worker_name, &listener, &worker_staging, blocking, &stop);
        })
        .map_err(|e| ContractError::sink_connection(&name, format!("cannot start acceptor: {e}")))?
        // accept() only returns once a connection arrives
        .with_waker(move || {
            if let Err(e) = TcpStream::connect_timeout(&wake_addr, WAKE_TIMEOUT) {
                warn!(
                    sink = %waker_name,
                    addr = %wake_addr,
                    error = %e,
                    "Cannot wake acceptor, shutdown may hang"
                );
            }
        });

        info!(sink = %name, addr = %local_addr, blocking, "ServerSink listening");

        Ok(Self {
            name,
            local_addr,
            clients: Vec::new(),
            staging,
            acceptor: Some(acceptor),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of clients taking part in delivery
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Offer `message` to every client, dropping the ones that failed
    ///
    /// Returns how many clients received the whole message.
    fn broadcast(&mut self, message: &[u8]) -> usize {
        self.staging.drain_into(&mut self.clients);

        let name = &self.name;
        let mut sent = 0;
        self.clients.retain_mut(|client| {
            match client.outbound.send(&mut client.stream, message) {
                SendStatus::Sent => {
                    sent += 1;
                    true
                }
                SendStatus::WouldBlock => true,
                SendStatus::Failed(e) => {
                    info!(sink = %name, peer = %client.peer, error = %e, "Client disconnected");
                    false
                }
            }
        });
        sent
    }
}

impl DataSink for ServerSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&mut self, record: &FormattedRecord) -> Result<Delivery, ContractError> {
        if self.broadcast(record) > 0 {
            Ok(Delivery::Delivered)
        } else {
            Ok(Delivery::Skipped)
        }
    }

    fn flush(&mut self) {
        // An empty message only pushes out pending remainders
        self.broadcast(&[]);
    }

    #[instrument(name = "server_sink_close", skip(self), fields(sink = %self.name))]
    fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut acceptor) = self.acceptor.take() {
            acceptor.shutdown();
        }
        self.staging.drain_into(&mut self.clients);
        for client in self.clients.drain(..) {
            let _ = client.stream.shutdown(Shutdown::Both);
        }
        debug!(sink = %self.name, "ServerSink closed");
        Ok(())
    }
}

impl Drop for ServerSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::thread;
    use std::time::Instant;

    fn server() -> ServerSink {
        ServerSink::new(
            "feed",
            &ServerSinkConfig {
                port: 0,
                blocking: false,
            },
        )
        .unwrap()
    }

    fn connect(sink: &ServerSink) -> TcpStream {
        TcpStream::connect((Ipv4Addr::LOCALHOST, sink.local_addr().port())).unwrap()
    }

    /// Deliver until a staged client has been merged
    fn deliver_until_clients(sink: &mut ServerSink, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.client_count() < count {
            assert!(Instant::now() < deadline, "client was never picked up");
            sink.flush();
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_no_clients_skips() {
        let mut sink = server();
        assert_eq!(
            sink.deliver(&FormattedRecord::from("a\n")).unwrap(),
            Delivery::Skipped
        );
        sink.close().unwrap();
    }

    #[test]
    fn test_staged_client_receives_records() {
        let mut sink = server();
        let client = connect(&sink);
        deliver_until_clients(&mut sink, 1);

        assert_eq!(
            sink.deliver(&FormattedRecord::from("1,2,3\n")).unwrap(),
            Delivery::Delivered
        );

        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut line = String::new();
        BufReader::new(client).read_line(&mut line).unwrap();
        assert_eq!(line, "1,2,3\n");
        sink.close().unwrap();
    }

    #[test]
    fn test_ipv4_and_ipv6_clients_are_accepted() {
        let mut sink = server();
        let v4 = connect(&sink);
        let v6 = TcpStream::connect_timeout(
            &SocketAddr::from((Ipv6Addr::LOCALHOST, sink.local_addr().port())),
            Duration::from_secs(5),
        )
        .unwrap();
        deliver_until_clients(&mut sink, 2);

        assert_eq!(
            sink.deliver(&FormattedRecord::from("both\n")).unwrap(),
            Delivery::Delivered
        );
        for client in [v4, v6] {
            client
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();
            let mut line = String::new();
            BufReader::new(client).read_line(&mut line).unwrap();
            assert_eq!(line, "both\n");
        }
        sink.close().unwrap();
    }

    #[test]
    fn test_slow_client_stays_bounded() {
        let mut sink = server();
        let _stalled = connect(&sink);
        deliver_until_clients(&mut sink, 1);

        let message = FormattedRecord::from("x".repeat(64 * 1024));
        let started = Instant::now();
        let mut skipped = 0;
        for _ in 0..1000 {
            if sink.deliver(&message).unwrap() == Delivery::Skipped {
                skipped += 1;
            }
            assert!(sink.clients[0].outbound.pending_len() < message.len());
        }

        // 64 MB never fits the socket buffers of a client that does not read
        assert!(skipped > 0);
        assert_eq!(sink.client_count(), 1);
        assert!(started.elapsed() < Duration::from_secs(10));
        sink.close().unwrap();
    }

    #[test]
    fn test_disconnected_client_is_removed() {
        let mut sink = server();
        let client = connect(&sink);
        deliver_until_clients(&mut sink, 1);
        drop(client);

        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.client_count() > 0 {
            assert!(Instant::now() < deadline, "client was never removed");
            let _ = sink.deliver(&FormattedRecord::from("ping\n")).unwrap();
            thread::sleep(Duration::from_millis(10));
        }
        sink.close().unwrap();
    }

    #[test]
    fn test_close_stops_acceptor() {
        let mut sink = server();
        sink.close().unwrap();
        assert!(sink.acceptor.is_none());
        sink.close().unwrap();
    }
}
