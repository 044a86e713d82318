//! # Integration Tests
//!
//! End-to-end tests across crates.
//!
//! Covers:
//! - contract snapshot checks
//! - config -> formatter -> dispatcher -> sinks
//! - fan-out behaviour with real sockets and files

#[cfg(test)]
mod contract_tests {
    use contracts::{FormattedRecord, SparseIdMap};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_formatted_record_is_shared() {
        let record = FormattedRecord::from("a,b\n");
        let copy = record.clone();
        assert_eq!(record.as_bytes().as_ptr(), copy.as_bytes().as_ptr());
    }

    #[test]
    fn test_sparse_map_covers_id_space() {
        let mut map = SparseIdMap::new();
        map.insert(0, "first");
        map.insert(u16::MAX, "last");
        assert_eq!(map.get(u16::MAX), Some(&"last"));
        assert_eq!(map.table_count(), 2);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::fs;
    use std::io::{self, Read, Write};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream, UdpSocket};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        Compression, DataSink, Delivery, FieldValue, FileSinkConfig, FlowRecord, FormatConfig,
        FormattedRecord, NetworkSinkConfig, RecordFormatter, ServerSinkConfig, TransportProtocol,
    };
    use dispatcher::{
        create_dispatcher, ConsoleSink, Dispatcher, FileSink, ManualClock, NetworkSink, ServerSink,
    };
    use formatter::DsvFormatter;
    use observability::DeliveryAggregator;

    /// Console stand-in that keeps everything written to it
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn synthetic_record(i: u8) -> FlowRecord {
        FlowRecord::new()
            .with(8, FieldValue::Ip(IpAddr::V4(Ipv4Addr::new(192, 168, 0, i))))
            .with(12, FieldValue::Ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))))
            .with(7, FieldValue::Unsigned(40_000 + i as u64))
            .with(11, FieldValue::Unsigned(443))
            .with(4, FieldValue::Unsigned(6))
            .with(6, FieldValue::Unsigned(0x12))
            .with(82, FieldValue::Str(format!("eth{i}, uplink")))
            .with(152, FieldValue::TimestampMs(1_700_000_000_000 + i as i64))
    }

    fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    found.push(path);
                }
            }
        }
        found
    }

    /// 10 records through Console + File(60s) land in one file, byte-identical
    /// to formatting each record directly
    #[test]
    fn test_e2e_console_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let formatter = DsvFormatter::with_iana(FormatConfig::default());

        let mut expected = Vec::new();
        for i in 0..10 {
            let mut buf = bytes::BytesMut::new();
            formatter.format(&synthetic_record(i), &mut buf);
            expected.extend_from_slice(&buf);
        }

        let console = Captured::default();
        let file = FileSink::with_clock(
            "archive",
            &FileSinkConfig {
                path_pattern: format!("{}/%Y/%m/%d/", dir.path().display()),
                prefix: "flows.".to_string(),
                window_size: 60,
                window_align: true,
                compression: Compression::None,
                rotation_tick_ms: 10,
            },
            Arc::new(ManualClock::new(1_700_000_000)),
        )
        .unwrap();

        let mut dispatcher = Dispatcher::new(formatter);
        dispatcher.register_sink(ConsoleSink::with_writer("screen", console.clone()));
        dispatcher.register_sink(file);

        let mut aggregator = DeliveryAggregator::new();
        for i in 0..10 {
            let formatted = dispatcher.format(&synthetic_record(i));
            let report = dispatcher.deliver_formatted(&formatted).unwrap();
            assert_eq!(report.delivered, 2);
            aggregator.update(formatted.len(), report.delivered, report.skipped, 0.0);
        }
        dispatcher.shutdown().unwrap();

        let files = files_under(dir.path());
        assert_eq!(files.len(), 1, "files: {files:?}");
        assert!(files[0].ends_with("2023/11/14/flows.202311142213"));
        assert_eq!(fs::read(&files[0]).unwrap(), expected);
        assert_eq!(console.contents(), expected);

        let text = String::from_utf8(expected).unwrap();
        assert_eq!(text.lines().count(), 10);
        assert!(text.starts_with(
            "192.168.0.0,10.0.0.1,40000,443,TCP,...A..S.,\"eth0, uplink\",2023-11-14T22:13:20.000Z\n"
        ));
        assert_eq!(aggregator.summary().total_delivered, 20);
    }

    /// A draining and a stalled client over 1000 deliveries
    #[test]
    fn test_e2e_server_slow_client() {
        const DELIVERIES: usize = 1000;
        const MESSAGE_SIZE: usize = 16 * 1024;

        let mut server = ServerSink::new(
            "live",
            &ServerSinkConfig {
                port: 0,
                blocking: false,
            },
        )
        .unwrap();
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, server.local_addr().port()));

        let draining = TcpStream::connect(addr).unwrap();
        let stalled = TcpStream::connect(addr).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while server.client_count() < 2 {
            assert!(Instant::now() < deadline, "clients were never picked up");
            server.flush();
            thread::sleep(Duration::from_millis(10));
        }

        let received = Arc::new(AtomicU64::new(0));
        let reader = {
            let received = Arc::clone(&received);
            let mut stream = draining;
            thread::spawn(move || {
                let mut buf = vec![0u8; 64 * 1024];
                loop {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let lines = buf[..n].iter().filter(|&&b| b == b'\n').count();
                            received.fetch_add(lines as u64, Ordering::Release);
                        }
                    }
                }
            })
        };

        let mut line = vec![b'x'; MESSAGE_SIZE - 1];
        line.push(b'\n');
        let message = FormattedRecord::from(bytes::Bytes::from(line));

        let mut dispatcher = Dispatcher::new(DsvFormatter::with_iana(FormatConfig::default()));
        dispatcher.register_sink(server);

        let mut blocked = Duration::ZERO;
        let mut slowest = Duration::ZERO;
        for i in 0..DELIVERIES {
            let started = Instant::now();
            let report = dispatcher.deliver_formatted(&message).unwrap();
            let took = started.elapsed();
            blocked += took;
            slowest = slowest.max(took);
            assert_eq!(report.delivered, 1);

            // Let the draining client keep up so it never loses a message
            let deadline = Instant::now() + Duration::from_secs(5);
            while received.load(Ordering::Acquire) < i as u64 + 1 {
                assert!(Instant::now() < deadline, "draining client stalled at {i}");
                thread::yield_now();
            }
        }

        assert_eq!(received.load(Ordering::Acquire), DELIVERIES as u64);
        assert!(slowest < Duration::from_secs(1), "slowest delivery {slowest:?}");
        assert!(blocked < Duration::from_secs(10), "total blocking {blocked:?}");

        dispatcher.shutdown().unwrap();
        reader.join().unwrap();

        // Whatever the kernel buffered for the stalled client is all it gets
        let mut stalled = stalled;
        stalled
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut stalled_bytes = Vec::new();
        let _ = stalled.read_to_end(&mut stalled_bytes);
        let stalled_lines = stalled_bytes.iter().filter(|&&b| b == b'\n').count();
        assert!(stalled_lines < DELIVERIES, "stalled client got {stalled_lines}");
    }

    /// Configuration text to working sinks
    #[test]
    fn test_e2e_config_to_dispatcher() {
        let dir = tempfile::tempdir().unwrap();
        let receiver = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let udp_port = receiver.local_addr().unwrap().port();

        let config = format!(
            r#"
[format]
delimiter = ";"
timestamp = "unix"

[[sinks]]
name = "archive"
sink_type = "file"
path_pattern = "{dir}/"
prefix = "flows."
window_size = 0

[[sinks]]
name = "collector"
sink_type = "network"
addr = "127.0.0.1"
port = {udp_port}
protocol = "udp"
"#,
            dir = dir.path().display()
        );

        let blueprint = ConfigLoader::load_from_str(&config, ConfigFormat::Toml).unwrap();
        let formatter = DsvFormatter::with_iana(blueprint.format.clone());
        let mut dispatcher = create_dispatcher(&blueprint.sinks, formatter).unwrap();
        assert_eq!(dispatcher.sink_count(), 2);

        let record = FlowRecord::new()
            .with(8, FieldValue::Ip(IpAddr::V4(Ipv4Addr::new(10, 1, 1, 1))))
            .with(4, FieldValue::Unsigned(17))
            .with(152, FieldValue::TimestampMs(1_700_000_000_123));
        let report = dispatcher.deliver(&record).unwrap();
        assert_eq!(report.delivered, 2);

        let mut buf = [0u8; 256];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"10.1.1.1;UDP;1700000000123\n");

        let metrics = dispatcher.metrics();
        assert_eq!(metrics[0].0, "archive");
        assert_eq!(metrics[1].1.delivered_count, 1);
        dispatcher.shutdown().unwrap();

        let files = files_under(dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(
            fs::read_to_string(&files[0]).unwrap(),
            "10.1.1.1;UDP;1700000000123\n"
        );
    }

    /// A collector that comes up late is picked up after the retry interval
    #[test]
    fn test_e2e_late_collector() {
        let port = {
            let placeholder = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
            placeholder.local_addr().unwrap().port()
        };

        let mut sink = NetworkSink::new(
            "collector",
            &NetworkSinkConfig {
                addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
                port,
                protocol: TransportProtocol::Tcp,
                blocking: false,
                reconnect_interval_secs: 1,
                connect_timeout_ms: 500,
            },
        )
        .unwrap();
        let record = FormattedRecord::from("late\n");
        assert_eq!(sink.deliver(&record).unwrap(), Delivery::Skipped);

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).unwrap();
        thread::sleep(Duration::from_millis(1100));
        assert_eq!(sink.deliver(&record).unwrap(), Delivery::Delivered);
        assert_eq!(sink.connect_attempts(), 2);

        let (mut peer, _) = listener.accept().unwrap();
        peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut buf = [0u8; 5];
        peer.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"late\n");
        sink.close().unwrap();
    }
}
