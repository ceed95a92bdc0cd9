//! Integration tests for the client reactor.
//!
//! The device is either a `tokio_test` script of raw records or an idle
//! in-memory pipe; the server is the far end of a `tokio::io::duplex` pair or
//! a `tokio_test` script when write behaviour matters.

use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use keysound_client::application::play_commands::{DispatchError, PlaybackSink};
use keysound_client::infrastructure::reactor::{
    ClientReactor, ReactorConfig, ReactorError, ReactorState, Termination,
};
use keysound_core::{InputEvent, LumpIndex};
use mockall::{mock, predicate::eq, Sequence};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

mock! {
    pub Sink {}
    impl PlaybackSink for Sink {
        fn play(&self, index: LumpIndex) -> Result<(), DispatchError>;
    }
}

/// Records every requested index.
#[derive(Default)]
struct RecordingSink {
    played: Mutex<Vec<LumpIndex>>,
}

impl PlaybackSink for RecordingSink {
    fn play(&self, index: LumpIndex) -> Result<(), DispatchError> {
        self.played.lock().unwrap().push(index);
        Ok(())
    }
}

fn config() -> ReactorConfig {
    ReactorConfig {
        poll_interval: Duration::from_millis(10),
        ..Default::default()
    }
}

fn running() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(true))
}

#[tokio::test]
async fn test_press_release_autorepeat_sends_two_frames() {
    // Arrange
    let device = tokio_test::io::Builder::new()
        .read(&InputEvent::key(30, 1).to_bytes())
        .read(&InputEvent::key(30, 0).to_bytes())
        .read(&InputEvent::key(30, 2).to_bytes())
        .build();
    let (network, mut server) = duplex(64);
    let sink: Arc<dyn PlaybackSink> = Arc::new(RecordingSink::default());
    let mut reactor = ClientReactor::from_parts(device, network, config(), sink, running());

    // Act – the script ends in end-of-file, which is a short read
    let result = reactor.run().await;

    // Assert
    assert!(matches!(result, Err(ReactorError::DeviceShortRead { got: 0 })));
    assert_eq!(reactor.stats().frames_sent, 2);
    let mut wire = Vec::new();
    server.read_to_end(&mut wire).await.unwrap();
    assert_eq!(wire, vec![254, 30, 255, 30]);
}

#[tokio::test]
async fn test_non_key_records_between_keys_are_ignored() {
    let syn = InputEvent {
        event_type: 0,
        ..InputEvent::key(0, 0)
    };
    let device = tokio_test::io::Builder::new()
        .read(&InputEvent::key(16, 1).to_bytes())
        .read(&syn.to_bytes())
        .read(&InputEvent::key(16, 7).to_bytes())
        .read(&InputEvent::key(16, 0).to_bytes())
        .build();
    let (network, mut server) = duplex(64);
    let mut reactor = ClientReactor::from_parts(
        device,
        network,
        config(),
        Arc::new(RecordingSink::default()),
        running(),
    );

    let _ = reactor.run().await;

    let mut wire = Vec::new();
    server.read_to_end(&mut wire).await.unwrap();
    assert_eq!(wire, vec![254, 16, 255, 16]);
}

#[tokio::test]
async fn test_two_commands_in_one_read_play_in_order() {
    // Arrange
    let mut sink = MockSink::new();
    let mut seq = Sequence::new();
    sink.expect_play()
        .with(eq(LumpIndex(11)))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    sink.expect_play()
        .with(eq(LumpIndex(21)))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));

    let (device, _device_writer) = duplex(64);
    let (network, mut server) = duplex(64);
    server.write_all(b"P10\nP20\n").await.unwrap();
    drop(server);

    let mut reactor = ClientReactor::from_parts(device, network, config(), Arc::new(sink), running());

    // Act
    let report = reactor.run().await.expect("peer close is a clean end");

    // Assert
    assert_eq!(report.termination, Termination::PeerClosed);
    assert_eq!(report.stats.commands_dispatched, 2);
}

#[tokio::test]
async fn test_command_split_across_reads_is_reassembled() {
    // Arrange
    let sink = Arc::new(RecordingSink::default());
    let (device, _device_writer) = duplex(64);
    let (network, mut server) = duplex(64);
    let mut reactor =
        ClientReactor::from_parts(device, network, config(), sink.clone(), running());

    // Act
    let server_task = tokio::spawn(async move {
        server.write_all(b"P1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        server.write_all(b"0\nP2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        server.write_all(b"0\n").await.unwrap();
    });
    let report = reactor.run().await.unwrap();
    server_task.await.unwrap();

    // Assert
    assert_eq!(report.termination, Termination::PeerClosed);
    assert_eq!(
        *sink.played.lock().unwrap(),
        vec![LumpIndex(11), LumpIndex(21)]
    );
}

#[tokio::test]
async fn test_garbage_lines_are_skipped() {
    let sink = Arc::new(RecordingSink::default());
    let (device, _device_writer) = duplex(64);
    let (network, mut server) = duplex(256);
    server.write_all(b"hello\nP5x\nP5\n").await.unwrap();
    drop(server);
    let mut reactor =
        ClientReactor::from_parts(device, network, config(), sink.clone(), running());

    let report = reactor.run().await.unwrap();

    assert_eq!(*sink.played.lock().unwrap(), vec![LumpIndex(6)]);
    assert_eq!(report.stats.lines_ignored, 2);
}

#[tokio::test]
async fn test_refused_playback_does_not_end_session() {
    // Arrange
    let mut sink = MockSink::new();
    sink.expect_play()
        .times(2)
        .returning(|_| Err(DispatchError::Stopped));
    let (device, _device_writer) = duplex(64);
    let (network, mut server) = duplex(64);
    server.write_all(b"P1\nP2\n").await.unwrap();
    drop(server);
    let mut reactor = ClientReactor::from_parts(device, network, config(), Arc::new(sink), running());

    // Act
    let report = reactor.run().await.unwrap();

    // Assert
    assert_eq!(report.stats.commands_refused, 2);
    assert_eq!(report.termination, Termination::PeerClosed);
}

#[tokio::test]
async fn test_shutdown_flag_ends_idle_loop() {
    // Arrange
    let flag = running();
    let (device, _device_writer) = duplex(64);
    let (network, _server) = duplex(64);
    let mut reactor = ClientReactor::from_parts(
        device,
        network,
        config(),
        Arc::new(RecordingSink::default()),
        Arc::clone(&flag),
    );
    let clear = Arc::clone(&flag);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        clear.store(false, Ordering::Relaxed);
    });

    // Act
    let report = tokio::time::timeout(Duration::from_secs(2), reactor.run())
        .await
        .expect("loop must notice the flag within a few ticks")
        .unwrap();

    // Assert
    assert_eq!(report.termination, Termination::ShutdownRequested);
    assert_eq!(reactor.state(), ReactorState::Closed);
}

#[tokio::test]
async fn test_cleanup_runs_exactly_once() {
    // Arrange
    let (device, _device_writer) = duplex(64);
    let (network, mut server) = duplex(64);
    server.shutdown().await.unwrap();
    let mut reactor = ClientReactor::from_parts(
        device,
        network,
        config(),
        Arc::new(RecordingSink::default()),
        running(),
    );

    // Act
    let report = reactor.run().await.unwrap();

    // Assert – run already released everything
    assert_eq!(report.termination, Termination::PeerClosed);
    assert!(!reactor.close().await);
    assert!(matches!(
        reactor.run().await,
        Err(ReactorError::NotConnected(ReactorState::Closed))
    ));

    // The client side was shut down, so the server sees end of file.
    let mut rest = Vec::new();
    server.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_short_write_is_terminal() {
    // Arrange – the server accepts only the first byte of the frame
    let device = tokio_test::io::Builder::new()
        .read(&InputEvent::key(30, 1).to_bytes())
        .build();
    let network = tokio_test::io::Builder::new().write(&[254]).build();
    let mut reactor = ClientReactor::from_parts(
        device,
        network,
        config(),
        Arc::new(RecordingSink::default()),
        running(),
    );

    // Act
    let result = reactor.run().await;

    // Assert
    assert!(matches!(result, Err(ReactorError::ShortWrite { sent: 1 })));
    assert_eq!(reactor.state(), ReactorState::Closed);
}

#[tokio::test]
async fn test_write_error_is_terminal() {
    let device = tokio_test::io::Builder::new()
        .read(&InputEvent::key(30, 0).to_bytes())
        .build();
    let network = tokio_test::io::Builder::new()
        .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        .build();
    let mut reactor = ClientReactor::from_parts(
        device,
        network,
        config(),
        Arc::new(RecordingSink::default()),
        running(),
    );

    let result = reactor.run().await;

    assert!(matches!(result, Err(ReactorError::NetworkWrite(_))));
    assert_eq!(reactor.stats().frames_sent, 0);
}

#[tokio::test]
async fn test_network_read_error_is_terminal() {
    let (device, _device_writer) = duplex(64);
    let network = tokio_test::io::Builder::new()
        .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        .build();
    let mut reactor = ClientReactor::from_parts(
        device,
        network,
        config(),
        Arc::new(RecordingSink::default()),
        running(),
    );

    let result = reactor.run().await;

    assert!(matches!(result, Err(ReactorError::NetworkRead(_))));
    assert_eq!(reactor.state(), ReactorState::Closed);
}

#[tokio::test]
async fn test_connect_fails_when_device_is_missing() {
    // Arrange
    let cfg = ReactorConfig {
        device_path: "/nonexistent/keysound/event42".into(),
        ..config()
    };

    // Act
    let result = ClientReactor::connect(cfg, Arc::new(RecordingSink::default()), running()).await;

    // Assert
    assert!(matches!(result, Err(ReactorError::DeviceOpen { .. })));
}

#[tokio::test]
async fn test_connect_fails_when_server_is_unreachable() {
    // Arrange – a FIFO stands in for the device node; nothing listens on the port
    let fifo = std::env::temp_dir().join(format!("keysound-event-{}", std::process::id()));
    let _ = std::fs::remove_file(&fifo);
    let c_path = std::ffi::CString::new(fifo.to_string_lossy().as_bytes()).unwrap();
    assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let cfg = ReactorConfig {
        device_path: fifo.clone(),
        server_host: "127.0.0.1".into(),
        server_port: port,
        ..config()
    };

    // Act
    let result = ClientReactor::connect(cfg, Arc::new(RecordingSink::default()), running()).await;

    // Assert – the device was released: a non-blocking writer finds no reader
    assert!(matches!(result, Err(ReactorError::Connect { .. })));
    let reopened = std::fs::OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(&fifo);
    let _ = std::fs::remove_file(&fifo);
    let err = reopened.err().expect("no reader should hold the FIFO open");
    assert_eq!(err.raw_os_error(), Some(libc::ENXIO));
}

#[tokio::test]
async fn test_connect_then_forward_over_real_socket() {
    // Arrange
    let fifo = std::env::temp_dir().join(format!("keysound-live-{}", std::process::id()));
    let _ = std::fs::remove_file(&fifo);
    let c_path = std::ffi::CString::new(fifo.to_string_lossy().as_bytes()).unwrap();
    assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let sink = Arc::new(RecordingSink::default());
    let cfg = ReactorConfig {
        device_path: fifo.clone(),
        server_host: "127.0.0.1".into(),
        server_port: port,
        ..config()
    };

    // Act
    let (reactor, accepted) = tokio::join!(
        ClientReactor::connect(cfg, sink.clone(), running()),
        listener.accept()
    );
    let mut reactor = reactor.expect("connect");
    assert_eq!(reactor.state(), ReactorState::Connected);
    let (mut server, _) = accepted.unwrap();

    // Writing after the reactor opened the FIFO keeps it from seeing EOF early.
    let fifo_path = fifo.clone();
    let writer = tokio::task::spawn_blocking(move || {
        use std::io::Write;
        let mut w = std::fs::OpenOptions::new().write(true).open(fifo_path).unwrap();
        w.write_all(&InputEvent::key(30, 1).to_bytes()).unwrap();
        w
    });
    let mut frame = [0u8; 2];
    let run = tokio::spawn(async move {
        let result = reactor.run().await;
        (reactor, result)
    });
    server.read_exact(&mut frame).await.unwrap();
    server.write_all(b"P3\n").await.unwrap();
    drop(server);
    let (reactor, result) = run.await.unwrap();
    drop(writer.await.unwrap());

    // Assert
    assert_eq!(frame, [254, 30]);
    assert_eq!(result.unwrap().termination, Termination::PeerClosed);
    assert_eq!(reactor.state(), ReactorState::Closed);
    assert_eq!(*sink.played.lock().unwrap(), vec![LumpIndex(4)]);
    let _ = std::fs::remove_file(&fifo);
}
