use rustix::pipe::{pipe_with, PipeFlags};
use serial_cancel::device::Port;
use serial_cancel::{raw, Error};
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn pipe_ports() -> (Port, Port) {
    let (rx, tx) = pipe_with(PipeFlags::CLOEXEC).unwrap();
    (Port::from_fd(rx).unwrap(), Port::from_fd(tx).unwrap())
}

#[test]
fn hello_round_trip() {
    let (b, a) = pipe_ports();
    assert_eq!(a.write(b"Hello", Duration::from_millis(100), 0).unwrap(), 5);

    let mut buf = [0u8; 10];
    let n = b.read(&mut buf, Duration::from_millis(100), 0).unwrap();
    assert_eq!(n, 5);
    assert_eq!(&buf[..n], b"Hello");
}

#[test]
fn read_timeout_is_not_an_error() {
    let (b, _a) = pipe_ports();
    let mut buf = [0u8; 10];
    let start = Instant::now();
    assert_eq!(b.read(&mut buf, Duration::from_millis(100), 0).unwrap(), 0);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(95), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(600), "{:?}", elapsed);
}

#[test]
fn abort_unblocks_long_read() {
    let (b, _a) = pipe_ports();
    let b = Arc::new(b);

    let reader = thread::spawn({
        let b = Arc::clone(&b);
        move || {
            let mut buf = [0u8; 10];
            let start = Instant::now();
            let res = b.read(&mut buf, Duration::from_millis(10_000), 1);
            (res, start.elapsed())
        }
    });

    thread::sleep(Duration::from_millis(50));
    b.abort_read().unwrap();

    let (res, elapsed) = reader.join().unwrap();
    assert!(matches!(res, Err(Error::AbortedRead)));
    assert!(elapsed < Duration::from_secs(2), "{:?}", elapsed);
}

#[test]
fn abort_during_accumulation_discards_partial_data() {
    let (b, a) = pipe_ports();
    let b = Arc::new(b);
    a.write(b"ab", Duration::from_millis(100), 0).unwrap();

    let reader = thread::spawn({
        let b = Arc::clone(&b);
        move || {
            let mut buf = [0u8; 10];
            let start = Instant::now();
            let res = b.read(&mut buf, Duration::from_millis(5000), 1);
            (res, start.elapsed())
        }
    });

    thread::sleep(Duration::from_millis(50));
    b.abort_read().unwrap();

    let (res, elapsed) = reader.join().unwrap();
    assert!(matches!(res, Err(Error::AbortedRead)), "{:?}", res);
    assert!(elapsed < Duration::from_secs(1), "{:?}", elapsed);
}

#[test]
fn abort_handle_unblocks_long_write() {
    let (_b, a) = pipe_ports();
    let aborter = a.abort_handle();
    let data = vec![0xA5u8; 1 << 20];

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        aborter.abort_write().unwrap();
    });

    let start = Instant::now();
    let res = a.write(&data, Duration::from_millis(10_000), 1);
    assert!(matches!(res, Err(Error::AbortedWrite)));
    assert!(start.elapsed() < Duration::from_secs(2));
    canceller.join().unwrap();
}

#[test]
fn abort_wins_over_ready_data() {
    let (b, a) = pipe_ports();
    a.write(b"late", Duration::from_millis(100), 0).unwrap();
    b.abort_read().unwrap();

    let mut buf = [0u8; 8];
    assert!(matches!(
        b.read(&mut buf, Duration::from_millis(100), 0),
        Err(Error::AbortedRead)
    ));
    // the data was not consumed by the aborted call
    let n = b.read(&mut buf, Duration::from_millis(100), 0).unwrap();
    assert_eq!(&buf[..n], b"late");
}

#[test]
fn double_abort_yields_one_aborted_outcome() {
    let (b, _a) = pipe_ports();
    b.abort_read().unwrap();
    b.abort_read().unwrap();

    let mut buf = [0u8; 4];
    assert!(matches!(
        b.read(&mut buf, Duration::from_millis(50), 0),
        Err(Error::AbortedRead)
    ));
    assert_eq!(b.read(&mut buf, Duration::from_millis(50), 0).unwrap(), 0);
}

#[test]
fn read_abort_does_not_affect_writes() {
    let (b, a) = pipe_ports();
    a.abort_read().unwrap();
    assert_eq!(a.write(b"x", Duration::from_millis(50), 0).unwrap(), 1);

    let mut buf = [0u8; 1];
    assert_eq!(b.read(&mut buf, Duration::from_millis(50), 0).unwrap(), 1);
}

#[test]
fn partial_write_loop_completes_with_slow_reader() {
    let (b, a) = pipe_ports();
    let data: Vec<u8> = (0..=255u8).cycle().take(256 * 1024).collect();

    let reader = thread::spawn(move || {
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        while received.len() < 256 * 1024 {
            let n = b.read(&mut buf, Duration::from_millis(2000), 0).unwrap();
            assert!(n > 0);
            received.extend_from_slice(&buf[..n]);
            thread::sleep(Duration::from_millis(1));
        }
        received
    });

    let written = a.write(&data, Duration::from_millis(2000), 1).unwrap();
    assert_eq!(written, data.len());
    assert_eq!(a.tx_bytes(), data.len() as u64);
    assert_eq!(reader.join().unwrap(), data);
}

#[test]
fn tight_deadline_gives_consistent_partial_count() {
    let (b, a) = pipe_ports();
    let data = vec![7u8; 1 << 20];
    let written = a.write(&data, Duration::from_millis(20), 0).unwrap();
    assert!(written > 0 && written < data.len());
    assert_eq!(b.bytes_waiting().unwrap(), written);
}

#[test]
fn concurrent_read_and_write_on_one_port() {
    let (sock_a, sock_b) = UnixStream::pair().unwrap();
    let a = Arc::new(Port::from_fd(OwnedFd::from(sock_a)).unwrap());
    let b = Port::from_fd(OwnedFd::from(sock_b)).unwrap();

    let reader = thread::spawn({
        let a = Arc::clone(&a);
        move || {
            let mut buf = [0u8; 4];
            let n = a.read(&mut buf, Duration::from_millis(2000), 1).unwrap();
            buf[..n].to_vec()
        }
    });

    thread::sleep(Duration::from_millis(20));
    assert_eq!(a.write(b"ping", Duration::from_millis(200), 0).unwrap(), 4);
    let mut buf = [0u8; 4];
    assert_eq!(b.read(&mut buf, Duration::from_millis(200), 1).unwrap(), 4);
    assert_eq!(&buf, b"ping");

    b.write(b"pong", Duration::from_millis(200), 0).unwrap();
    assert_eq!(reader.join().unwrap(), b"pong");
}

#[test]
fn raw_surface_register_and_unregister() {
    let (rx, tx) = pipe_with(PipeFlags::NONBLOCK | PipeFlags::CLOEXEC).unwrap();
    raw::register(&rx).unwrap();
    raw::register(&rx).unwrap();
    raw::register(&tx).unwrap();

    assert_eq!(raw::write(&tx, b"raw", Duration::from_millis(100), 0).unwrap(), 3);
    let mut buf = [0u8; 8];
    let n = raw::read(&rx, &mut buf, Duration::from_millis(100), 0).unwrap();
    assert_eq!(&buf[..n], b"raw");

    raw::abort_read(&rx).unwrap();
    assert!(matches!(
        raw::read(&rx, &mut buf, Duration::from_millis(100), 0),
        Err(Error::AbortedRead)
    ));

    raw::unregister(&rx);
    raw::unregister(&rx);
    raw::unregister(&tx);
    assert!(matches!(
        raw::read(&rx, &mut buf, Duration::from_millis(10), 0),
        Err(Error::InvalidHandle)
    ));
    assert!(matches!(raw::abort_write(&tx), Err(Error::InvalidHandle)));
}

#[test]
fn raw_surface_accepts_ports() {
    let (b, a) = pipe_ports();
    raw::abort_read(&b).unwrap();
    let mut buf = [0u8; 1];
    assert!(matches!(
        b.read(&mut buf, Duration::from_millis(100), 0),
        Err(Error::AbortedRead)
    ));
    drop(a);
}
