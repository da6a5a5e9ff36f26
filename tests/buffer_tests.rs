use quickserve::buffer::Buffer;
use std::io::{self, Write};

#[test]
fn test_buffer_creation() {
    let buffer = Buffer::new(1024);
    assert_eq!(buffer.capacity(), 1024);
    assert_eq!(buffer.available_data(), 0);
}

#[test]
fn test_write_then_drain() {
    let mut buffer = Buffer::new(16);
    buffer.write(b"hello world");
    assert_eq!(buffer.available_data(), 11);
    assert_eq!(buffer.slice(), b"hello world");

    let mut out = Vec::new();
    let n = buffer.write_to(&mut out).unwrap();
    assert_eq!(n, 11);
    assert_eq!(out, b"hello world");
    assert_eq!(buffer.available_data(), 0);
}

#[test]
fn test_write_grows_past_initial_capacity() {
    let mut buffer = Buffer::new(4);
    buffer.write(b"0123456789");
    assert_eq!(buffer.available_data(), 10);
    assert!(buffer.capacity() >= 10);
    assert_eq!(buffer.slice(), b"0123456789");
}

#[test]
fn test_interleaved_writes_and_drains() {
    let mut buffer = Buffer::new(8);
    buffer.write(b"abc");
    buffer.write(b"def");

    let mut out = Vec::new();
    buffer.write_to(&mut out).unwrap();
    assert_eq!(out, b"abcdef");

    buffer.write(b"ghi");
    assert_eq!(buffer.slice(), b"ghi");
}

/// A writer that only takes a few bytes per call, like a socket whose
/// send buffer is nearly full
struct Trickle {
    taken: Vec<u8>,
    per_call: usize,
}

impl Write for Trickle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(self.per_call);
        self.taken.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_partial_writes_advance_cursor() {
    let mut buffer = Buffer::new(32);
    buffer.write(b"chunked transfer");

    let mut sink = Trickle {
        taken: Vec::new(),
        per_call: 5,
    };

    while buffer.available_data() > 0 {
        buffer.write_to(&mut sink).unwrap();
    }

    assert_eq!(sink.taken, b"chunked transfer");
}

#[test]
fn test_reset_discards_pending_data() {
    let mut buffer = Buffer::new(8);
    buffer.write(b"stale");
    buffer.reset();
    assert_eq!(buffer.available_data(), 0);

    let mut out = Vec::new();
    assert_eq!(buffer.write_to(&mut out).unwrap(), 0);
}
