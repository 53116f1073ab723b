use anyhow::{Context, Result};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

/// Print every received byte as `0x..` on its own line until stopped.
///
/// Read timeouts are retried; end of stream ends the echo.
pub fn echo<R: Read, O: Write>(port: &mut R, out: &mut O, running: &AtomicBool) -> Result<u64> {
    let mut byte = [0u8; 1];
    let mut received = 0u64;

    while running.load(Ordering::Relaxed) {
        match port.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                writeln!(out, "0x{:02x}", byte[0])?;
                received += 1;
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => continue,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("Failed to read from serial port"),
        }
    }

    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    #[test]
    fn test_one_line_per_byte() {
        let mut port = Cursor::new(vec![0x1f, 0xd0, 0x00]);
        let mut out = Vec::new();
        let running = AtomicBool::new(true);

        let n = echo(&mut port, &mut out, &running).unwrap();
        assert_eq!(n, 3);
        assert_eq!(String::from_utf8(out).unwrap(), "0x1f\n0xd0\n0x00\n");
    }

    #[test]
    fn test_stopped_reads_nothing() {
        let mut port = Cursor::new(vec![0xaa]);
        let mut out = Vec::new();
        let running = AtomicBool::new(false);

        assert_eq!(echo(&mut port, &mut out, &running).unwrap(), 0);
        assert!(out.is_empty());
    }

    /// Times out once, yields one byte, then fails
    struct Flaky {
        calls: usize,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.calls += 1;
            match self.calls {
                1 => Err(io::Error::new(ErrorKind::TimedOut, "timeout")),
                2 => {
                    buf[0] = 0xab;
                    Ok(1)
                }
                _ => Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged")),
            }
        }
    }

    #[test]
    fn test_timeout_retried_then_error_propagates() {
        let mut port = Flaky { calls: 0 };
        let mut out = Vec::new();
        let running = AtomicBool::new(true);

        let err = echo(&mut port, &mut out, &running).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
        assert_eq!(String::from_utf8(out).unwrap(), "0xab\n");
    }
}
