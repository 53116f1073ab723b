use anyhow::{Context, Result};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::byte_source::ByteSource;
use crate::config::{EmitterConfig, InitConfig};
use crate::protocol::{Framer, PacketBuilder};

/// Longest single sleep, so a cleared running flag is noticed quickly
const SLEEP_SLICE: Duration = Duration::from_millis(10);

const STATS_PERIOD: Duration = Duration::from_secs(5);

/// Writes command packets to a transport on a fixed cadence
pub struct Emitter<W: Write, S: ByteSource> {
    port_name: String,
    port: W,
    source: S,
    builder: PacketBuilder,
    config: EmitterConfig,
    init: InitConfig,
    running: Arc<AtomicBool>,
    frames_sent: u64,
    bytes_sent: u64,
    debug: bool,
    ddebug: bool,
}

impl<W: Write, S: ByteSource> Emitter<W, S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        port_name: String,
        port: W,
        source: S,
        framer: Framer,
        config: EmitterConfig,
        init: InitConfig,
        debug: bool,
        ddebug: bool,
    ) -> Self {
        Emitter {
            port_name,
            port,
            source,
            builder: PacketBuilder::new(framer),
            config,
            init,
            running: Arc::new(AtomicBool::new(true)),
            frames_sent: 0,
            bytes_sent: 0,
            debug,
            ddebug,
        }
    }

    /// Get a clone of the running flag for signal handlers
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Number of bundles written by the loop
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Give back the transport
    #[cfg(test)]
    pub fn into_port(self) -> W {
        self.port
    }

    /// Send the init frame (if enabled), then bundles until stopped
    pub fn run(&mut self) -> Result<()> {
        if self.init.enabled && self.is_running() {
            self.send_init()?;
            self.pause(Duration::from_millis(self.init.pad_delay_ms));
        }

        if self.debug {
            println!("✓ Streaming packets to {} every {} ms", self.port_name, self.config.interval_ms);
            println!("(Press Ctrl-C to stop)");
        }

        let interval = Duration::from_millis(self.config.interval_ms);
        let mut last_stats = Instant::now();
        let mut last_frames = 0u64;

        while self.is_running() {
            if let Some(limit) = self.config.iterations {
                if self.frames_sent >= limit {
                    break;
                }
            }

            self.send_bulk()?;
            self.pause(interval);

            if self.debug && last_stats.elapsed() >= STATS_PERIOD {
                let elapsed = last_stats.elapsed().as_secs_f64();
                let fps = (self.frames_sent - last_frames) as f64 / elapsed;
                println!("[Stats] Sent: {:.1} fps, {} frames, {} bytes total",
                         fps, self.frames_sent, self.bytes_sent);
                last_stats = Instant::now();
                last_frames = self.frames_sent;
            }
        }

        Ok(())
    }

    /// One-shot fixed payload write, preceded by the optional noop pad
    pub fn send_init(&mut self) -> Result<()> {
        if self.init.noop_pad > 0 {
            let pad = vec![0u8; self.init.noop_pad];
            self.write(&pad)?;
        }

        match self.init.packet_delay_ms {
            Some(delay) => {
                let chunks = self.builder.init_chunks();
                if self.debug {
                    println!("Init: {:?}", chunks.concat());
                }
                self.write_chunks(&chunks, Duration::from_millis(delay))?;
            }
            None => {
                let frame = self.builder.build_init_frame();
                if self.debug {
                    println!("Init: {:?}", frame);
                }
                self.write(&frame)?;
            }
        }

        Ok(())
    }

    /// Build one bundle with fresh random payloads and write it
    pub fn send_bulk(&mut self) -> Result<()> {
        match self.config.packet_delay_ms {
            Some(delay) => {
                let packets = self.builder.random_packets(&mut self.source);
                self.write_chunks(&packets, Duration::from_millis(delay))?;
            }
            None => {
                let frame = self.builder.build_bulk_frame(&mut self.source);
                self.write(&frame)?;
            }
        }

        self.frames_sent += 1;
        Ok(())
    }

    fn write_chunks(&mut self, chunks: &[Vec<u8>], delay: Duration) -> Result<()> {
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                self.pause(delay);
            }
            self.write(chunk)?;
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.ddebug {
            let hex: String = bytes.iter()
                .map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ");
            eprintln!("[DEBUG {}] Sending {} bytes: {}", self.port_name, bytes.len(), hex);

            for (command, packet, valid) in self.builder.split(bytes) {
                eprintln!("[DEBUG {}]   {:<10} {:02x?}{}", self.port_name, command.name(), packet,
                          if valid { "" } else { " (bad crc)" });
            }
        }

        self.port.write_all(bytes)
            .context(format!("Failed to write to {}", self.port_name))?;
        self.port.flush()
            .context(format!("Failed to flush {}", self.port_name))?;

        self.bytes_sent += bytes.len() as u64;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Sleep for `duration`, returning early once the running flag is cleared
    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_source::SequenceBytes;
    use crate::protocol::packets::{Command, CRC_INDEX};
    use std::io;

    fn emitter<W: Write>(port: W, config: EmitterConfig, init: InitConfig) -> Emitter<W, SequenceBytes> {
        Emitter::new(
            "test".to_string(),
            port,
            SequenceBytes::counting(),
            Framer::autosar(),
            config,
            init,
            false,
            false,
        )
    }

    fn quick(iterations: u64) -> EmitterConfig {
        EmitterConfig {
            interval_ms: 0,
            packet_delay_ms: None,
            iterations: Some(iterations),
        }
    }

    fn no_init() -> InitConfig {
        InitConfig { enabled: false, ..InitConfig::default() }
    }

    /// Keeps every write as a separate buffer
    struct WriteLog {
        writes: Vec<Vec<u8>>,
    }

    impl Write for WriteLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Unplugged;

    impl Write for Unplugged {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_bulk_write_is_single_buffer() {
        let mut e = emitter(WriteLog { writes: Vec::new() }, quick(3), no_init());
        e.run().unwrap();
        assert_eq!(e.frames_sent(), 3);

        let log = e.into_port();
        assert_eq!(log.writes.len(), 3);
        assert!(log.writes.iter().all(|w| w.len() == 19));
    }

    #[test]
    fn test_bulk_payloads_change_each_iteration() {
        let mut e = emitter(WriteLog { writes: Vec::new() }, quick(2), no_init());
        e.run().unwrap();
        let log = e.into_port();
        assert_ne!(log.writes[0], log.writes[1]);
        // status never changes
        assert_eq!(log.writes[0][..4], log.writes[1][..4]);
    }

    #[test]
    fn test_init_then_loop() {
        let init = InitConfig { pad_delay_ms: 0, ..InitConfig::default() };
        let mut e = emitter(Vec::new(), quick(2), init);
        e.run().unwrap();

        let bytes = e.into_port();
        assert_eq!(bytes.len(), 21 + 2 * 19);
        assert_eq!(&bytes[..4], &[0xee, 0x00, 0x1f, 0xd0]);

        let builder = PacketBuilder::new(Framer::autosar());
        let packets = builder.split(&bytes);
        assert_eq!(packets.len(), 12);
        assert!(packets.iter().all(|(_, _, valid)| *valid));
    }

    #[test]
    fn test_noop_pad_precedes_init() {
        let init = InitConfig { noop_pad: 10, pad_delay_ms: 0, ..InitConfig::default() };
        let mut e = emitter(WriteLog { writes: Vec::new() }, quick(0), init);
        e.run().unwrap();

        let log = e.into_port();
        assert_eq!(log.writes.len(), 2);
        assert_eq!(log.writes[0], vec![0u8; 10]);
        assert_eq!(log.writes[1].len(), 21);
    }

    #[test]
    fn test_split_mode_writes_each_packet() {
        let config = EmitterConfig { packet_delay_ms: Some(0), ..quick(1) };
        let init = InitConfig { pad_delay_ms: 0, packet_delay_ms: Some(0), ..InitConfig::default() };
        let mut e = emitter(WriteLog { writes: Vec::new() }, config, init);
        e.run().unwrap();

        let log = e.into_port();
        let sizes: Vec<usize> = log.writes.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 4, 3, 5, 7, 4, 3, 5, 7]);

        let framer = Framer::autosar();
        for (write, command) in log.writes[5..].iter().zip(Command::ALL) {
            assert_eq!(write[0], command.opcode());
            assert!(framer.verify(write, CRC_INDEX));
        }
    }

    #[test]
    fn test_cleared_flag_stops_before_writing() {
        let mut e = emitter(Vec::new(), quick(5), InitConfig::default());
        e.get_running_flag().store(false, Ordering::Relaxed);
        e.run().unwrap();
        assert_eq!(e.frames_sent(), 0);
        assert!(e.into_port().is_empty());
    }

    #[test]
    fn test_write_error_is_fatal() {
        let mut e = emitter(Unplugged, quick(5), no_init());
        let err = e.run().unwrap_err();
        assert!(err.to_string().contains("Failed to write to test"));
        assert_eq!(e.frames_sent(), 0);
    }
}
