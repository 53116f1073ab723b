use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod byte_source;
mod config;
mod echo;
mod emitter;
mod protocol;
mod transport;

use byte_source::RandomBytes;
use config::Config;
use emitter::Emitter;
use protocol::Framer;

#[derive(Parser)]
#[command(name = "headlight_emitter")]
#[command(about = "Headlight packet emitter\n\nStreams CRC-8 framed status, brightness, monitor and PID packets to a headlight controller over serial.", long_about = None)]
struct Cli {
    /// Path to configuration file (JSON)
    #[arg(long)]
    config: Option<String>,

    /// Serial device path (skips autodetection)
    #[arg(long)]
    port: Option<String>,

    /// Substring used to autodetect the serial device
    #[arg(long)]
    pattern: Option<String>,

    /// Baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Pause between packet bundles in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop after this many bundles
    #[arg(long)]
    iterations: Option<u64>,

    /// Skip the one-shot init write
    #[arg(long)]
    no_init: bool,

    /// Print received bytes instead of transmitting
    #[arg(long)]
    echo: bool,

    /// List serial ports and exit
    #[arg(long)]
    list: bool,

    /// Enable debug output (statistics)
    #[arg(long)]
    debug: bool,

    /// Enable detailed debug (hex dumps every write)
    #[arg(long)]
    ddebug: bool,
}

impl Cli {
    /// Load the config file (if any) and apply command line overrides
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let data = fs::read_to_string(path)
                    .context(format!("Failed to read config {}", path))?;
                serde_json::from_str(&data)
                    .context(format!("Failed to parse config {}", path))?
            }
            None => Config::default(),
        };

        if let Some(port) = &self.port {
            config.serial.port = Some(port.clone());
        }
        if let Some(pattern) = &self.pattern {
            config.serial.pattern = pattern.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(interval) = self.interval_ms {
            config.emitter.interval_ms = interval;
        }
        if self.iterations.is_some() {
            config.emitter.iterations = self.iterations;
        }
        if self.no_init {
            config.init.enabled = false;
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list {
        for info in transport::list_ports()? {
            println!("{}", transport::describe_port(&info));
        }
        return Ok(());
    }

    let config = cli.resolve_config()?;

    // ddebug implies debug
    let debug = cli.debug || cli.ddebug;

    let port_name = match &config.serial.port {
        Some(port) => port.clone(),
        None => transport::discover_port(&config.serial.pattern)?,
    };
    let mut port = transport::open_port(&port_name, config.serial.baud_rate)?;

    if debug {
        println!("✓ Opened {} @ {} baud", port_name, config.serial.baud_rate);
    }

    if cli.echo {
        let running = Arc::new(AtomicBool::new(true));
        install_ctrlc(Arc::clone(&running), debug);

        let received = echo::echo(&mut port, &mut io::stdout().lock(), &running)?;
        if debug {
            println!("✓ Received {} bytes", received);
        }
        return Ok(());
    }

    let mut emitter = Emitter::new(
        port_name,
        port,
        RandomBytes,
        Framer::autosar(),
        config.emitter,
        config.init,
        debug,
        cli.ddebug,
    );

    install_ctrlc(emitter.get_running_flag(), debug);

    // Run emitter (blocks until shutdown); the port closes when it drops
    emitter.run()?;

    if debug {
        println!("✓ Emitter stopped after {} frames", emitter.frames_sent());
    }

    Ok(())
}

/// Set up Ctrl-C handler with graceful shutdown
fn install_ctrlc(running: Arc<AtomicBool>, debug: bool) {
    let result = ctrlc::set_handler(move || {
        if debug {
            println!("\nShutting down...");
        }
        running.store(false, Ordering::Relaxed);
    });

    if let Err(e) = result {
        eprintln!("Warning: Could not set Ctrl-C handler: {}", e);
    }
}
