use anyhow::{Context, Result};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::thread;
use std::time::Duration;

/// Enumerate serial ports on this machine
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    serialport::available_ports().context("Failed to enumerate serial ports")
}

/// One-line description of a port for `--list`
pub fn describe_port(info: &SerialPortInfo) -> String {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => format!(
            "{} (USB {:04x}:{:04x}{})",
            info.port_name,
            usb.vid,
            usb.pid,
            usb.product
                .as_deref()
                .map(|p| format!(", {}", p))
                .unwrap_or_default()
        ),
        SerialPortType::PciPort => format!("{} (PCI)", info.port_name),
        SerialPortType::BluetoothPort => format!("{} (Bluetooth)", info.port_name),
        SerialPortType::Unknown => info.port_name.clone(),
    }
}

/// First port name containing `pattern`
pub fn find_port<'a, I>(names: I, pattern: &str) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .find(|name| name.contains(pattern))
        .map(str::to_string)
}

/// Resolve the device path of the first USB-serial adapter matching `pattern`
pub fn discover_port(pattern: &str) -> Result<String> {
    let ports = list_ports()?;
    let names: Vec<&str> = ports.iter().map(|p| p.port_name.as_str()).collect();

    find_port(names.iter().copied(), pattern).with_context(|| {
        format!(
            "No serial port matching '{}' (found: {})",
            pattern,
            if names.is_empty() {
                "none".to_string()
            } else {
                names.join(", ")
            }
        )
    })
}

/// Open the port 8N1 without flow control, DTR asserted
pub fn open_port(path: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>> {
    let mut port = serialport::new(path, baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(Duration::from_millis(1000))
        .open()
        .context(format!("Failed to open serial port {}", path))?;

    if let Err(e) = port.write_data_terminal_ready(true) {
        eprintln!("Warning: Failed to set DTR on {}: {}", path, e);
    }

    // Allow device to initialize
    thread::sleep(Duration::from_millis(100));

    Ok(port)
}
