use std::io::{self, Read};

use super::{DataBits, Parity, SerialConfig, StopBits};

/// Readable end of an open serial line. Dropping it releases the port.
pub type SerialLink = Box<dyn Read + Send>;

/// Opens serial lines. Implementations must be callable from any thread.
pub trait SerialTransport: Send + Sync {
    fn open(&self, port: &str, config: &SerialConfig) -> io::Result<SerialLink>;
}

/// Transport backed by the host's serial driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTransport;

impl SerialTransport for SystemTransport {
    fn open(&self, port: &str, config: &SerialConfig) -> io::Result<SerialLink> {
        let serial = serialport::new(port, config.baud_rate)
            .data_bits(data_bits(config.data_bits))
            .parity(parity(config.parity))
            .stop_bits(stop_bits(config.stop_bits))
            .flow_control(serialport::FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|err| {
                let kind = match err.kind {
                    serialport::ErrorKind::NoDevice => io::ErrorKind::NotFound,
                    serialport::ErrorKind::InvalidInput => io::ErrorKind::InvalidInput,
                    serialport::ErrorKind::Io(kind) => kind,
                    _ => io::ErrorKind::Other,
                };
                io::Error::new(kind, err.description)
            })?;
        Ok(Box::new(serial))
    }
}

fn data_bits(bits: DataBits) -> serialport::DataBits {
    match bits {
        DataBits::Five => serialport::DataBits::Five,
        DataBits::Six => serialport::DataBits::Six,
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Even => serialport::Parity::Even,
    }
}

fn stop_bits(bits: StopBits) -> serialport::StopBits {
    match bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}
