use crate::error::DynResult;
use crate::foxtron::frame::ETB;
use crate::foxtron::transport::{FoxtronTransport, LineControl, TransportEvent};
use crate::utils::dyn_future::DynFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{Parity, SerialPort, SerialStream};

/// Factory default line speed of the DALI232 adapter.
pub const DEFAULT_BAUD_RATE: u32 = 19200;

/// Serial link to the adapter. Splits the incoming byte stream into
/// ETB terminated chunks.
pub struct SerialFoxtronTransport {
    serial: Option<SerialStream>,
    rx_buf: Vec<u8>,
    opened_sent: bool,
}

impl SerialFoxtronTransport {
    pub fn open(port: &str, baud_rate: u32) -> Result<SerialFoxtronTransport, tokio_serial::Error> {
        // The adapter speaks 8E1
        let serial = SerialStream::open(&tokio_serial::new(port, baud_rate).parity(Parity::Even))?;
        Ok(SerialFoxtronTransport {
            serial: Some(serial),
            rx_buf: Vec::new(),
            opened_sent: false,
        })
    }

    fn pop_chunk(&mut self) -> Option<Vec<u8>> {
        let pos = self.rx_buf.iter().position(|b| *b == ETB)?;
        let rest = self.rx_buf.split_off(pos + 1);
        Some(std::mem::replace(&mut self.rx_buf, rest))
    }
}

impl FoxtronTransport for SerialFoxtronTransport {
    fn send<'a>(&'a mut self, data: &'a [u8]) -> DynFuture<'a, DynResult<()>> {
        Box::pin(async move {
            match self.serial.as_mut() {
                Some(serial) => {
                    serial.write_all(data).await?;
                    Ok(())
                }
                None => Err("serial port closed".into()),
            }
        })
    }

    fn set_line(&mut self, line: LineControl) -> DynFuture<'_, DynResult<()>> {
        Box::pin(async move {
            let Some(serial) = self.serial.as_mut() else {
                return Err("serial port closed".into());
            };
            if let Some(dtr) = line.dtr {
                serial.write_data_terminal_ready(dtr)?;
            }
            if let Some(rts) = line.rts {
                serial.write_request_to_send(rts)?;
            }
            Ok(())
        })
    }

    fn is_open(&self) -> bool {
        self.serial.is_some()
    }

    fn next_event(&mut self) -> DynFuture<'_, TransportEvent> {
        Box::pin(async move {
            if !self.opened_sent {
                self.opened_sent = true;
                return TransportEvent::Opened;
            }
            loop {
                if let Some(chunk) = self.pop_chunk() {
                    return TransportEvent::Data(chunk);
                }
                let Some(serial) = self.serial.as_mut() else {
                    return TransportEvent::Closed(None);
                };
                let mut buf = [0u8; 256];
                match serial.read(&mut buf).await {
                    Ok(0) => {
                        self.serial = None;
                        return TransportEvent::Closed(None);
                    }
                    Ok(n) => self.rx_buf.extend_from_slice(&buf[..n]),
                    Err(e) => {
                        self.serial = None;
                        return TransportEvent::Closed(Some(Box::new(e)));
                    }
                }
            }
        })
    }

    fn close(&mut self) {
        self.serial = None;
    }
}
