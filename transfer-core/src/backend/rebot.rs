//! `RebotBackend`: a numeric-addressed backend whose wire protocol is a small, fixed binary
//! frame format ("Rebot") carried over a blocking `TcpStream`.
//!
//! Frame layout, all fields little-endian `u32`:
//! `[magic][command][payload_word_count][bar][address_words][length_words]{payload...}`
//! `payload_word_count` counts every word after itself (`bar`, `address_words`, `length_words`,
//! plus the data words on a write request or a read reply).

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use transfer_types::{Error, Result};

use crate::backend::{check_alignment, Backend, RegisterCatalogue, SdmUri};

const MAGIC: u32 = 0x524f_424f; // "ROBO"
const CMD_READ: u32 = 0;
const CMD_WRITE: u32 = 1;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub struct RebotBackend {
    address: String,
    stream: Mutex<Option<TcpStream>>,
    catalogue: RegisterCatalogue,
    timeout: Duration,
}

impl RebotBackend {
    pub fn new(address: impl Into<String>, catalogue: RegisterCatalogue) -> Self {
        Self {
            address: address.into(),
            stream: Mutex::new(None),
            catalogue,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    fn send_frame(stream: &mut TcpStream, command: u32, bar: u8, address: u32, words: &[i32]) -> Result<()> {
        let address_words = address / 4;
        let mut frame = Vec::with_capacity(6 + words.len());
        frame.push(MAGIC);
        frame.push(command);
        frame.push(3 + words.len() as u32);
        frame.push(bar as u32);
        frame.push(address_words);
        frame.push(words.len() as u32);
        for w in words {
            frame.push(*w as u32);
        }
        let mut bytes = Vec::with_capacity(frame.len() * 4);
        for w in frame {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        stream
            .write_all(&bytes)
            .map_err(|e| Error::io("rebot", e.to_string()))
    }

    fn read_u32(stream: &mut TcpStream) -> Result<u32> {
        let mut buf = [0u8; 4];
        stream
            .read_exact(&mut buf)
            .map_err(|e| Error::io("rebot", e.to_string()))?;
        Ok(u32::from_le_bytes(buf))
    }

    fn recv_frame(stream: &mut TcpStream, expected_words: usize) -> Result<Vec<i32>> {
        let magic = Self::read_u32(stream)?;
        if magic != MAGIC {
            return Err(Error::IoError(format!("bad rebot magic: {magic:#x}")));
        }
        let _command = Self::read_u32(stream)?;
        let payload_word_count = Self::read_u32(stream)? as usize;
        let _bar = Self::read_u32(stream)?;
        let _address_words = Self::read_u32(stream)?;
        let length = Self::read_u32(stream)? as usize;
        if payload_word_count < 3 || length != expected_words {
            return Err(Error::IoError(format!(
                "unexpected rebot reply length: {length} (expected {expected_words})"
            )));
        }
        let mut data = Vec::with_capacity(length);
        for _ in 0..length {
            data.push(Self::read_u32(stream)? as i32);
        }
        Ok(data)
    }

    fn with_stream<R>(&self, f: impl FnOnce(&mut TcpStream) -> Result<R>) -> Result<R> {
        let mut guard = self.stream.lock().unwrap_or_else(|e| e.into_inner());
        let stream = guard
            .as_mut()
            .ok_or_else(|| Error::NotOpened(format!("rebot backend {}", self.address)))?;
        f(stream)
    }
}

impl Backend for RebotBackend {
    fn open(&self) -> Result<()> {
        let stream =
            TcpStream::connect(&self.address).map_err(|e| Error::io(&self.address, e.to_string()))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| Error::io(&self.address, e.to_string()))?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(|e| Error::io(&self.address, e.to_string()))?;
        *self.stream.lock().unwrap_or_else(|e| e.into_inner()) = Some(stream);
        tracing::debug!(backend = "rebot", address = %self.address, "opened");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        *self.stream.lock().unwrap_or_else(|e| e.into_inner()) = None;
        tracing::debug!(backend = "rebot", "closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    fn read(&self, bar: u8, address: u32, data: &mut [i32]) -> Result<()> {
        check_alignment(address, data.len())?;
        let result = self.with_stream(|stream| {
            Self::send_frame(stream, CMD_READ, bar, address, &[])?;
            Self::recv_frame(stream, data.len())
        })?;
        data.copy_from_slice(&result);
        tracing::debug!(backend = "rebot", bar, address, words = data.len(), "read");
        Ok(())
    }

    fn write(&self, bar: u8, address: u32, data: &[i32]) -> Result<()> {
        check_alignment(address, data.len())?;
        self.with_stream(|stream| {
            Self::send_frame(stream, CMD_WRITE, bar, address, data)?;
            Self::recv_frame(stream, 0)?;
            Ok(())
        })?;
        tracing::debug!(backend = "rebot", bar, address, words = data.len(), "write");
        Ok(())
    }

    fn register_catalogue(&self) -> RegisterCatalogue {
        self.catalogue.clone()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub(crate) fn create(uri: &SdmUri) -> Result<Arc<dyn Backend>> {
    let address = if uri.host.contains(':') {
        uri.host.clone()
    } else {
        format!("{}:5001", uri.host)
    };
    Ok(Arc::new(RebotBackend::new(address, RegisterCatalogue::new())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn round_trips_a_read_against_a_fake_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut header = [0u8; 24];
            stream.read_exact(&mut header).unwrap();
            let mut bytes = Vec::new();
            for w in [MAGIC, CMD_READ, 4, 0, 0x20 / 4, 1, 0xDEADBEEFu32] {
                bytes.extend_from_slice(&w.to_le_bytes());
            }
            stream.write_all(&bytes).unwrap();
        });

        let backend = RebotBackend::new(addr.to_string(), RegisterCatalogue::new());
        backend.open().unwrap();
        let mut buf = [0i32; 1];
        backend.read(0, 0x20, &mut buf).unwrap();
        assert_eq!(buf[0], 0xDEADBEEFu32 as i32);
        server.join().unwrap();
    }
}
