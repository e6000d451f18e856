//! Serial QR reader backend
//!
//! Reader modules in USB-CDC / UART mode emit each decoded payload as text
//! terminated by CR, LF or CRLF. The port is opened when a session starts
//! and closed when the session ends, so the reader is only live while the
//! desk is scanning.

use crate::domain::types::{DecodedCode, ScanEvent, ScanFailure};
use crate::infra::config::Config;
use crate::io::scanner::{ScanSession, ScanSource};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Longest payload accepted before the buffer is discarded
const MAX_LINE_LEN: usize = 4096;

/// Read timeout on the port; timeouts are retried, not reported
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Accumulates raw reader bytes and splits them into codes
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self { buffer: Vec::with_capacity(256) }
    }

    /// Append bytes and return the first complete non-blank line, if any.
    /// Bytes after that line stay buffered.
    pub fn push(&mut self, bytes: &[u8]) -> Option<DecodedCode> {
        self.buffer.extend_from_slice(bytes);

        while let Some(end) = self.buffer.iter().position(|&b| b == b'\r' || b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            if let Some(code) = DecodedCode::new(String::from_utf8_lossy(&line[..end])) {
                return Some(code);
            }
        }

        if self.buffer.len() > MAX_LINE_LEN {
            warn!(len = self.buffer.len(), max = MAX_LINE_LEN, "serial_scanner_line_overflow");
            self.buffer.clear();
        }

        None
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

pub struct SerialScanner {
    device: String,
    baud: u32,
}

impl SerialScanner {
    pub fn new(config: &Config) -> Self {
        Self { device: config.scanner_device().to_string(), baud: config.scanner_baud() }
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

impl ScanSource for SerialScanner {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn start_session(&self) -> ScanSession {
        let device = self.device.clone();
        let baud = self.baud;
        ScanSession::spawn(async move { capture_one(&device, baud).await })
    }
}

/// Open the port, read until one code arrives, then close it
async fn capture_one(device: &str, baud: u32) -> ScanEvent {
    let port_result = tokio_serial::new(device, baud).timeout(READ_TIMEOUT).open_native_async();

    let mut port = match port_result {
        Ok(p) => {
            info!(device = %device, baud = %baud, "serial_scanner_opened");
            p
        }
        Err(e) => {
            warn!(device = %device, error = %e, "serial_scanner_open_failed");
            let reason = format!("{}: {}", device, e);
            return ScanEvent::Failed(ScanFailure::DeviceUnavailable(reason));
        }
    };

    let mut assembler = LineAssembler::new();
    let mut buf = [0u8; 256];

    loop {
        match port.read(&mut buf).await {
            Ok(0) => {
                warn!(device = %device, "serial_scanner_eof");
                return ScanEvent::Failed(ScanFailure::Closed);
            }
            Ok(n) => {
                tracing::trace!(bytes = %hex::encode(&buf[..n]), "serial_scanner_rx");
                if let Some(code) = assembler.push(&buf[..n]) {
                    debug!(device = %device, leftover = assembler.pending(), "serial_scanner_line");
                    return ScanEvent::Decoded(code);
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => {}
            Err(e) => {
                warn!(device = %device, error = %e, "serial_scanner_read_error");
                return ScanEvent::Failed(ScanFailure::Io(e.to_string()));
            }
        }
    }
}
