//! Byte sinks for output channels

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Longest a serial write may block before the channel counts as failed
const SERIAL_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Destination for framed sentence bytes
pub trait ByteSink: Send {
    /// Write one complete framed sentence
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Name for logs and status
    fn describe(&self) -> String;
}

/// Open device: a configured serial line or a plain file
enum DeviceHandle {
    Serial(Box<dyn serialport::SerialPort>),
    File(File),
}

impl Write for DeviceHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            DeviceHandle::Serial(port) => port.write(buf),
            DeviceHandle::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            DeviceHandle::Serial(port) => port.flush(),
            DeviceHandle::File(file) => file.flush(),
        }
    }
}

/// Serial device or plain file, opened on first write
///
/// Paths under `/dev` are opened as serial lines at `baud_rate`, 8N1, no flow
/// control. Anything else is appended to as a file. A failed write drops the
/// handle so the next sentence reopens the device, which covers USB adapters
/// that disappear and come back.
pub struct DeviceSink {
    path: PathBuf,
    baud_rate: u32,
    handle: Option<DeviceHandle>,
}

impl DeviceSink {
    pub fn new(path: impl Into<PathBuf>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            handle: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Whether the path is opened as a serial line
    pub fn is_serial(&self) -> bool {
        is_device(&self.path)
    }

    fn open(&self) -> io::Result<DeviceHandle> {
        if self.is_serial() {
            let port = serialport::new(self.path.to_string_lossy(), self.baud_rate)
                .data_bits(serialport::DataBits::Eight)
                .parity(serialport::Parity::None)
                .stop_bits(serialport::StopBits::One)
                .flow_control(serialport::FlowControl::None)
                .timeout(SERIAL_WRITE_TIMEOUT)
                .open()?;
            tracing::info!(path = %self.path.display(), baud = self.baud_rate, "Serial output opened (8N1)");
            Ok(DeviceHandle::Serial(port))
        } else {
            let file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(&self.path)?;
            tracing::info!(path = %self.path.display(), "Output file opened");
            Ok(DeviceHandle::File(file))
        }
    }

    fn handle(&mut self) -> io::Result<&mut DeviceHandle> {
        if self.handle.is_none() {
            self.handle = Some(self.open()?);
        }
        self.handle
            .as_mut()
            .ok_or_else(|| io::Error::other("device handle unavailable"))
    }
}

fn is_device(path: &Path) -> bool {
    path.starts_with("/dev")
}

impl ByteSink for DeviceSink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let result = self.handle().and_then(|handle| {
            handle.write_all(bytes)?;
            handle.flush()
        });
        if result.is_err() {
            self.handle = None;
        }
        result
    }

    fn describe(&self) -> String {
        if self.is_serial() {
            format!("{} ({} 8N1)", self.path.display(), self.baud_rate)
        } else {
            self.path.display().to_string()
        }
    }
}

/// Process standard output
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ByteSink for StdoutSink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()
    }

    fn describe(&self) -> String {
        "stdout".to_string()
    }
}

/// Shared in-memory buffer; clones see the same bytes
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
    fail: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Written sentences without their CRLF terminators
    pub fn sentences(&self) -> Vec<String> {
        self.contents()
            .split_terminator("\r\n")
            .map(str::to_string)
            .collect()
    }

    pub fn clear(&self) {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Make subsequent writes fail (simulates an unplugged port)
    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap_or_else(|e| e.into_inner()) = failing;
    }
}

impl ByteSink for MemorySink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if *self.fail.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink unplugged"));
        }
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(bytes);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Sink for a configured port: `-` is stdout, anything else a device or file path
pub fn open_sink(port: &str, baud_rate: u32) -> Box<dyn ByteSink> {
    match port {
        "-" => Box::new(StdoutSink),
        path => Box::new(DeviceSink::new(path, baud_rate)),
    }
}
