//! SNTP client (RFC 4330)
//!
//! Only the transmit timestamp of the server reply is used; round-trip
//! compensation is irrelevant at the one-second resolution of NMEA output.

use std::net::{ToSocketAddrs, UdpSocket};
use std::time::Duration;
use thiserror::Error;

/// Default NTP pool host
pub const DEFAULT_NTP_SERVER: &str = "pool.ntp.org";

/// NTP UDP port
pub const NTP_PORT: u16 = 123;

/// Seconds between the NTP era (1900) and the Unix epoch (1970)
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

const PACKET_LEN: usize = 48;

/// Errors from a single time request
#[derive(Error, Debug)]
pub enum NtpError {
    #[error("Could not resolve NTP server {0}")]
    Resolve(String),

    #[error("NTP request failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid NTP reply: {0}")]
    InvalidReply(&'static str),
}

/// Source of network time
pub trait TimeFetcher: Send {
    /// One request; returns Unix epoch seconds
    fn fetch(&mut self, timeout: Duration) -> Result<i64, NtpError>;
}

/// Minimal SNTP client over a blocking UDP socket
#[derive(Debug, Clone)]
pub struct SntpClient {
    server: String,
}

impl SntpClient {
    /// `server` may be `host` or `host:port`
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn server_addr(&self) -> Result<std::net::SocketAddr, NtpError> {
        let target = if self.server.contains(':') {
            self.server.clone()
        } else {
            format!("{}:{}", self.server, NTP_PORT)
        };
        target
            .to_socket_addrs()
            .map_err(|_| NtpError::Resolve(self.server.clone()))?
            .next()
            .ok_or_else(|| NtpError::Resolve(self.server.clone()))
    }
}

impl Default for SntpClient {
    fn default() -> Self {
        Self::new(DEFAULT_NTP_SERVER)
    }
}

impl TimeFetcher for SntpClient {
    fn fetch(&mut self, timeout: Duration) -> Result<i64, NtpError> {
        let addr = self.server_addr()?;
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        let timeout = timeout.max(Duration::from_millis(10));
        socket.set_read_timeout(Some(timeout))?;
        socket.set_write_timeout(Some(timeout))?;

        socket.send_to(&request_packet(), addr)?;

        let mut reply = [0u8; PACKET_LEN];
        let (len, _) = socket.recv_from(&mut reply)?;
        let epoch = parse_reply(&reply[..len])?;
        tracing::trace!(server = %self.server, epoch, "NTP reply");
        Ok(epoch)
    }
}

/// Client request: LI=0, VN=4, Mode=3
pub fn request_packet() -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    packet[0] = 0b00_100_011;
    packet
}

/// Extract the transmit timestamp of a server reply as Unix seconds
pub fn parse_reply(reply: &[u8]) -> Result<i64, NtpError> {
    if reply.len() < PACKET_LEN {
        return Err(NtpError::InvalidReply("short packet"));
    }

    let mode = reply[0] & 0x07;
    if mode != 4 && mode != 5 {
        return Err(NtpError::InvalidReply("not a server reply"));
    }
    let leap = reply[0] >> 6;
    let stratum = reply[1];
    if leap == 3 || stratum == 0 {
        return Err(NtpError::InvalidReply("server unsynchronized"));
    }

    let seconds = u32::from_be_bytes([reply[40], reply[41], reply[42], reply[43]]);
    if seconds == 0 {
        return Err(NtpError::InvalidReply("empty transmit timestamp"));
    }

    Ok(i64::from(seconds) - NTP_UNIX_OFFSET)
}
