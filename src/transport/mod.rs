// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! Serial/UDP link and ASCII framing for the CloudWatcher protocol
//!
//! Commands are short ASCII strings (`"A!"`, `"C!"`, `"P0512!"`, ...).
//! Every response is a sequence of fixed 15-byte blocks; the final block
//! begins with `!` and acts as a terminator. The terminator block is
//! stripped before the response is handed to the protocol layer.
//!
//! One [`Transport`] wraps one open link and serializes access with a
//! mutex held for the whole write+read of a command, so at most one
//! command is ever in flight per session. The guard is dropped on every
//! exit path, success or failure.

use std::io::{Read, Write};
use std::net::UdpSocket;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use log::debug;
use thiserror::Error;

/// Size of one protocol response block, including the terminator block.
pub const BLOCK_SIZE: usize = 15;

/// Largest response the device can produce (a handful of blocks).
const MAX_RESPONSE_LEN: usize = 100;

/// Granularity of the stale-byte flush loop before each command.
const FLUSH_POLL: Duration = Duration::from_millis(10);

/// Timeout for the first response block.
const FIRST_BLOCK_TIMEOUT: Duration = Duration::from_secs(3);

/// Timeout for every block after the first.
const NEXT_BLOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Failures at the framing level. Protocol parse failures live one
/// layer up in [`crate::protocol::ProtocolError`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error on device link: {0}")]
    Io(#[from] std::io::Error),

    /// Short response or missing `!`-prefixed 15-byte trailer.
    #[error("response to {command:?} has no valid terminator block: {response:?}")]
    BadTerminator { command: String, response: String },
}

/// An open connection to the station: local serial port or UDP peer.
pub enum Link {
    Serial(Box<dyn serialport::SerialPort>),
    Udp(UdpSocket),
}

impl Link {
    /// Open a local serial port at the given baud rate (the station
    /// speaks 9600 8N1).
    pub fn open_serial(path: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud_rate)
            .timeout(FIRST_BLOCK_TIMEOUT)
            .open()
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
        Ok(Link::Serial(port))
    }

    /// Connect a UDP socket to a `host:port` peer.
    pub fn open_udp(addr: &str) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(addr)?;
        socket.set_read_timeout(Some(FIRST_BLOCK_TIMEOUT))?;
        Ok(Link::Udp(socket))
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        match self {
            Link::Serial(port) => port
                .set_timeout(timeout)
                .map_err(|e| std::io::Error::other(e)),
            Link::Udp(socket) => socket.set_read_timeout(Some(timeout)),
        }
    }

    /// Discard whatever is sitting on the link from a previous exchange.
    /// Serial links are drained byte-at-a-time; a UDP link drops at most
    /// one stale datagram.
    fn drain(&mut self) -> std::io::Result<()> {
        self.set_read_timeout(FLUSH_POLL)?;
        match self {
            Link::Serial(port) => {
                let mut byte = [0u8; 1];
                loop {
                    match port.read(&mut byte) {
                        Ok(0) => break,
                        Ok(_) => continue,
                        Err(e) if is_timeout(&e) => break,
                        Err(e) => return Err(e),
                    }
                }
            }
            Link::Udp(socket) => {
                let mut buf = [0u8; MAX_RESPONSE_LEN];
                match socket.recv(&mut buf) {
                    Ok(_) => {}
                    Err(e) if is_timeout(&e) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self {
            Link::Serial(port) => port.write_all(data),
            Link::Udp(socket) => socket.send(data).map(|_| ()),
        }
    }

    /// Read up to `max` bytes of response. Serial links deliver one byte
    /// per read with a 3 s timeout on the first byte and 1 s after; a UDP
    /// link delivers the whole response as a single datagram.
    fn read_response(&mut self, max: usize) -> std::io::Result<Vec<u8>> {
        match self {
            Link::Serial(port) => {
                let mut response = Vec::with_capacity(max);
                let mut byte = [0u8; 1];
                port.set_timeout(FIRST_BLOCK_TIMEOUT)
                    .map_err(|e| std::io::Error::other(e))?;
                while response.len() < max {
                    match port.read(&mut byte) {
                        Ok(0) => break,
                        Ok(_) => response.push(byte[0]),
                        Err(e) if is_timeout(&e) => break,
                        Err(e) => return Err(e),
                    }
                    port.set_timeout(NEXT_BLOCK_TIMEOUT)
                        .map_err(|e| std::io::Error::other(e))?;
                }
                Ok(response)
            }
            Link::Udp(socket) => {
                let mut buf = [0u8; MAX_RESPONSE_LEN];
                socket.set_read_timeout(Some(FIRST_BLOCK_TIMEOUT))?;
                match socket.recv(&mut buf) {
                    Ok(n) => Ok(buf[..n.min(max)].to_vec()),
                    Err(e) if is_timeout(&e) => Ok(Vec::new()),
                    Err(e) => Err(e),
                }
            }
        }
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

/// Framing layer over one [`Link`]. Shared between the polling scheduler
/// and user-triggered one-off commands; the inner mutex guarantees
/// serialized access.
pub struct Transport {
    link: Mutex<Link>,
}

impl Transport {
    pub fn new(link: Link) -> Self {
        Transport {
            link: Mutex::new(link),
        }
    }

    /// Send `command` and read `block_count` 15-byte blocks back,
    /// stripping the terminator block. `post_write_delay` is an optional
    /// settle time some commands need between write and read.
    ///
    /// On failure the caller gets an error, never a partial response.
    pub fn command(
        &self,
        command: &str,
        block_count: usize,
        post_write_delay: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let mut link = self.link.lock().unwrap();

        link.drain()?;
        link.write_all(command.as_bytes())?;
        if !post_write_delay.is_zero() {
            thread::sleep(post_write_delay);
        }

        let response = link.read_response(block_count * BLOCK_SIZE)?;
        let len = response.len();
        if len > BLOCK_SIZE && response[len - BLOCK_SIZE] == b'!' {
            let body = response[..len - BLOCK_SIZE].to_vec();
            debug!(
                "command {} -> {}",
                command,
                String::from_utf8_lossy(&body)
            );
            Ok(body)
        } else {
            debug!(
                "command {} -> invalid response {:?}",
                command,
                String::from_utf8_lossy(&response)
            );
            Err(TransportError::BadTerminator {
                command: command.to_string(),
                response: String::from_utf8_lossy(&response).into_owned(),
            })
        }
    }

    /// Send a command that produces no response (buffer reset).
    pub fn command_no_reply(&self, command: &str) -> Result<(), TransportError> {
        let mut link = self.link.lock().unwrap();
        link.drain()?;
        link.write_all(command.as_bytes())?;
        debug!("command {} -> (no reply)", command);
        Ok(())
    }
}
