// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! Loopback UDP fake station shared by the integration tests.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use rust_cloudwatcher::protocol::CloudWatcher;
use rust_cloudwatcher::transport::{Link, Transport};

/// Pad a response block to the protocol's fixed 15 bytes.
pub fn block(content: &[u8]) -> Vec<u8> {
    let mut b = content.to_vec();
    assert!(b.len() <= 15, "block too long: {:?}", content);
    b.resize(15, b' ');
    b
}

/// Frame data blocks with the `!`-prefixed terminator block.
pub fn frame(blocks: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for b in blocks {
        out.extend_from_slice(&block(b));
    }
    out.extend_from_slice(&block(b"!"));
    out
}

/// Spawn a fake CloudWatcher answering on a loopback UDP socket.
///
/// The station goes silent (keeps receiving, stops answering) once it
/// has sent `reply_limit` responses; `cancel_after` raises the given
/// flag right before the n-th response goes out, so a caller can be
/// cancelled deterministically in the middle of a cycle.
pub fn spawn_station(
    reply_limit: usize,
    cancel_after: Option<(usize, Arc<AtomicBool>)>,
) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind fake station");
    let addr = socket.local_addr().expect("local addr");
    thread::spawn(move || {
        let mut replies = 0usize;
        let mut buf = [0u8; 64];
        loop {
            let (n, peer) = match socket.recv_from(&mut buf) {
                Ok(v) => v,
                Err(_) => return,
            };
            let request = String::from_utf8_lossy(&buf[..n]).into_owned();
            let reply: Option<Vec<u8>> = match request.as_str() {
                "z!" => None,
                "A!" => Some(frame(&[b"!N CloudWatcher"])),
                "B!" => Some(frame(&[b"!V 5.95"])),
                "K!" => Some(frame(&[b"!K 2550"])),
                "C!" => Some(frame(&[b"!6 940", b"!4 56", b"!5 800"])),
                "S!" => Some(frame(&[b"!1 -500"])),
                "T!" => Some(frame(&[b"!2 2000"])),
                "E!" => Some(frame(&[b"!R 2560"])),
                "M!" => {
                    // zener 3.00, ldr max 1744, ldr pullup 56.0,
                    // rain beta 3450, rain R25 1.0, rain pullup 1.0
                    let constants = [
                        b'!', b'M', 1, 44, 6, 208, 2, 48, 13, 122, 0, 10, 0, 10,
                    ];
                    Some(frame(&[&constants]))
                }
                "t!" => Some(frame(&[b"!th 19623"])),
                "h!" => Some(frame(&[b"!hh 50000"])),
                "v!" => Some(frame(&[b"!v 1"])),
                "V!" => Some(frame(&[b"!w 10.0"])),
                "F!" => Some(frame(&[b"!X"])),
                "G!" => Some(frame(&[b"!X"])),
                "H!" => Some(frame(&[b"!Y"])),
                p if p.starts_with('P') => {
                    let code: u32 = p[1..5].parse().unwrap_or(0);
                    Some(frame(&[format!("!Q {}", code).as_bytes()]))
                }
                _ => Some(b"junk".to_vec()),
            };
            if let Some(reply) = reply {
                if replies >= reply_limit {
                    continue;
                }
                replies += 1;
                if let Some((at, flag)) = &cancel_after {
                    if replies == *at {
                        flag.store(true, Ordering::SeqCst);
                    }
                }
                let _ = socket.send_to(&reply, peer);
            }
        }
    });
    addr
}

/// A fake station that answers everything, forever.
pub fn spawn_fake_station() -> SocketAddr {
    spawn_station(usize::MAX, None)
}

/// Connect and run the handshake against a given fake station.
pub fn connect_to(addr: SocketAddr) -> CloudWatcher {
    let link = Link::open_udp(&addr.to_string()).expect("open udp link");
    let (device, info) = CloudWatcher::handshake(Transport::new(link)).expect("handshake");
    assert_eq!(info.model, "CloudWatcher");
    assert_eq!(info.firmware, "5.95");
    assert_eq!(info.serial_number, "2550");
    device
}

/// Connect to a fresh, fully answering fake station.
pub fn connect() -> CloudWatcher {
    connect_to(spawn_fake_station())
}
