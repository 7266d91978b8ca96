// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP multicast channel for opc.udp UADP traffic.
//!
//! One socket per channel, bound with SO_REUSEADDR so publisher and
//! subscriber processes can share the group port on the same host.
//! Multicast loopback is enabled by default for intra-machine pub/sub.

use super::Channel;
use crate::config::{DEFAULT_MULTICAST_ADDR, DEFAULT_UDP_PORT, MULTICAST_TTL, RECEIVE_BUFFER_SIZE};
use crate::pubsub::{Error, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

/// UDP channel parameters. The defaults match the standard UADP
/// multicast endpoint `opc.udp://224.0.0.22:4840/`.
#[derive(Debug, Clone)]
pub struct UdpChannelConfig {
    pub multicast_group: Ipv4Addr,
    pub port: u16,
    /// Interface to join the group on; UNSPECIFIED lets the OS choose.
    pub interface: Ipv4Addr,
    pub ttl: u32,
    /// Deliver our own datagrams back to this host (intra-machine pub/sub).
    pub loopback: bool,
}

impl Default for UdpChannelConfig {
    fn default() -> Self {
        // DEFAULT_MULTICAST_ADDR is a compile-time constant; parsing it
        // cannot fail.
        let multicast_group = DEFAULT_MULTICAST_ADDR
            .parse()
            .unwrap_or(Ipv4Addr::new(224, 0, 0, 22));
        UdpChannelConfig {
            multicast_group,
            port: DEFAULT_UDP_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            ttl: MULTICAST_TTL,
            loopback: true,
        }
    }
}

/// Multicast UDP channel owned by one group.
pub struct UdpChannel {
    socket: UdpSocket,
    dest: SocketAddr,
    config: UdpChannelConfig,
    recv_buf: Vec<u8>,
    closed: bool,
}

impl UdpChannel {
    /// Open a socket bound to the group port and join the multicast
    /// group.
    pub fn open(config: UdpChannelConfig) -> Result<UdpChannel> {
        if !config.multicast_group.is_multicast() {
            return Err(Error::InvalidArgument("address is not a multicast group"));
        }
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port);
        socket.bind(&SocketAddr::from(bind_addr).into())?;

        let socket: UdpSocket = socket.into();
        socket.join_multicast_v4(&config.multicast_group, &config.interface)?;
        socket.set_multicast_loop_v4(config.loopback)?;
        socket.set_multicast_ttl_v4(config.ttl)?;
        log::debug!(
            "[UDP] channel open group={} port={} iface={} ttl={}",
            config.multicast_group,
            config.port,
            config.interface,
            config.ttl
        );

        let dest = SocketAddr::from(SocketAddrV4::new(config.multicast_group, config.port));
        Ok(UdpChannel {
            socket,
            dest,
            config,
            recv_buf: vec![0u8; RECEIVE_BUFFER_SIZE],
            closed: false,
        })
    }
}

impl Channel for UdpChannel {
    fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidArgument("channel is closed"));
        }
        let sent = self.socket.send_to(payload, self.dest)?;
        if sent != payload.len() {
            return Err(Error::Communication(io::Error::new(
                io::ErrorKind::WriteZero,
                "short datagram send",
            )));
        }
        Ok(())
    }

    fn receive(
        &mut self,
        timeout: Duration,
        handler: &mut dyn FnMut(&[u8]),
    ) -> Result<usize> {
        if self.closed {
            return Err(Error::InvalidArgument("channel is closed"));
        }
        if timeout.is_zero() {
            return Err(Error::InvalidArgument("receive timeout must be non-zero"));
        }
        self.socket.set_read_timeout(Some(timeout))?;
        let mut count = 0usize;
        loop {
            match self.socket.recv_from(&mut self.recv_buf) {
                Ok((len, _peer)) => {
                    handler(&self.recv_buf[..len]);
                    count += 1;
                    // Drain whatever else is already queued without
                    // blocking for another full timeout.
                    self.socket.set_nonblocking(true)?;
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    // Timeout is a normal "no data yet" return.
                    break;
                }
                Err(e) => {
                    self.socket.set_nonblocking(false)?;
                    return Err(Error::Communication(e));
                }
            }
        }
        self.socket.set_nonblocking(false)?;
        Ok(count)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        let _ = self
            .socket
            .leave_multicast_v4(&self.config.multicast_group, &self.config.interface);
        self.closed = true;
        log::debug!(
            "[UDP] channel closed group={} port={}",
            self.config.multicast_group,
            self.config.port
        );
    }
}

impl Drop for UdpChannel {
    fn drop(&mut self) {
        self.close();
    }
}
