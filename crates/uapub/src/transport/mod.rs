// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport channels for UADP traffic.
//!
//! The core only moves opaque byte buffers; everything transport-specific
//! stays behind the [`Channel`] trait. A channel value is owned by its
//! group and passed by reference into send/receive - no process-wide
//! connection state.
//!
//! # Modules
//!
//! - `udp` - UDP multicast channel (opc.udp)
//! - `loopback` - in-process queue pair for tests and demos

pub mod loopback;
pub mod udp;

pub use loopback::LoopbackChannel;
pub use udp::{UdpChannel, UdpChannelConfig};

use crate::pubsub::Result;
use std::time::Duration;

/// Byte-buffer send/receive contract consumed by the groups.
pub trait Channel {
    /// Send one datagram/message.
    fn send(&mut self, payload: &[u8]) -> Result<()>;

    /// Receive pending messages, invoking `handler` zero or more times
    /// with each received byte chunk before returning. Blocks up to
    /// `timeout`; a timeout is a normal return of `Ok(0)`, not an error.
    /// Returns the number of chunks delivered. The handler runs
    /// synchronously on the calling thread, before `receive` returns.
    fn receive(
        &mut self,
        timeout: Duration,
        handler: &mut dyn FnMut(&[u8]),
    ) -> Result<usize>;

    /// Release transport resources. Further send/receive calls fail.
    fn close(&mut self);
}
