// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process loopback channel.
//!
//! A pair of endpoints sharing two queues, one per direction. Used by
//! tests and single-process demos; the receive timeout is ignored since
//! delivery is immediate.

use super::Channel;
use crate::pubsub::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

type Queue = Arc<Mutex<VecDeque<Vec<u8>>>>;

/// One endpoint of an in-process channel pair.
pub struct LoopbackChannel {
    tx: Queue,
    rx: Queue,
    closed: bool,
}

impl LoopbackChannel {
    /// Create two connected endpoints: what one sends, the other
    /// receives.
    pub fn pair() -> (LoopbackChannel, LoopbackChannel) {
        let a_to_b: Queue = Arc::new(Mutex::new(VecDeque::new()));
        let b_to_a: Queue = Arc::new(Mutex::new(VecDeque::new()));
        (
            LoopbackChannel {
                tx: Arc::clone(&a_to_b),
                rx: Arc::clone(&b_to_a),
                closed: false,
            },
            LoopbackChannel {
                tx: b_to_a,
                rx: a_to_b,
                closed: false,
            },
        )
    }
}

impl Channel for LoopbackChannel {
    fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidArgument("channel is closed"));
        }
        self.tx.lock().push_back(payload.to_vec());
        Ok(())
    }

    fn receive(
        &mut self,
        _timeout: Duration,
        handler: &mut dyn FnMut(&[u8]),
    ) -> Result<usize> {
        if self.closed {
            return Err(Error::InvalidArgument("channel is closed"));
        }
        let mut count = 0usize;
        loop {
            // Pop outside the handler call so a handler that sends back
            // through the peer cannot deadlock on the queue lock.
            let next = self.rx.lock().pop_front();
            match next {
                Some(chunk) => {
                    handler(&chunk);
                    count += 1;
                }
                None => return Ok(count),
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_delivers_in_order() {
        let (mut a, mut b) = LoopbackChannel::pair();
        a.send(b"one").unwrap();
        a.send(b"two").unwrap();

        let mut seen = Vec::new();
        let count = b
            .receive(Duration::from_millis(1), &mut |chunk| {
                seen.push(chunk.to_vec());
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(seen, vec![b"one".to_vec(), b"two".to_vec()]);

        // Drained: next receive is the normal empty return.
        let count = b.receive(Duration::from_millis(1), &mut |_| {}).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_closed_channel_rejects_io() {
        let (mut a, _b) = LoopbackChannel::pair();
        a.close();
        assert!(a.send(b"x").is_err());
        assert!(a.receive(Duration::from_millis(1), &mut |_| {}).is_err());
    }
}
