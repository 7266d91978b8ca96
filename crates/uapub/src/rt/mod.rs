// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RT fixed-size support.
//!
//! When a group freezes in fixed-size mode, every byte position of the
//! future wire traffic is known up front. This module computes that
//! layout once ([`MessageLayout`]) and wraps it into per-side working
//! state: [`BufferedSendMessage`] (writer groups rewrite field bytes and
//! the sequence number in a pre-encoded buffer) and
//! [`BufferedReceiveMessage`] (reader groups verify the frozen header
//! prefix and read field bytes straight out of the receive buffer,
//! allocation-free).
//!
//! A layout is owned by the Frozen state of its group and is dropped on
//! unfreeze, so decoding against a stale table is unrepresentable: any
//! configuration mutation first requires leaving the Frozen state.

mod buffered;
mod offsets;

pub use buffered::{BufferedReceiveMessage, BufferedSendMessage};
pub use offsets::{compute_layout, FieldOffset, MessageLayout};
