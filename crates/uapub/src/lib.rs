// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # uapub - Real-time OPC UA PubSub (UADP) messaging core
//!
//! A pure Rust implementation of the OPC UA PubSub NetworkMessage layer
//! (UADP binary encoding, OPC UA Part 14) with the Writer Group / Reader
//! Group lifecycle used to exchange periodic dataset updates between
//! industrial devices.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use uapub::{
//!     DataSetField, DataSetWriterConfig, FieldSource, PublishedDataSet, PublisherId,
//!     Result, RtLevel, UdpChannel, UdpChannelConfig, Variant, WriterGroup,
//!     WriterGroupConfig,
//! };
//! use std::sync::Arc;
//! use parking_lot::RwLock;
//!
//! fn main() -> Result<()> {
//!     let cell = Arc::new(RwLock::new(Variant::UInt32(1000).into()));
//!
//!     let mut config = WriterGroupConfig::new("wg", 100, PublisherId::UInt16(2234));
//!     config.rt_level = RtLevel::FixedSize;
//!     let mut group = WriterGroup::new(config)?;
//!
//!     let dataset = PublishedDataSet::new("demo").with_field(DataSetField::new(
//!         "value",
//!         uapub::BuiltInType::UInt32,
//!         FieldSource::Static(cell),
//!     ));
//!     group.add_dataset_writer(DataSetWriterConfig::new("dsw", 62541), dataset)?;
//!     group.set_channel(Box::new(UdpChannel::open(UdpChannelConfig::default())?))?;
//!
//!     group.freeze()?;
//!     group.set_operational();
//!     loop {
//!         group.publish_cycle(None)?;
//!         std::thread::sleep(group.config().publishing_interval);
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Application / Server                        |
//! |      group configs, dataset configs, reader configs (records)      |
//! +--------------------------------------------------------------------+
//! |                          PubSub Layer                              |
//! |   WriterGroup/ReaderGroup state machine | dataset binding layer    |
//! +--------------------------------------------------------------------+
//! |                   RT Layer (fixed-size mode)                       |
//! |     offset table | frozen send buffer | frozen receive template    |
//! +--------------------------------------------------------------------+
//! |                         Protocol Layer                             |
//! |        UADP NetworkMessage / DataSetMessage codec (bit-exact)      |
//! +--------------------------------------------------------------------+
//! |                         Transport Layer                            |
//! |              UDP multicast | in-process loopback                   |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Concurrency model
//!
//! Single-threaded cooperative: the host drives `publish_cycle` /
//! `receive_cycle` from one thread per engine and must not mutate a
//! group's configuration concurrently with its cycle. Frozen layouts and
//! the fixed buffers are owned exclusively by their group. A
//! multi-threaded port needs a mutex or a single-writer actor per group.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`WriterGroup`] | Publish-side unit of configuration and scheduling |
//! | [`ReaderGroup`] | Subscribe-side unit, matches and dispatches traffic |
//! | [`NetworkMessage`] | UADP message with mask-selected optional headers |
//! | [`InformationModel`] | Write/read-by-identity boundary to the address space |
//! | [`Channel`] | Byte-buffer transport contract |

/// Global constants (wire version, default endpoints, buffer sizes).
pub mod config;
/// Information-model boundary (node identities, typed values, trait).
pub mod model;
/// UADP wire codec (NetworkMessage, DataSetMessage, cursors).
pub mod protocol;
/// PubSub entity layer (groups, writers, readers, state machine).
pub mod pubsub;
/// RT fixed-size support (offset tables, frozen buffers).
pub mod rt;
/// Transport channels (UDP multicast, loopback).
pub mod transport;

pub use model::{
    BuiltInType, DataSetMetaData, DataValue, FieldMetaData, InformationModel, MemoryModel,
    NodeIdentity, Variant,
};
pub use protocol::uadp::{
    ContentMask, DataSetBody, DataSetMessage, FieldEncoding, GroupHeader, NetworkMessage,
    PublisherId, PublisherIdType,
};
pub use protocol::{DecodeError, EncodeError};
pub use pubsub::{
    DataSetField, DataSetReader, DataSetReaderConfig, DataSetWriter, DataSetWriterConfig, Error,
    FieldSource, PublishedDataSet, ReaderGroup, ReaderGroupConfig, ReaderId, Result, RtLevel,
    TargetVariable, WriterGroup, WriterGroupConfig,
};
pub use rt::{BufferedReceiveMessage, BufferedSendMessage, FieldOffset, MessageLayout};
pub use transport::{Channel, LoopbackChannel, UdpChannel, UdpChannelConfig};
