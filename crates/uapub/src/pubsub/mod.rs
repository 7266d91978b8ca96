// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # PubSub entity layer
//!
//! Writer Groups and Reader Groups, their freeze/operational state
//! machine, and the dataset binding layer between field sources and
//! target variables.
//!
//! ## Entity hierarchy
//!
//! ```text
//! WriterGroup                      ReaderGroup
//! +-- DataSetWriter                +-- DataSetReader
//! |   +-- PublishedDataSet        |    +-- DataSetMetaData
//! |       +-- DataSetField        |    +-- target variables
//! +-- Channel (send)               +-- Channel (receive)
//! ```
//!
//! ## State machine
//!
//! Each group is {Disabled, Operational} x {Unfrozen, Frozen}. Membership
//! and message settings mutate only while Unfrozen; freezing validates
//! RT eligibility and commits the fixed layout; a Writer Group publishes
//! only while Operational and Frozen.

mod dataset;
mod reader;
mod reader_group;
mod writer;
mod writer_group;

pub use dataset::{DataSetField, FieldSource, PublishedDataSet};
pub use reader::{DataSetReader, DataSetReaderConfig, TargetVariable};
pub use reader_group::{ReaderGroup, ReaderGroupConfig, ReaderId};
pub use writer::{DataSetWriter, DataSetWriterConfig};
pub use writer_group::{WriterGroup, WriterGroupConfig};

use crate::protocol::{DecodeError, EncodeError};

/// Real-time level of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtLevel {
    /// Dynamic encode/decode, per-value allocation allowed.
    #[default]
    None,
    /// Precomputed fixed layout, allocation-free cycle path.
    FixedSize,
}

/// Errors returned by PubSub operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration errors (synchronous, state left unchanged)
    // ========================================================================
    /// Required input absent or out of range.
    InvalidArgument(&'static str),
    /// Mutation attempted while the group configuration is frozen.
    ConfigurationLocked,
    /// Structurally invalid binding (e.g. missing value source).
    ConfigurationError(String),
    /// Structurally unsupported RT shape (e.g. multiple readers).
    NotImplemented(&'static str),
    /// Data type cannot be laid out with a fixed width.
    NotSupported(String),

    // ========================================================================
    // Cycle-time errors
    // ========================================================================
    /// Malformed or mismatched wire bytes.
    Decode(DecodeError),
    /// Message could not be encoded.
    Encode(EncodeError),
    /// Transport send/receive failure.
    Communication(std::io::Error),
    /// Allocation failure during setup.
    OutOfMemory,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::ConfigurationLocked => {
                write!(f, "configuration is frozen; unfreeze the group first")
            }
            Error::ConfigurationError(msg) => write!(f, "configuration error: {}", msg),
            Error::NotImplemented(msg) => write!(f, "not implemented: {}", msg),
            Error::NotSupported(msg) => write!(f, "not supported: {}", msg),
            Error::Decode(e) => write!(f, "decode failed: {}", e),
            Error::Encode(e) => write!(f, "encode failed: {}", e),
            Error::Communication(e) => write!(f, "transport failure: {}", e),
            Error::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Decode(e) => Some(e),
            Error::Encode(e) => Some(e),
            Error::Communication(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl From<EncodeError> for Error {
    fn from(e: EncodeError) -> Self {
        Error::Encode(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Communication(e)
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
