// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UADP wire codec.
//!
//! This module contains the protocol-level encoding logic for UADP
//! NetworkMessages. Entity state (groups, readers, writers) lives in
//! [`crate::pubsub`] and imports from here - never the reverse.
//!
//! # ARCHITECTURAL CONSTRAINT
//!
//! ```text
//! ALLOWED:   pubsub::* -> protocol::*
//! FORBIDDEN: protocol::* -> pubsub::*
//! ```
//!
//! # Layout
//!
//! - `cursor` - bounds-checked little-endian byte cursors
//! - `uadp` - NetworkMessage / DataSetMessage structures and codec

pub mod cursor;
pub mod uadp;

pub use cursor::{Cursor, CursorMut};
pub use uadp::{
    ContentMask, DataSetBody, DataSetMessage, FieldEncoding, GroupHeader, NetworkMessage,
    PublisherId, PublisherIdType,
};

/// Result type for UADP encoding operations.
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Result type for UADP decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors that can occur while encoding a NetworkMessage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Destination buffer is too small for the encoded message.
    BufferTooSmall,
    /// A field required by the content mask is absent or malformed.
    InvalidParameter(&'static str),
    /// A value cannot be encoded in the requested field encoding.
    FieldNotEncodable(&'static str),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "buffer too small for UADP encoding"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
            Self::FieldNotEncodable(msg) => write!(f, "field not encodable: {}", msg),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Errors that can occur while decoding a NetworkMessage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer ended before the structure declared by the flag bits.
    BufferTooShort { offset: usize },
    /// Malformed or unsupported header content.
    InvalidHeader(&'static str),
    /// Payload-header message count disagrees with the messages present.
    PayloadHeaderMismatch { declared: usize, actual: usize },
    /// RawData payload without usable dataset metadata, or an unknown
    /// type tag in a Variant payload.
    UnknownFieldType,
    /// Field count on the wire disagrees with the dataset metadata.
    FieldCountMismatch { declared: usize, expected: usize },
    /// Decoded field does not match the expected metadata.
    FieldMismatch {
        field: usize,
        expected: &'static str,
    },
    /// Trailing bytes after the last declared structure.
    TrailingBytes { offset: usize },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BufferTooShort { offset } => {
                write!(f, "buffer too short at offset {}", offset)
            }
            Self::InvalidHeader(msg) => write!(f, "invalid header: {}", msg),
            Self::PayloadHeaderMismatch { declared, actual } => write!(
                f,
                "payload header declares {} dataset messages, found {}",
                declared, actual
            ),
            Self::UnknownFieldType => write!(f, "unknown field type"),
            Self::FieldCountMismatch { declared, expected } => write!(
                f,
                "wire field count {} disagrees with metadata ({} fields)",
                declared, expected
            ),
            Self::FieldMismatch { field, expected } => {
                write!(f, "field {} does not match metadata ({})", field, expected)
            }
            Self::TrailingBytes { offset } => {
                write!(f, "trailing bytes after message at offset {}", offset)
            }
        }
    }
}

impl std::error::Error for DecodeError {}
