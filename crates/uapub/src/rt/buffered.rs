// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pre-encoded message buffers for frozen groups.
//!
//! Writer side: the NetworkMessage is encoded once at freeze time; every
//! publish cycle rewrites only the field bytes and the sequence number.
//! Reader side: the expected header bytes are frozen as a template; each
//! incoming buffer is verified against the template (mutable positions
//! excluded) and field values are read at fixed offsets without decoding
//! the header again or allocating.

use super::offsets::{FieldOffset, MessageLayout};
use crate::model::Variant;
use crate::protocol::{DecodeError, DecodeResult};
use crate::pubsub::{Error, Result};

/// Frozen send buffer of a writer group.
#[derive(Debug)]
pub struct BufferedSendMessage {
    buf: Vec<u8>,
    layout: MessageLayout,
}

impl BufferedSendMessage {
    /// Wrap a fully encoded message. `buf` must be the freeze-time
    /// encoding of the exact shape `layout` was computed for.
    pub fn new(buf: Vec<u8>, layout: MessageLayout) -> Result<Self> {
        if buf.len() != layout.total_len {
            return Err(Error::InvalidArgument(
                "encoded buffer differs from layout size",
            ));
        }
        Ok(BufferedSendMessage { buf, layout })
    }

    pub fn field_count(&self) -> usize {
        self.layout.fields.len()
    }

    pub fn field(&self, slot: usize) -> Option<&FieldOffset> {
        self.layout.fields.get(slot)
    }

    /// Rewrite one field's raw bytes in place.
    pub fn write_field(&mut self, slot: usize, value: &Variant) -> Result<()> {
        let fo = self
            .layout
            .fields
            .get(slot)
            .ok_or(Error::InvalidArgument("field slot out of range"))?;
        if value.type_id() != fo.built_in_type {
            return Err(Error::ConfigurationError(format!(
                "sampled {} where frozen layout expects {}",
                value.type_id(),
                fo.built_in_type
            )));
        }
        let dst = &mut self.buf[fo.offset..fo.offset + fo.width];
        match value {
            Variant::Boolean(v) => dst[0] = u8::from(*v),
            Variant::SByte(v) => dst.copy_from_slice(&v.to_le_bytes()),
            Variant::Byte(v) => dst.copy_from_slice(&v.to_le_bytes()),
            Variant::Int16(v) => dst.copy_from_slice(&v.to_le_bytes()),
            Variant::UInt16(v) => dst.copy_from_slice(&v.to_le_bytes()),
            Variant::Int32(v) => dst.copy_from_slice(&v.to_le_bytes()),
            Variant::UInt32(v) => dst.copy_from_slice(&v.to_le_bytes()),
            Variant::Int64(v) => dst.copy_from_slice(&v.to_le_bytes()),
            Variant::UInt64(v) => dst.copy_from_slice(&v.to_le_bytes()),
            Variant::Float(v) => dst.copy_from_slice(&v.to_le_bytes()),
            Variant::Double(v) => dst.copy_from_slice(&v.to_le_bytes()),
            Variant::String(_) | Variant::DateTime(_) => {
                return Err(Error::ConfigurationError(
                    "type has no fixed-width encoding".to_string(),
                ))
            }
        }
        Ok(())
    }

    /// Rewrite the network-message sequence number, when masked in.
    pub fn set_sequence_number(&mut self, seq: u16) {
        if let Some(at) = self.layout.sequence_number_offset {
            self.buf[at..at + 2].copy_from_slice(&seq.to_le_bytes());
        }
    }

    /// The ready-to-send wire bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Frozen receive template of a reader group.
#[derive(Debug)]
pub struct BufferedReceiveMessage {
    template: Vec<u8>,
    /// Byte ranges excluded from the template compare (values the
    /// publisher legitimately changes per message).
    mutable_ranges: Vec<(usize, usize)>,
    layout: MessageLayout,
}

impl BufferedReceiveMessage {
    /// Wrap a freeze-time encoding of the expected message shape.
    pub fn new(template: Vec<u8>, layout: MessageLayout) -> Result<Self> {
        if template.len() != layout.total_len {
            return Err(Error::InvalidArgument(
                "encoded template differs from layout size",
            ));
        }
        let mut mutable_ranges = Vec::new();
        if let Some(at) = layout.group_version_offset {
            mutable_ranges.push((at, 4));
        }
        if let Some(at) = layout.sequence_number_offset {
            mutable_ranges.push((at, 2));
        }
        Ok(BufferedReceiveMessage {
            template,
            mutable_ranges,
            layout,
        })
    }

    pub fn layout(&self) -> &MessageLayout {
        &self.layout
    }

    pub fn field_count(&self) -> usize {
        self.layout.fields.len()
    }

    /// Whether `buf` carries the frozen header shape and identity.
    ///
    /// Compares every byte before the field region against the template,
    /// skipping the mutable positions. A mismatch means the message
    /// belongs to some other publisher/group/writer and is dropped by
    /// the caller, not an error.
    pub fn matches(&self, buf: &[u8]) -> bool {
        if buf.len() != self.layout.total_len {
            return false;
        }
        let end = self.layout.field_region_start();
        (0..end).all(|i| self.is_mutable(i) || buf[i] == self.template[i])
    }

    fn is_mutable(&self, index: usize) -> bool {
        self.mutable_ranges
            .iter()
            .any(|&(at, len)| index >= at && index < at + len)
    }

    /// Sequence number of an incoming buffer, when masked in.
    pub fn sequence_number(&self, buf: &[u8]) -> Option<u16> {
        let at = self.layout.sequence_number_offset?;
        let bytes = buf.get(at..at + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read one field value at its fixed offset. Allocation-free.
    pub fn read_field(&self, buf: &[u8], slot: usize) -> DecodeResult<Variant> {
        let fo = self
            .layout
            .fields
            .get(slot)
            .ok_or(DecodeError::UnknownFieldType)?;
        let src = buf
            .get(fo.offset..fo.offset + fo.width)
            .ok_or(DecodeError::BufferTooShort { offset: fo.offset })?;
        let value = match fo.built_in_type {
            crate::model::BuiltInType::Boolean => Variant::Boolean(src[0] != 0),
            crate::model::BuiltInType::SByte => Variant::SByte(src[0] as i8),
            crate::model::BuiltInType::Byte => Variant::Byte(src[0]),
            crate::model::BuiltInType::Int16 => {
                Variant::Int16(i16::from_le_bytes([src[0], src[1]]))
            }
            crate::model::BuiltInType::UInt16 => {
                Variant::UInt16(u16::from_le_bytes([src[0], src[1]]))
            }
            crate::model::BuiltInType::Int32 => {
                Variant::Int32(i32::from_le_bytes([src[0], src[1], src[2], src[3]]))
            }
            crate::model::BuiltInType::UInt32 => {
                Variant::UInt32(u32::from_le_bytes([src[0], src[1], src[2], src[3]]))
            }
            crate::model::BuiltInType::Int64 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(src);
                Variant::Int64(i64::from_le_bytes(b))
            }
            crate::model::BuiltInType::UInt64 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(src);
                Variant::UInt64(u64::from_le_bytes(b))
            }
            crate::model::BuiltInType::Float => {
                Variant::Float(f32::from_le_bytes([src[0], src[1], src[2], src[3]]))
            }
            crate::model::BuiltInType::Double => {
                let mut b = [0u8; 8];
                b.copy_from_slice(src);
                Variant::Double(f64::from_le_bytes(b))
            }
            crate::model::BuiltInType::String | crate::model::BuiltInType::DateTime => {
                return Err(DecodeError::UnknownFieldType)
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuiltInType, DataSetMetaData, FieldMetaData};
    use crate::protocol::uadp::{
        ContentMask, DataSetMessage, GroupHeader, NetworkMessage, PublisherId,
    };
    use crate::rt::compute_layout;

    fn rt_mask() -> ContentMask {
        ContentMask::PUBLISHER_ID
            | ContentMask::GROUP_HEADER
            | ContentMask::WRITER_GROUP_ID
            | ContentMask::SEQUENCE_NUMBER
            | ContentMask::PAYLOAD_HEADER
    }

    fn encode_rt(value: u32, seq: u16) -> Vec<u8> {
        let msg = NetworkMessage {
            publisher_id: Some(PublisherId::UInt16(2234)),
            group_header: Some(GroupHeader {
                writer_group_id: Some(100),
                group_version: None,
                sequence_number: Some(seq),
            }),
            dataset_writer_ids: Some(vec![62541]),
            messages: vec![DataSetMessage::raw_frame(vec![Variant::UInt32(value)])],
        };
        let mut buf = [0u8; 128];
        let written = msg.encode(rt_mask(), &mut buf).expect("encode");
        buf[..written].to_vec()
    }

    fn layout() -> MessageLayout {
        let meta = DataSetMetaData::new(
            "ds",
            vec![FieldMetaData::scalar("value", BuiltInType::UInt32)],
        );
        compute_layout(
            rt_mask(),
            Some(crate::protocol::uadp::PublisherIdType::UInt16),
            &[&meta],
        )
        .expect("layout")
    }

    #[test]
    fn test_layout_agrees_with_codec() {
        let template = encode_rt(0, 0);
        assert_eq!(template.len(), layout().total_len);
    }

    #[test]
    fn test_receive_matches_and_reads_fields() {
        let rx = BufferedReceiveMessage::new(encode_rt(0, 0), layout()).expect("template");
        let incoming = encode_rt(1000, 7);
        assert!(rx.matches(&incoming));
        assert_eq!(rx.sequence_number(&incoming), Some(7));
        assert_eq!(rx.read_field(&incoming, 0), Ok(Variant::UInt32(1000)));
    }

    #[test]
    fn test_receive_rejects_foreign_header() {
        let rx = BufferedReceiveMessage::new(encode_rt(0, 0), layout()).expect("template");
        let mut foreign = encode_rt(1000, 7);
        // Different writer group id (u16 right after the group flags byte).
        foreign[5] = 99;
        assert!(!rx.matches(&foreign));
        // Different length.
        assert!(!rx.matches(&foreign[..foreign.len() - 1]));
    }

    #[test]
    fn test_send_buffer_rewrites_only_fields_and_sequence() {
        let mut tx = BufferedSendMessage::new(encode_rt(0, 0), layout()).expect("buffer");
        tx.write_field(0, &Variant::UInt32(1000)).expect("write");
        tx.set_sequence_number(7);
        assert_eq!(tx.bytes(), encode_rt(1000, 7).as_slice());

        tx.write_field(0, &Variant::UInt32(1001)).expect("write");
        tx.set_sequence_number(8);
        assert_eq!(tx.bytes(), encode_rt(1001, 8).as_slice());
    }

    #[test]
    fn test_send_buffer_type_mismatch_rejected() {
        let mut tx = BufferedSendMessage::new(encode_rt(0, 0), layout()).expect("buffer");
        assert!(matches!(
            tx.write_field(0, &Variant::Double(1.0)),
            Err(Error::ConfigurationError(_))
        ));
    }
}
