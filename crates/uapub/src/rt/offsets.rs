// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Offset-table computation for fixed-size messages.
//!
//! Walks the wire layout exactly as the codec would write it and records
//! the byte position of every dataset field plus the mutable header
//! fields (sequence number, group version). The whitelist is deliberately
//! narrow: fixed-width scalars only, no general serializer.

use crate::model::{BuiltInType, DataSetMetaData};
use crate::protocol::uadp::{ContentMask, PublisherIdType};
use crate::pubsub::{Error, Result};

/// Byte position of one dataset field inside the wire buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOffset {
    /// Index of the DataSetMessage within the payload.
    pub message_index: usize,
    /// Field position within its dataset.
    pub field_index: usize,
    /// Absolute byte offset in the wire buffer.
    pub offset: usize,
    /// Raw encoding width in bytes.
    pub width: usize,
    pub built_in_type: BuiltInType,
}

/// Precomputed fixed layout of one NetworkMessage shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLayout {
    /// Total encoded size in bytes.
    pub total_len: usize,
    /// Offset of the u16 sequence number, when masked in.
    pub sequence_number_offset: Option<usize>,
    /// Offset of the u32 group version, when masked in.
    pub group_version_offset: Option<usize>,
    /// Every dataset field in payload order.
    pub fields: Vec<FieldOffset>,
}

impl MessageLayout {
    /// First byte of mutable field data; everything before it is fixed
    /// header structure (modulo sequence number / group version).
    pub fn field_region_start(&self) -> usize {
        self.fields.first().map_or(self.total_len, |f| f.offset)
    }
}

/// Compute the fixed layout for RawData-encoded messages described by
/// `datasets` (one metadata entry per DataSetMessage, payload order).
///
/// Fails with `NotSupported` when any field's type cannot be laid out
/// with a fixed width, or is not scalar.
pub fn compute_layout(
    mask: ContentMask,
    publisher_id_type: Option<PublisherIdType>,
    datasets: &[&DataSetMetaData],
) -> Result<MessageLayout> {
    if datasets.is_empty() {
        return Err(Error::InvalidArgument("layout needs at least one dataset"));
    }
    if datasets.len() > u8::MAX as usize {
        return Err(Error::InvalidArgument("more than 255 dataset messages"));
    }

    let mut offset = 1usize; // UADP flags byte

    if mask.contains(ContentMask::PUBLISHER_ID) {
        let id_type = publisher_id_type
            .ok_or(Error::InvalidArgument("publisher id masked in but untyped"))?;
        if id_type != PublisherIdType::Byte {
            offset += 1; // ExtendedFlags1
        }
        offset += id_type.width();
    }

    let mut sequence_number_offset = None;
    let mut group_version_offset = None;
    if mask.contains(ContentMask::GROUP_HEADER) {
        offset += 1; // group flags byte
        if mask.contains(ContentMask::WRITER_GROUP_ID) {
            offset += 2;
        }
        if mask.contains(ContentMask::GROUP_VERSION) {
            group_version_offset = Some(offset);
            offset += 4;
        }
        if mask.contains(ContentMask::SEQUENCE_NUMBER) {
            sequence_number_offset = Some(offset);
            offset += 2;
        }
    }

    if mask.contains(ContentMask::PAYLOAD_HEADER) {
        offset += 1 + 2 * datasets.len();
        if datasets.len() > 1 {
            offset += 2 * datasets.len(); // size-prefix array
        }
    }

    let mut fields = Vec::new();
    for (message_index, meta) in datasets.iter().enumerate() {
        offset += 1; // DataSetMessage header byte
        offset += 2; // field count
        for (field_index, field) in meta.fields.iter().enumerate() {
            if field.value_rank != -1 {
                return Err(Error::NotSupported(format!(
                    "field '{}' is not scalar (value rank {})",
                    field.name, field.value_rank
                )));
            }
            let width = field.built_in_type.fixed_width().ok_or_else(|| {
                Error::NotSupported(format!(
                    "field '{}' type {} has no fixed-width encoding",
                    field.name, field.built_in_type
                ))
            })?;
            fields.push(FieldOffset {
                message_index,
                field_index,
                offset,
                width,
                built_in_type: field.built_in_type,
            });
            offset += width;
        }
    }

    Ok(MessageLayout {
        total_len: offset,
        sequence_number_offset,
        group_version_offset,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldMetaData;

    fn rt_mask() -> ContentMask {
        ContentMask::PUBLISHER_ID
            | ContentMask::GROUP_HEADER
            | ContentMask::WRITER_GROUP_ID
            | ContentMask::PAYLOAD_HEADER
    }

    #[test]
    fn test_single_uint32_layout() {
        let meta = DataSetMetaData::new(
            "ds",
            vec![FieldMetaData::scalar("value", BuiltInType::UInt32)],
        );
        let layout =
            compute_layout(rt_mask(), Some(PublisherIdType::UInt16), &[&meta]).expect("layout");

        // flags(1) + ext1(1) + pubid(2) + groupflags(1) + wgid(2)
        // + payload header(1 + 2) + dsm header(1) + field count(2) = 13
        assert_eq!(layout.fields.len(), 1);
        assert_eq!(layout.fields[0].offset, 13);
        assert_eq!(layout.fields[0].width, 4);
        assert_eq!(layout.total_len, 17);
        assert_eq!(layout.sequence_number_offset, None);
        assert_eq!(layout.field_region_start(), 13);
    }

    #[test]
    fn test_sequence_number_offset_recorded() {
        let meta = DataSetMetaData::new(
            "ds",
            vec![FieldMetaData::scalar("value", BuiltInType::Byte)],
        );
        let mask = rt_mask() | ContentMask::GROUP_VERSION | ContentMask::SEQUENCE_NUMBER;
        let layout =
            compute_layout(mask, Some(PublisherIdType::UInt16), &[&meta]).expect("layout");

        // flags(1) + ext1(1) + pubid(2) + groupflags(1) + wgid(2) -> version at 7
        assert_eq!(layout.group_version_offset, Some(7));
        assert_eq!(layout.sequence_number_offset, Some(11));
    }

    #[test]
    fn test_datetime_rejected() {
        let meta = DataSetMetaData::new(
            "ds",
            vec![FieldMetaData::scalar("stamp", BuiltInType::DateTime)],
        );
        let result = compute_layout(rt_mask(), Some(PublisherIdType::UInt16), &[&meta]);
        assert!(matches!(result, Err(Error::NotSupported(_))));
    }

    #[test]
    fn test_non_scalar_rejected() {
        let meta = DataSetMetaData::new(
            "ds",
            vec![FieldMetaData {
                name: "matrix".to_string(),
                built_in_type: BuiltInType::UInt32,
                value_rank: 1,
            }],
        );
        let result = compute_layout(rt_mask(), Some(PublisherIdType::UInt16), &[&meta]);
        assert!(matches!(result, Err(Error::NotSupported(_))));
    }

    #[test]
    fn test_multi_message_layout_counts_sizes_array() {
        let meta_a = DataSetMetaData::new(
            "a",
            vec![FieldMetaData::scalar("x", BuiltInType::UInt16)],
        );
        let meta_b = DataSetMetaData::new(
            "b",
            vec![FieldMetaData::scalar("y", BuiltInType::Double)],
        );
        let layout = compute_layout(
            ContentMask::PAYLOAD_HEADER,
            None,
            &[&meta_a, &meta_b],
        )
        .expect("layout");

        // flags(1) + payload header(1 + 4) + sizes(4) -> first dsm at 10
        assert_eq!(layout.fields[0].offset, 10 + 3);
        // second dsm: 13 + 2 (field) + 3 (header) = 18
        assert_eq!(layout.fields[1].offset, 18);
        assert_eq!(layout.total_len, 26);
    }
}
