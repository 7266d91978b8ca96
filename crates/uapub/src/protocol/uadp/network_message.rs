// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! NetworkMessage encode/decode.
//!
//! The optional header sections are driven by an ordered table of
//! (flag bit, encode fn, decode fn) entries so the wire order is a single
//! explicit contract instead of scattered conditionals. Table order is the
//! protocol order: publisher id, group header, payload header.

use super::dataset_message::DataSetMessage;
use super::{
    ContentMask, PublisherId, PublisherIdType, EXT1_PUBLISHER_ID_TYPE_MASK, FLAGS_VERSION_MASK,
    FLAG_EXTENDED1, FLAG_GROUP_HEADER, FLAG_PAYLOAD_HEADER, FLAG_PUBLISHER_ID,
    GROUP_FLAG_GROUP_VERSION, GROUP_FLAG_SEQUENCE_NUMBER, GROUP_FLAG_WRITER_GROUP_ID,
};
use crate::config::UADP_VERSION;
use crate::model::DataSetMetaData;
use crate::protocol::cursor::{Cursor, CursorMut};
use crate::protocol::{DecodeError, DecodeResult, EncodeError, EncodeResult};

/// Group-level header: each field individually masked on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupHeader {
    pub writer_group_id: Option<u16>,
    pub group_version: Option<u32>,
    pub sequence_number: Option<u16>,
}

/// Decoded or to-be-encoded UADP NetworkMessage.
///
/// Presence of each optional section follows the content mask on encode
/// and the wire flag bits on decode; an absent section is `None` and is
/// never touched by the codec.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkMessage {
    pub publisher_id: Option<PublisherId>,
    pub group_header: Option<GroupHeader>,
    /// Payload header: one DataSetWriterId per DataSetMessage.
    pub dataset_writer_ids: Option<Vec<u16>>,
    pub messages: Vec<DataSetMessage>,
}

struct DecodeState {
    ext1: u8,
}

/// One optional header section in fixed protocol order.
struct HeaderSection {
    flag: u8,
    encode: fn(&NetworkMessage, ContentMask, &mut CursorMut<'_>) -> EncodeResult<()>,
    decode: fn(&mut NetworkMessage, &DecodeState, &mut Cursor<'_>) -> DecodeResult<()>,
}

const HEADER_SECTIONS: [HeaderSection; 3] = [
    HeaderSection {
        flag: FLAG_PUBLISHER_ID,
        encode: encode_publisher_id,
        decode: decode_publisher_id,
    },
    HeaderSection {
        flag: FLAG_GROUP_HEADER,
        encode: encode_group_header,
        decode: decode_group_header,
    },
    HeaderSection {
        flag: FLAG_PAYLOAD_HEADER,
        encode: encode_payload_header,
        decode: decode_payload_header,
    },
];

impl NetworkMessage {
    pub fn new() -> Self {
        NetworkMessage::default()
    }

    /// Derive the content mask describing the populated sections.
    pub fn content_mask(&self) -> ContentMask {
        let mut mask = ContentMask::NONE;
        if self.publisher_id.is_some() {
            mask = mask | ContentMask::PUBLISHER_ID;
        }
        if let Some(gh) = &self.group_header {
            mask = mask | ContentMask::GROUP_HEADER;
            if gh.writer_group_id.is_some() {
                mask = mask | ContentMask::WRITER_GROUP_ID;
            }
            if gh.group_version.is_some() {
                mask = mask | ContentMask::GROUP_VERSION;
            }
            if gh.sequence_number.is_some() {
                mask = mask | ContentMask::SEQUENCE_NUMBER;
            }
        }
        if self.dataset_writer_ids.is_some() {
            mask = mask | ContentMask::PAYLOAD_HEADER;
        }
        mask
    }

    /// Encode into `buf`, emitting only the sections selected by `mask`.
    /// Returns the number of bytes written.
    ///
    /// A section selected by the mask but absent from the message is an
    /// `InvalidParameter` error; a populated section not selected by the
    /// mask is silently skipped.
    pub fn encode(&self, mask: ContentMask, buf: &mut [u8]) -> EncodeResult<usize> {
        if self.messages.is_empty() {
            return Err(EncodeError::InvalidParameter("no dataset messages"));
        }
        let mut w = CursorMut::new(buf);

        let mut flags = UADP_VERSION & FLAGS_VERSION_MASK;
        let mut ext1 = None;
        if mask.contains(ContentMask::PUBLISHER_ID) {
            flags |= FLAG_PUBLISHER_ID;
            let pid = self
                .publisher_id
                .ok_or(EncodeError::InvalidParameter("publisher id absent"))?;
            if pid.id_type() != PublisherIdType::Byte {
                flags |= FLAG_EXTENDED1;
                ext1 = Some(pid.id_type() as u8);
            }
        }
        if mask.contains(ContentMask::GROUP_HEADER) {
            flags |= FLAG_GROUP_HEADER;
        }
        if mask.contains(ContentMask::PAYLOAD_HEADER) {
            flags |= FLAG_PAYLOAD_HEADER;
        }
        w.write_u8(flags)?;
        if let Some(ext) = ext1 {
            w.write_u8(ext)?;
        }

        for section in &HEADER_SECTIONS {
            if flags & section.flag != 0 {
                (section.encode)(self, mask, &mut w)?;
            }
        }

        self.encode_payload(mask, &mut w)?;
        Ok(w.offset())
    }

    fn encode_payload(&self, mask: ContentMask, w: &mut CursorMut<'_>) -> EncodeResult<()> {
        // Size-prefix array only when the payload header declares more
        // than one message; a single payload is self-delimiting.
        if mask.contains(ContentMask::PAYLOAD_HEADER) && self.messages.len() > 1 {
            let sizes_at = w.offset();
            for _ in &self.messages {
                w.write_u16(0)?;
            }
            for (i, message) in self.messages.iter().enumerate() {
                let start = w.offset();
                message.encode(w)?;
                let size = u16::try_from(w.offset() - start)
                    .map_err(|_| EncodeError::InvalidParameter("dataset message too large"))?;
                w.patch_u16(sizes_at + 2 * i, size)?;
            }
        } else {
            for message in &self.messages {
                message.encode(w)?;
            }
        }
        Ok(())
    }

    /// Decode a NetworkMessage whose payloads are self-describing
    /// (Variant or delta encoded). RawData payloads fail with
    /// [`DecodeError::UnknownFieldType`]; use [`NetworkMessage::decode_with`]
    /// and supply metadata for those.
    pub fn decode(buf: &[u8]) -> DecodeResult<NetworkMessage> {
        Self::decode_with(buf, |_| None)
    }

    /// Decode with out-of-band dataset metadata. `metadata` is consulted
    /// per DataSetMessage with the matching DataSetWriterId from the
    /// payload header (`None` when no payload header is present).
    pub fn decode_with<'m, F>(buf: &[u8], metadata: F) -> DecodeResult<NetworkMessage>
    where
        F: Fn(Option<u16>) -> Option<&'m DataSetMetaData>,
    {
        let mut r = Cursor::new(buf);
        let flags = r.read_u8()?;
        if flags & FLAGS_VERSION_MASK != UADP_VERSION {
            return Err(DecodeError::InvalidHeader("unsupported UADP version"));
        }

        let mut state = DecodeState { ext1: 0 };
        if flags & FLAG_EXTENDED1 != 0 {
            state.ext1 = r.read_u8()?;
            if state.ext1 & !EXT1_PUBLISHER_ID_TYPE_MASK != 0 {
                return Err(DecodeError::InvalidHeader("reserved extended flags set"));
            }
        }

        let mut msg = NetworkMessage::new();
        for section in &HEADER_SECTIONS {
            if flags & section.flag != 0 {
                (section.decode)(&mut msg, &state, &mut r)?;
            }
        }

        msg.decode_payload(&mut r, &metadata)?;
        Ok(msg)
    }

    fn decode_payload<'m, F>(&mut self, r: &mut Cursor<'_>, metadata: &F) -> DecodeResult<()>
    where
        F: Fn(Option<u16>) -> Option<&'m DataSetMetaData>,
    {
        match self.dataset_writer_ids.clone() {
            Some(writer_ids) => {
                let declared = writer_ids.len();
                let mut sizes = Vec::new();
                if declared > 1 {
                    for _ in 0..declared {
                        sizes.push(r.read_u16()? as usize);
                    }
                }
                for (i, writer_id) in writer_ids.iter().enumerate() {
                    if r.remaining() == 0 {
                        return Err(DecodeError::PayloadHeaderMismatch {
                            declared,
                            actual: i,
                        });
                    }
                    let start = r.offset();
                    let message = DataSetMessage::decode(r, metadata(Some(*writer_id)))?;
                    if let Some(size) = sizes.get(i) {
                        if r.offset() - start != *size {
                            return Err(DecodeError::InvalidHeader(
                                "dataset message size mismatch",
                            ));
                        }
                    }
                    self.messages.push(message);
                }
                if r.remaining() > 0 {
                    return Err(DecodeError::PayloadHeaderMismatch {
                        declared,
                        actual: declared + 1,
                    });
                }
            }
            None => {
                // Without a payload header the payload is exactly one
                // DataSetMessage.
                let message = DataSetMessage::decode(r, metadata(None))?;
                self.messages.push(message);
                if r.remaining() > 0 {
                    return Err(DecodeError::TrailingBytes { offset: r.offset() });
                }
            }
        }
        Ok(())
    }
}

// =======================================================================
// Header sections (fixed protocol order)
// =======================================================================

fn encode_publisher_id(
    msg: &NetworkMessage,
    _mask: ContentMask,
    w: &mut CursorMut<'_>,
) -> EncodeResult<()> {
    let pid = msg
        .publisher_id
        .ok_or(EncodeError::InvalidParameter("publisher id absent"))?;
    match pid {
        PublisherId::Byte(v) => w.write_u8(v),
        PublisherId::UInt16(v) => w.write_u16(v),
        PublisherId::UInt32(v) => w.write_u32(v),
        PublisherId::UInt64(v) => w.write_u64(v),
        PublisherId::Guid(v) => w.write_bytes(&v),
    }
}

fn decode_publisher_id(
    msg: &mut NetworkMessage,
    state: &DecodeState,
    r: &mut Cursor<'_>,
) -> DecodeResult<()> {
    let id_type = PublisherIdType::from_u8(state.ext1 & EXT1_PUBLISHER_ID_TYPE_MASK)?;
    let pid = match id_type {
        PublisherIdType::Byte => PublisherId::Byte(r.read_u8()?),
        PublisherIdType::UInt16 => PublisherId::UInt16(r.read_u16()?),
        PublisherIdType::UInt32 => PublisherId::UInt32(r.read_u32()?),
        PublisherIdType::UInt64 => PublisherId::UInt64(r.read_u64()?),
        PublisherIdType::Guid => {
            let mut guid = [0u8; 16];
            guid.copy_from_slice(r.read_bytes(16)?);
            PublisherId::Guid(guid)
        }
    };
    msg.publisher_id = Some(pid);
    Ok(())
}

fn encode_group_header(
    msg: &NetworkMessage,
    mask: ContentMask,
    w: &mut CursorMut<'_>,
) -> EncodeResult<()> {
    let header = msg.group_header.unwrap_or_default();
    let mut group_flags = 0u8;
    if mask.contains(ContentMask::WRITER_GROUP_ID) {
        group_flags |= GROUP_FLAG_WRITER_GROUP_ID;
    }
    if mask.contains(ContentMask::GROUP_VERSION) {
        group_flags |= GROUP_FLAG_GROUP_VERSION;
    }
    if mask.contains(ContentMask::SEQUENCE_NUMBER) {
        group_flags |= GROUP_FLAG_SEQUENCE_NUMBER;
    }
    w.write_u8(group_flags)?;

    if group_flags & GROUP_FLAG_WRITER_GROUP_ID != 0 {
        let id = header
            .writer_group_id
            .ok_or(EncodeError::InvalidParameter("writer group id absent"))?;
        w.write_u16(id)?;
    }
    if group_flags & GROUP_FLAG_GROUP_VERSION != 0 {
        let version = header
            .group_version
            .ok_or(EncodeError::InvalidParameter("group version absent"))?;
        w.write_u32(version)?;
    }
    if group_flags & GROUP_FLAG_SEQUENCE_NUMBER != 0 {
        let seq = header
            .sequence_number
            .ok_or(EncodeError::InvalidParameter("sequence number absent"))?;
        w.write_u16(seq)?;
    }
    Ok(())
}

fn decode_group_header(
    msg: &mut NetworkMessage,
    _state: &DecodeState,
    r: &mut Cursor<'_>,
) -> DecodeResult<()> {
    let group_flags = r.read_u8()?;
    let known =
        GROUP_FLAG_WRITER_GROUP_ID | GROUP_FLAG_GROUP_VERSION | GROUP_FLAG_SEQUENCE_NUMBER;
    if group_flags & !known != 0 {
        return Err(DecodeError::InvalidHeader("reserved group flags set"));
    }

    let mut header = GroupHeader::default();
    if group_flags & GROUP_FLAG_WRITER_GROUP_ID != 0 {
        header.writer_group_id = Some(r.read_u16()?);
    }
    if group_flags & GROUP_FLAG_GROUP_VERSION != 0 {
        header.group_version = Some(r.read_u32()?);
    }
    if group_flags & GROUP_FLAG_SEQUENCE_NUMBER != 0 {
        header.sequence_number = Some(r.read_u16()?);
    }
    msg.group_header = Some(header);
    Ok(())
}

fn encode_payload_header(
    msg: &NetworkMessage,
    _mask: ContentMask,
    w: &mut CursorMut<'_>,
) -> EncodeResult<()> {
    let ids = msg
        .dataset_writer_ids
        .as_ref()
        .ok_or(EncodeError::InvalidParameter("payload header absent"))?;
    if ids.len() != msg.messages.len() {
        return Err(EncodeError::InvalidParameter(
            "writer id count disagrees with dataset messages",
        ));
    }
    let count =
        u8::try_from(ids.len()).map_err(|_| EncodeError::InvalidParameter("too many messages"))?;
    w.write_u8(count)?;
    for id in ids {
        w.write_u16(*id)?;
    }
    Ok(())
}

fn decode_payload_header(
    msg: &mut NetworkMessage,
    _state: &DecodeState,
    r: &mut Cursor<'_>,
) -> DecodeResult<()> {
    let count = r.read_u8()? as usize;
    if count == 0 {
        return Err(DecodeError::InvalidHeader("payload header declares zero messages"));
    }
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(r.read_u16()?);
    }
    msg.dataset_writer_ids = Some(ids);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Variant;
    use crate::protocol::uadp::DataSetMessage;

    fn full_mask() -> ContentMask {
        ContentMask::PUBLISHER_ID
            | ContentMask::GROUP_HEADER
            | ContentMask::WRITER_GROUP_ID
            | ContentMask::GROUP_VERSION
            | ContentMask::SEQUENCE_NUMBER
            | ContentMask::PAYLOAD_HEADER
    }

    fn sample_message() -> NetworkMessage {
        NetworkMessage {
            publisher_id: Some(PublisherId::UInt16(2234)),
            group_header: Some(GroupHeader {
                writer_group_id: Some(100),
                group_version: Some(7),
                sequence_number: Some(42),
            }),
            dataset_writer_ids: Some(vec![62541]),
            messages: vec![DataSetMessage::key_frame(vec![Variant::UInt32(1000)])],
        }
    }

    fn roundtrip(msg: &NetworkMessage, mask: ContentMask) -> NetworkMessage {
        let mut buf = [0u8; 512];
        let written = msg.encode(mask, &mut buf).expect("encode");
        NetworkMessage::decode(&buf[..written]).expect("decode")
    }

    #[test]
    fn test_full_mask_roundtrip() {
        let msg = sample_message();
        let decoded = roundtrip(&msg, full_mask());
        assert_eq!(decoded, msg);
        assert_eq!(decoded.content_mask(), full_mask());
    }

    #[test]
    fn test_mask_subsets_roundtrip() {
        let msg = sample_message();
        let subsets = [
            ContentMask::NONE,
            ContentMask::PUBLISHER_ID,
            ContentMask::GROUP_HEADER | ContentMask::WRITER_GROUP_ID,
            ContentMask::GROUP_HEADER | ContentMask::GROUP_VERSION,
            ContentMask::GROUP_HEADER | ContentMask::SEQUENCE_NUMBER,
            ContentMask::PAYLOAD_HEADER,
            ContentMask::PUBLISHER_ID | ContentMask::PAYLOAD_HEADER,
        ];
        for mask in subsets {
            let decoded = roundtrip(&msg, mask);
            // Restricted to the fields the mask includes, decode == encode input.
            assert_eq!(decoded.content_mask(), mask, "mask {:?}", mask);
            if mask.contains(ContentMask::PUBLISHER_ID) {
                assert_eq!(decoded.publisher_id, msg.publisher_id);
            } else {
                assert_eq!(decoded.publisher_id, None);
            }
            assert_eq!(decoded.messages, msg.messages);
        }
    }

    #[test]
    fn test_publisher_id_width_variants() {
        for pid in [
            PublisherId::Byte(9),
            PublisherId::UInt16(2234),
            PublisherId::UInt32(70000),
            PublisherId::UInt64(1 << 40),
            PublisherId::Guid([0xAB; 16]),
        ] {
            let msg = NetworkMessage {
                publisher_id: Some(pid),
                messages: vec![DataSetMessage::key_frame(vec![Variant::Byte(1)])],
                ..NetworkMessage::default()
            };
            let decoded = roundtrip(&msg, ContentMask::PUBLISHER_ID);
            assert_eq!(decoded.publisher_id, Some(pid));
        }
    }

    #[test]
    fn test_truncated_publisher_id_rejected() {
        let msg = NetworkMessage {
            publisher_id: Some(PublisherId::UInt32(70000)),
            messages: vec![DataSetMessage::key_frame(vec![Variant::Byte(1)])],
            ..NetworkMessage::default()
        };
        let mut buf = [0u8; 64];
        let written = msg.encode(ContentMask::PUBLISHER_ID, &mut buf).unwrap();
        // Cut inside the publisher id (flags + ext1 + 2 of 4 id bytes).
        let result = NetworkMessage::decode(&buf[..4.min(written)]);
        assert!(matches!(
            result,
            Err(DecodeError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_masked_out_field_not_written() {
        let msg = sample_message();
        let mut buf = [0u8; 512];
        let written = msg
            .encode(ContentMask::GROUP_HEADER | ContentMask::WRITER_GROUP_ID, &mut buf)
            .expect("encode");
        let decoded = NetworkMessage::decode(&buf[..written]).expect("decode");
        let gh = decoded.group_header.expect("group header");
        assert_eq!(gh.writer_group_id, Some(100));
        assert_eq!(gh.group_version, None);
        assert_eq!(gh.sequence_number, None);
    }

    #[test]
    fn test_masked_in_but_absent_field_fails() {
        let msg = NetworkMessage {
            messages: vec![DataSetMessage::key_frame(vec![Variant::Byte(1)])],
            ..NetworkMessage::default()
        };
        let mut buf = [0u8; 64];
        assert_eq!(
            msg.encode(ContentMask::PUBLISHER_ID, &mut buf),
            Err(EncodeError::InvalidParameter("publisher id absent"))
        );
    }

    #[test]
    fn test_payload_header_count_mismatch_on_encode() {
        let msg = NetworkMessage {
            dataset_writer_ids: Some(vec![1, 2]),
            messages: vec![DataSetMessage::key_frame(vec![Variant::Byte(1)])],
            ..NetworkMessage::default()
        };
        let mut buf = [0u8; 64];
        assert!(matches!(
            msg.encode(ContentMask::PAYLOAD_HEADER, &mut buf),
            Err(EncodeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_payload_header_mismatch_on_decode() {
        // Declare two messages in the payload header but provide one.
        let msg = NetworkMessage {
            dataset_writer_ids: Some(vec![10]),
            messages: vec![DataSetMessage::key_frame(vec![Variant::UInt32(5)])],
            ..NetworkMessage::default()
        };
        let mut buf = [0u8; 64];
        let written = msg.encode(ContentMask::PAYLOAD_HEADER, &mut buf).unwrap();
        // Patch the count byte (first payload-header byte, right after flags).
        buf[1] = 2;
        // The second writer id now swallows payload bytes, so the single
        // message runs short.
        let result = NetworkMessage::decode(&buf[..written]);
        assert!(
            matches!(result, Err(DecodeError::PayloadHeaderMismatch { .. }))
                || matches!(result, Err(DecodeError::BufferTooShort { .. })),
            "unexpected result: {:?}",
            result
        );
    }

    #[test]
    fn test_trailing_bytes_mean_more_messages_than_declared() {
        let msg = NetworkMessage {
            dataset_writer_ids: Some(vec![10]),
            messages: vec![DataSetMessage::key_frame(vec![Variant::UInt32(5)])],
            ..NetworkMessage::default()
        };
        let mut buf = [0u8; 64];
        let written = msg.encode(ContentMask::PAYLOAD_HEADER, &mut buf).unwrap();
        // Append a stray byte after the declared message.
        let result = NetworkMessage::decode(&buf[..written + 1]);
        assert_eq!(
            result,
            Err(DecodeError::PayloadHeaderMismatch {
                declared: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn test_multi_message_payload_with_sizes() {
        let msg = NetworkMessage {
            dataset_writer_ids: Some(vec![1, 2]),
            messages: vec![
                DataSetMessage::key_frame(vec![Variant::UInt32(5)]),
                DataSetMessage::key_frame(vec![Variant::Double(0.5), Variant::Boolean(true)]),
            ],
            ..NetworkMessage::default()
        };
        let decoded = roundtrip(&msg, ContentMask::PAYLOAD_HEADER);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let buf = [0x02u8, 0x00];
        assert_eq!(
            NetworkMessage::decode(&buf),
            Err(DecodeError::InvalidHeader("unsupported UADP version"))
        );
    }
}
