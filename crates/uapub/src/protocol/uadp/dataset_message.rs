// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DataSetMessage encoding (header byte + key-frame / raw / delta body).
//!
//! RawData bodies carry no type tags; the decoder needs the reader's
//! dataset metadata and fails closed without it.

use crate::model::{BuiltInType, DataSetMetaData, Variant};
use crate::protocol::cursor::{Cursor, CursorMut};
use crate::protocol::{DecodeError, DecodeResult, EncodeError, EncodeResult};

/// DataSetMessage header byte, bit 0: message valid.
const DSM_FLAG_VALID: u8 = 1 << 0;
/// Header byte bits 1-2: field encoding.
const DSM_ENCODING_SHIFT: u8 = 1;
const DSM_ENCODING_MASK: u8 = 0x03;

/// Field encoding of a DataSetMessage body (2-bit enum on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldEncoding {
    /// Self-describing: one Variant (type byte + value) per field.
    Variant = 0,
    /// Fixed-width raw values, types supplied out-of-band by metadata.
    RawData = 1,
    /// Delta frame: (field index, Variant) pairs for changed fields.
    KeyFrameDelta = 2,
}

impl FieldEncoding {
    fn from_bits(bits: u8) -> DecodeResult<FieldEncoding> {
        match bits {
            0 => Ok(FieldEncoding::Variant),
            1 => Ok(FieldEncoding::RawData),
            2 => Ok(FieldEncoding::KeyFrameDelta),
            _ => Err(DecodeError::InvalidHeader("reserved field encoding")),
        }
    }
}

/// Body of one DataSetMessage.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSetBody {
    /// Full set of field values, Variant-encoded.
    KeyFrame(Vec<Variant>),
    /// Full set of field values, raw fixed-width encoded.
    Raw(Vec<Variant>),
    /// Changed fields only: (field index, value).
    Delta(Vec<(u16, Variant)>),
}

/// One dataset's field values inside a NetworkMessage payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSetMessage {
    pub valid: bool,
    pub body: DataSetBody,
}

impl DataSetMessage {
    pub fn key_frame(fields: Vec<Variant>) -> Self {
        DataSetMessage {
            valid: true,
            body: DataSetBody::KeyFrame(fields),
        }
    }

    pub fn raw_frame(fields: Vec<Variant>) -> Self {
        DataSetMessage {
            valid: true,
            body: DataSetBody::Raw(fields),
        }
    }

    pub fn delta_frame(entries: Vec<(u16, Variant)>) -> Self {
        DataSetMessage {
            valid: true,
            body: DataSetBody::Delta(entries),
        }
    }

    pub fn field_encoding(&self) -> FieldEncoding {
        match self.body {
            DataSetBody::KeyFrame(_) => FieldEncoding::Variant,
            DataSetBody::Raw(_) => FieldEncoding::RawData,
            DataSetBody::Delta(_) => FieldEncoding::KeyFrameDelta,
        }
    }

    /// Field values of a key-frame body (Variant or Raw), in order.
    pub fn fields(&self) -> Option<&[Variant]> {
        match &self.body {
            DataSetBody::KeyFrame(fields) | DataSetBody::Raw(fields) => Some(fields),
            DataSetBody::Delta(_) => None,
        }
    }

    pub fn encode(&self, w: &mut CursorMut<'_>) -> EncodeResult<()> {
        let mut header = (self.field_encoding() as u8) << DSM_ENCODING_SHIFT;
        if self.valid {
            header |= DSM_FLAG_VALID;
        }
        w.write_u8(header)?;

        match &self.body {
            DataSetBody::KeyFrame(fields) => {
                w.write_u16(field_count(fields.len())?)?;
                for value in fields {
                    encode_variant(w, value)?;
                }
            }
            DataSetBody::Raw(fields) => {
                w.write_u16(field_count(fields.len())?)?;
                for value in fields {
                    encode_raw_value(w, value)?;
                }
            }
            DataSetBody::Delta(entries) => {
                w.write_u16(field_count(entries.len())?)?;
                for (index, value) in entries {
                    w.write_u16(*index)?;
                    encode_variant(w, value)?;
                }
            }
        }
        Ok(())
    }

    /// Decode one DataSetMessage. `metadata` is required for RawData
    /// bodies and, when present, validates delta-frame field indices.
    pub fn decode(
        r: &mut Cursor<'_>,
        metadata: Option<&DataSetMetaData>,
    ) -> DecodeResult<DataSetMessage> {
        let header = r.read_u8()?;
        let valid = (header & DSM_FLAG_VALID) != 0;
        let encoding = FieldEncoding::from_bits((header >> DSM_ENCODING_SHIFT) & DSM_ENCODING_MASK)?;

        let body = match encoding {
            FieldEncoding::Variant => {
                let count = r.read_u16()? as usize;
                let mut fields = Vec::with_capacity(count);
                for _ in 0..count {
                    fields.push(decode_variant(r)?);
                }
                DataSetBody::KeyFrame(fields)
            }
            FieldEncoding::RawData => {
                let meta = metadata.ok_or(DecodeError::UnknownFieldType)?;
                let count = r.read_u16()? as usize;
                if count != meta.fields.len() {
                    return Err(DecodeError::FieldCountMismatch {
                        declared: count,
                        expected: meta.fields.len(),
                    });
                }
                let mut fields = Vec::with_capacity(count);
                for field_meta in &meta.fields {
                    fields.push(decode_raw_value(r, field_meta.built_in_type)?);
                }
                DataSetBody::Raw(fields)
            }
            FieldEncoding::KeyFrameDelta => {
                let count = r.read_u16()? as usize;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let index = r.read_u16()?;
                    if let Some(meta) = metadata {
                        if index as usize >= meta.fields.len() {
                            return Err(DecodeError::FieldMismatch {
                                field: index as usize,
                                expected: "delta index within metadata",
                            });
                        }
                    }
                    entries.push((index, decode_variant(r)?));
                }
                DataSetBody::Delta(entries)
            }
        };

        Ok(DataSetMessage { valid, body })
    }
}

fn field_count(len: usize) -> EncodeResult<u16> {
    u16::try_from(len).map_err(|_| EncodeError::InvalidParameter("more than 65535 fields"))
}

// =======================================================================
// Variant scalar encoding (OPC UA binary subset)
// =======================================================================

/// Encode one Variant: type byte followed by the little-endian value.
pub fn encode_variant(w: &mut CursorMut<'_>, value: &Variant) -> EncodeResult<()> {
    w.write_u8(value.type_id() as u8)?;
    match value {
        Variant::Boolean(v) => w.write_u8(u8::from(*v)),
        Variant::SByte(v) => w.write_i8(*v),
        Variant::Byte(v) => w.write_u8(*v),
        Variant::Int16(v) => w.write_i16(*v),
        Variant::UInt16(v) => w.write_u16(*v),
        Variant::Int32(v) => w.write_i32(*v),
        Variant::UInt32(v) => w.write_u32(*v),
        Variant::Int64(v) => w.write_i64(*v),
        Variant::UInt64(v) => w.write_u64(*v),
        Variant::Float(v) => w.write_f32(*v),
        Variant::Double(v) => w.write_f64(*v),
        Variant::DateTime(v) => w.write_i64(*v),
        Variant::String(v) => match v {
            None => w.write_i32(-1),
            Some(s) => {
                let len = i32::try_from(s.len())
                    .map_err(|_| EncodeError::InvalidParameter("string too long"))?;
                w.write_i32(len)?;
                w.write_bytes(s.as_bytes())
            }
        },
    }
}

/// Decode one Variant from its type byte.
pub fn decode_variant(r: &mut Cursor<'_>) -> DecodeResult<Variant> {
    let tag = r.read_u8()?;
    let ty = BuiltInType::from_u8(tag).ok_or(DecodeError::UnknownFieldType)?;
    match ty {
        BuiltInType::Boolean => Ok(Variant::Boolean(r.read_u8()? != 0)),
        BuiltInType::SByte => Ok(Variant::SByte(r.read_i8()?)),
        BuiltInType::Byte => Ok(Variant::Byte(r.read_u8()?)),
        BuiltInType::Int16 => Ok(Variant::Int16(r.read_i16()?)),
        BuiltInType::UInt16 => Ok(Variant::UInt16(r.read_u16()?)),
        BuiltInType::Int32 => Ok(Variant::Int32(r.read_i32()?)),
        BuiltInType::UInt32 => Ok(Variant::UInt32(r.read_u32()?)),
        BuiltInType::Int64 => Ok(Variant::Int64(r.read_i64()?)),
        BuiltInType::UInt64 => Ok(Variant::UInt64(r.read_u64()?)),
        BuiltInType::Float => Ok(Variant::Float(r.read_f32()?)),
        BuiltInType::Double => Ok(Variant::Double(r.read_f64()?)),
        BuiltInType::DateTime => Ok(Variant::DateTime(r.read_i64()?)),
        BuiltInType::String => {
            let len = r.read_i32()?;
            if len < 0 {
                return Ok(Variant::String(None));
            }
            let bytes = r.read_bytes(len as usize)?;
            let s = std::str::from_utf8(bytes)
                .map_err(|_| DecodeError::InvalidHeader("string is not valid UTF-8"))?;
            Ok(Variant::String(Some(s.to_string())))
        }
    }
}

/// Encode one value as raw fixed-width bytes (no type byte).
fn encode_raw_value(w: &mut CursorMut<'_>, value: &Variant) -> EncodeResult<()> {
    match value {
        Variant::Boolean(v) => w.write_u8(u8::from(*v)),
        Variant::SByte(v) => w.write_i8(*v),
        Variant::Byte(v) => w.write_u8(*v),
        Variant::Int16(v) => w.write_i16(*v),
        Variant::UInt16(v) => w.write_u16(*v),
        Variant::Int32(v) => w.write_i32(*v),
        Variant::UInt32(v) => w.write_u32(*v),
        Variant::Int64(v) => w.write_i64(*v),
        Variant::UInt64(v) => w.write_u64(*v),
        Variant::Float(v) => w.write_f32(*v),
        Variant::Double(v) => w.write_f64(*v),
        Variant::String(_) | Variant::DateTime(_) => Err(EncodeError::FieldNotEncodable(
            "type has no fixed-width raw encoding",
        )),
    }
}

/// Decode one raw fixed-width value as the metadata-declared type.
fn decode_raw_value(r: &mut Cursor<'_>, ty: BuiltInType) -> DecodeResult<Variant> {
    match ty {
        BuiltInType::Boolean => Ok(Variant::Boolean(r.read_u8()? != 0)),
        BuiltInType::SByte => Ok(Variant::SByte(r.read_i8()?)),
        BuiltInType::Byte => Ok(Variant::Byte(r.read_u8()?)),
        BuiltInType::Int16 => Ok(Variant::Int16(r.read_i16()?)),
        BuiltInType::UInt16 => Ok(Variant::UInt16(r.read_u16()?)),
        BuiltInType::Int32 => Ok(Variant::Int32(r.read_i32()?)),
        BuiltInType::UInt32 => Ok(Variant::UInt32(r.read_u32()?)),
        BuiltInType::Int64 => Ok(Variant::Int64(r.read_i64()?)),
        BuiltInType::UInt64 => Ok(Variant::UInt64(r.read_u64()?)),
        BuiltInType::Float => Ok(Variant::Float(r.read_f32()?)),
        BuiltInType::Double => Ok(Variant::Double(r.read_f64()?)),
        BuiltInType::String | BuiltInType::DateTime => Err(DecodeError::UnknownFieldType),
    }
}
