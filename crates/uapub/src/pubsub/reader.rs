// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DataSetReader: matches incoming messages and writes decoded fields
//! into target variables.

use super::{Error, Result};
use crate::model::{DataSetMetaData, DataValue, InformationModel, NodeIdentity, Variant};
use crate::protocol::uadp::{ContentMask, DataSetBody, DataSetMessage, NetworkMessage, PublisherId};
use crate::protocol::DecodeError;

/// Target variable one decoded field is written into (positional).
#[derive(Debug, Clone)]
pub struct TargetVariable {
    pub node: NodeIdentity,
}

impl TargetVariable {
    pub fn new(node: NodeIdentity) -> Self {
        TargetVariable { node }
    }
}

/// Configuration of one DataSetReader.
#[derive(Debug, Clone)]
pub struct DataSetReaderConfig {
    pub name: String,
    /// Expected publisher id (first component of the match key).
    pub publisher_id: PublisherId,
    /// Expected writer group id (second component).
    pub writer_group_id: u16,
    /// Expected dataset writer id (third component).
    pub dataset_writer_id: u16,
    /// Field types of the subscribed dataset, in payload order.
    pub metadata: DataSetMetaData,
    /// One target variable per field, by position.
    pub target_variables: Vec<TargetVariable>,
    /// Sections the publisher is expected to emit.
    pub content_mask: ContentMask,
}

/// A configured DataSetReader.
#[derive(Debug)]
pub struct DataSetReader {
    config: DataSetReaderConfig,
}

impl DataSetReader {
    pub(crate) fn new(config: DataSetReaderConfig) -> Self {
        DataSetReader { config }
    }

    pub fn config(&self) -> &DataSetReaderConfig {
        &self.config
    }

    /// Match an incoming message against the (publisher id, writer group
    /// id, dataset writer id) key. All three must be present and equal.
    pub(crate) fn matches(&self, msg: &NetworkMessage, dataset_writer_id: Option<u16>) -> bool {
        msg.publisher_id == Some(self.config.publisher_id)
            && msg
                .group_header
                .and_then(|gh| gh.writer_group_id)
                == Some(self.config.writer_group_id)
            && dataset_writer_id == Some(self.config.dataset_writer_id)
    }

    /// Write the fields of one matched DataSetMessage into the target
    /// variables.
    ///
    /// Writes happen in field order; a type mismatch aborts the message
    /// with a decode error, leaving fields already written in place
    /// (partial writes are allowed, see DESIGN.md).
    pub(crate) fn process_message(
        &self,
        message: &DataSetMessage,
        model: &mut dyn InformationModel,
    ) -> Result<()> {
        match &message.body {
            DataSetBody::KeyFrame(fields) | DataSetBody::Raw(fields) => {
                if fields.len() != self.config.target_variables.len() {
                    return Err(Error::Decode(DecodeError::FieldCountMismatch {
                        declared: fields.len(),
                        expected: self.config.target_variables.len(),
                    }));
                }
                for (index, value) in fields.iter().enumerate() {
                    self.write_field(index, value, model)?;
                }
            }
            DataSetBody::Delta(entries) => {
                for (index, value) in entries {
                    self.write_field(*index as usize, value, model)?;
                }
            }
        }
        Ok(())
    }

    fn write_field(
        &self,
        index: usize,
        value: &Variant,
        model: &mut dyn InformationModel,
    ) -> Result<()> {
        let meta = self
            .config
            .metadata
            .fields
            .get(index)
            .ok_or(Error::Decode(DecodeError::FieldMismatch {
                field: index,
                expected: "field index within metadata",
            }))?;
        if value.type_id() != meta.built_in_type {
            return Err(Error::Decode(DecodeError::FieldMismatch {
                field: index,
                expected: "decoded type equals metadata type",
            }));
        }
        let target = self
            .config
            .target_variables
            .get(index)
            .ok_or(Error::Decode(DecodeError::FieldMismatch {
                field: index,
                expected: "target variable for field",
            }))?;
        model.write_value(&target.node, DataValue::new(value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuiltInType, FieldMetaData, MemoryModel};
    use crate::protocol::uadp::GroupHeader;

    fn reader() -> DataSetReader {
        DataSetReader::new(DataSetReaderConfig {
            name: "DataSetReader Test".to_string(),
            publisher_id: PublisherId::UInt16(2234),
            writer_group_id: 100,
            dataset_writer_id: 62541,
            metadata: DataSetMetaData::new(
                "DataSet Test",
                vec![FieldMetaData::scalar("value", BuiltInType::UInt32)],
            ),
            target_variables: vec![TargetVariable::new(NodeIdentity::numeric(1, 50002))],
            content_mask: ContentMask::NONE,
        })
    }

    fn header_only(publisher: u16, group: u16) -> NetworkMessage {
        NetworkMessage {
            publisher_id: Some(PublisherId::UInt16(publisher)),
            group_header: Some(GroupHeader {
                writer_group_id: Some(group),
                ..GroupHeader::default()
            }),
            ..NetworkMessage::default()
        }
    }

    #[test]
    fn test_triple_match() {
        let r = reader();
        assert!(r.matches(&header_only(2234, 100), Some(62541)));
        assert!(!r.matches(&header_only(2234, 100), Some(1)));
        assert!(!r.matches(&header_only(2234, 99), Some(62541)));
        assert!(!r.matches(&header_only(1, 100), Some(62541)));
        // Absent components never match.
        assert!(!r.matches(&NetworkMessage::default(), Some(62541)));
        assert!(!r.matches(&header_only(2234, 100), None));
    }

    #[test]
    fn test_process_writes_target() {
        let r = reader();
        let mut model = MemoryModel::new();
        model.add_node(
            NodeIdentity::numeric(1, 50002),
            DataValue::new(Variant::UInt32(0)),
        );
        r.process_message(
            &DataSetMessage::key_frame(vec![Variant::UInt32(1000)]),
            &mut model,
        )
        .expect("process");
        let read = model.read_value(&NodeIdentity::numeric(1, 50002)).unwrap();
        assert_eq!(read.value, Variant::UInt32(1000));
    }

    #[test]
    fn test_type_mismatch_is_decode_error() {
        let r = reader();
        let mut model = MemoryModel::new();
        model.add_node(
            NodeIdentity::numeric(1, 50002),
            DataValue::new(Variant::UInt32(0)),
        );
        let result = r.process_message(
            &DataSetMessage::key_frame(vec![Variant::Double(1.0)]),
            &mut model,
        );
        assert!(matches!(
            result,
            Err(Error::Decode(DecodeError::FieldMismatch { field: 0, .. }))
        ));
    }
}
