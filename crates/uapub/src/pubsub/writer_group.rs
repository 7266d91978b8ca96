// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WriterGroup: publish-side container and state machine.
//!
//! Configuration (writers, message settings, channel) mutates only while
//! Unfrozen. Freezing in fixed-size mode pre-encodes the whole network
//! message once; the publish cycle then rewrites field bytes and the
//! sequence number in place and hands the same buffer to the channel.
//! Publishing happens only while Operational and Frozen.

use super::dataset::PublishedDataSet;
use super::writer::{DataSetWriter, DataSetWriterConfig};
use super::{Error, Result, RtLevel};
use crate::config::MAX_NETWORK_MESSAGE_SIZE;
use crate::model::InformationModel;
use crate::protocol::uadp::{ContentMask, GroupHeader, NetworkMessage, PublisherId};
use crate::protocol::EncodeError;
use crate::rt::{compute_layout, BufferedSendMessage};
use crate::transport::Channel;
use std::time::Duration;

/// Configuration of a WriterGroup.
#[derive(Debug, Clone)]
pub struct WriterGroupConfig {
    pub name: String,
    /// Wire identity carried in the group header.
    pub writer_group_id: u16,
    /// Publisher identity of this application.
    pub publisher_id: PublisherId,
    pub publishing_interval: Duration,
    pub rt_level: RtLevel,
    /// Sections emitted per message.
    pub content_mask: ContentMask,
    /// Configuration version carried when `GROUP_VERSION` is masked in.
    pub group_version: u32,
}

impl WriterGroupConfig {
    pub fn new(name: &str, writer_group_id: u16, publisher_id: PublisherId) -> Self {
        WriterGroupConfig {
            name: name.to_string(),
            writer_group_id,
            publisher_id,
            publishing_interval: Duration::from_millis(100),
            rt_level: RtLevel::None,
            content_mask: ContentMask::PUBLISHER_ID
                | ContentMask::GROUP_HEADER
                | ContentMask::WRITER_GROUP_ID
                | ContentMask::PAYLOAD_HEADER,
            group_version: 0,
        }
    }
}

enum FreezeState {
    Unfrozen,
    /// `buffered` is `None` for rt level `None` (freeze only locks the
    /// configuration, no precomputed layout).
    Frozen {
        buffered: Option<BufferedSendMessage>,
    },
}

/// Publish-side group: owns its writers, channel and freeze state.
pub struct WriterGroup {
    config: WriterGroupConfig,
    writers: Vec<DataSetWriter>,
    operational: bool,
    state: FreezeState,
    sequence_number: u16,
    channel: Option<Box<dyn Channel>>,
}

impl WriterGroup {
    pub fn new(config: WriterGroupConfig) -> Result<Self> {
        if config.name.is_empty() {
            return Err(Error::InvalidArgument("group name must not be empty"));
        }
        validate_mask(config.content_mask)?;
        Ok(WriterGroup {
            config,
            writers: Vec::new(),
            operational: false,
            state: FreezeState::Unfrozen,
            sequence_number: 0,
            channel: None,
        })
    }

    pub fn config(&self) -> &WriterGroupConfig {
        &self.config
    }

    pub fn writers(&self) -> &[DataSetWriter] {
        &self.writers
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.state, FreezeState::Frozen { .. })
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }

    fn ensure_unfrozen(&self) -> Result<()> {
        if self.is_frozen() {
            return Err(Error::ConfigurationLocked);
        }
        Ok(())
    }

    /// Attach the transport channel this group publishes through.
    pub fn set_channel(&mut self, channel: Box<dyn Channel>) -> Result<()> {
        self.ensure_unfrozen()?;
        self.channel = Some(channel);
        Ok(())
    }

    /// Add a DataSetWriter publishing `dataset`.
    ///
    /// When the group targets fixed-size RT, every dataset field must
    /// already carry a static or external value source; a field bound
    /// only to an address-space attribute fails here, at add time.
    pub fn add_dataset_writer(
        &mut self,
        config: DataSetWriterConfig,
        dataset: PublishedDataSet,
    ) -> Result<()> {
        self.ensure_unfrozen()?;
        if self
            .writers
            .iter()
            .any(|w| w.config().dataset_writer_id == config.dataset_writer_id)
        {
            return Err(Error::ConfigurationError(format!(
                "dataset writer id {} already in group '{}'",
                config.dataset_writer_id, self.config.name
            )));
        }
        if self.config.rt_level == RtLevel::FixedSize {
            for field in dataset.fields() {
                if !field.source.is_rt_capable() {
                    return Err(Error::ConfigurationError(format!(
                        "field '{}' of dataset '{}' has no static or external value source",
                        field.name, dataset.name
                    )));
                }
            }
        }
        log::debug!(
            "[GROUP] writer group '{}': add dataset writer {} ({})",
            self.config.name,
            config.dataset_writer_id,
            config.name
        );
        self.writers.push(DataSetWriter::new(config, dataset));
        Ok(())
    }

    pub fn remove_dataset_writer(&mut self, dataset_writer_id: u16) -> Result<()> {
        self.ensure_unfrozen()?;
        let index = self
            .writers
            .iter()
            .position(|w| w.config().dataset_writer_id == dataset_writer_id)
            .ok_or_else(|| {
                Error::ConfigurationError(format!(
                    "no dataset writer {} in group '{}'",
                    dataset_writer_id, self.config.name
                ))
            })?;
        self.writers.remove(index);
        Ok(())
    }

    /// Replace the message content mask (message settings mutation).
    pub fn set_content_mask(&mut self, mask: ContentMask) -> Result<()> {
        self.ensure_unfrozen()?;
        validate_mask(mask)?;
        self.config.content_mask = mask;
        Ok(())
    }

    /// Lock the configuration. In fixed-size mode this validates the
    /// layout and pre-encodes the send buffer; on any failure the
    /// configuration is left unchanged and the group stays Unfrozen.
    /// Calling on an already frozen group is a no-op success.
    pub fn freeze(&mut self) -> Result<()> {
        if self.is_frozen() {
            return Ok(());
        }
        let buffered = match self.config.rt_level {
            RtLevel::None => None,
            RtLevel::FixedSize => Some(self.build_send_buffer()?),
        };
        self.state = FreezeState::Frozen { buffered };
        log::info!("[GROUP] writer group '{}' frozen", self.config.name);
        Ok(())
    }

    fn build_send_buffer(&mut self) -> Result<BufferedSendMessage> {
        if self.writers.is_empty() {
            return Err(Error::ConfigurationError(format!(
                "fixed-size freeze of group '{}' requires at least one dataset writer",
                self.config.name
            )));
        }
        let metas: Vec<_> = self.writers.iter().map(|w| w.dataset().metadata()).collect();
        let meta_refs: Vec<_> = metas.iter().collect();
        let layout = compute_layout(
            self.config.content_mask,
            Some(self.config.publisher_id.id_type()),
            &meta_refs,
        )?;

        let mut messages = Vec::with_capacity(self.writers.len());
        let mut ids = Vec::with_capacity(self.writers.len());
        for writer in &mut self.writers {
            ids.push(writer.config().dataset_writer_id);
            messages.push(writer.sample_raw_frame(None)?);
        }
        let template = NetworkMessage {
            publisher_id: Some(self.config.publisher_id),
            group_header: Some(GroupHeader {
                writer_group_id: Some(self.config.writer_group_id),
                group_version: Some(self.config.group_version),
                sequence_number: Some(self.sequence_number),
            }),
            dataset_writer_ids: Some(ids),
            messages,
        };
        let mut buf = vec![0u8; layout.total_len];
        let written = template.encode(self.config.content_mask, &mut buf)?;
        if written != layout.total_len {
            return Err(Error::Encode(EncodeError::InvalidParameter(
                "encoded size disagrees with computed layout",
            )));
        }
        BufferedSendMessage::new(buf, layout)
    }

    /// Discard the frozen layout and unlock the configuration.
    /// Calling on an already unfrozen group is a no-op success.
    pub fn unfreeze(&mut self) -> Result<()> {
        if self.is_frozen() {
            self.state = FreezeState::Unfrozen;
            log::info!("[GROUP] writer group '{}' unfrozen", self.config.name);
        }
        Ok(())
    }

    /// Enable publishing. Independent of the freeze state; the publish
    /// cycle itself is a no-op until the group is also frozen.
    pub fn set_operational(&mut self) {
        self.operational = true;
        log::info!("[GROUP] writer group '{}' operational", self.config.name);
    }

    pub fn set_disabled(&mut self) {
        self.operational = false;
        log::info!("[GROUP] writer group '{}' disabled", self.config.name);
    }

    /// One publishing cycle: sample every writer's fields and send one
    /// NetworkMessage. No-op unless Operational and Frozen.
    ///
    /// `model` is only consulted for fields with an address-space value
    /// source (dynamic mode).
    pub fn publish_cycle(&mut self, model: Option<&dyn InformationModel>) -> Result<()> {
        if !self.operational {
            return Ok(());
        }
        let seq = self.sequence_number.wrapping_add(1);
        match &mut self.state {
            FreezeState::Unfrozen => Ok(()),
            FreezeState::Frozen {
                buffered: Some(buffered),
            } => {
                let channel = self
                    .channel
                    .as_mut()
                    .ok_or(Error::InvalidArgument("writer group has no channel"))?;
                for slot in 0..buffered.field_count() {
                    let (message_index, field_index) = match buffered.field(slot) {
                        Some(fo) => (fo.message_index, fo.field_index),
                        None => break,
                    };
                    let writer = self
                        .writers
                        .get_mut(message_index)
                        .ok_or(Error::InvalidArgument("layout references unknown writer"))?;
                    let field = writer
                        .dataset_mut()
                        .fields_mut()
                        .get_mut(field_index)
                        .ok_or(Error::InvalidArgument("layout references unknown field"))?;
                    let value = field.sample(model)?;
                    buffered.write_field(slot, &value)?;
                }
                buffered.set_sequence_number(seq);
                self.sequence_number = seq;
                channel.send(buffered.bytes())?;
                log::debug!(
                    "[GROUP] writer group '{}' published fixed-size message seq={}",
                    self.config.name,
                    seq
                );
                Ok(())
            }
            FreezeState::Frozen { buffered: None } => {
                let channel = self
                    .channel
                    .as_mut()
                    .ok_or(Error::InvalidArgument("writer group has no channel"))?;
                let mut messages = Vec::with_capacity(self.writers.len());
                let mut ids = Vec::with_capacity(self.writers.len());
                for writer in &mut self.writers {
                    ids.push(writer.config().dataset_writer_id);
                    messages.push(writer.sample_key_frame(model)?);
                }
                let message = NetworkMessage {
                    publisher_id: Some(self.config.publisher_id),
                    group_header: Some(GroupHeader {
                        writer_group_id: Some(self.config.writer_group_id),
                        group_version: Some(self.config.group_version),
                        sequence_number: Some(seq),
                    }),
                    dataset_writer_ids: Some(ids),
                    messages,
                };
                let mut buf = vec![0u8; MAX_NETWORK_MESSAGE_SIZE];
                let written = message.encode(self.config.content_mask, &mut buf)?;
                self.sequence_number = seq;
                channel.send(&buf[..written])?;
                log::debug!(
                    "[GROUP] writer group '{}' published dynamic message seq={} ({} bytes)",
                    self.config.name,
                    seq,
                    written
                );
                Ok(())
            }
        }
    }
}

/// Group-header subfield bits require the group header itself.
fn validate_mask(mask: ContentMask) -> Result<()> {
    let subfields = ContentMask::WRITER_GROUP_ID
        | ContentMask::GROUP_VERSION
        | ContentMask::SEQUENCE_NUMBER;
    if !mask.contains(ContentMask::GROUP_HEADER)
        && (mask.bits() & subfields.bits()) != 0
    {
        return Err(Error::InvalidArgument(
            "group header fields masked in without the group header",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuiltInType, DataValue, Variant};
    use crate::pubsub::dataset::{DataSetField, FieldSource};

    fn static_field(name: &str, value: Variant) -> DataSetField {
        let ty = value.type_id();
        DataSetField::new(
            name,
            ty,
            FieldSource::Static(std::sync::Arc::new(parking_lot::RwLock::new(
                DataValue::new(value),
            ))),
        )
    }

    fn rt_group() -> WriterGroup {
        let mut config =
            WriterGroupConfig::new("Demo WriterGroup", 100, PublisherId::UInt16(2234));
        config.rt_level = RtLevel::FixedSize;
        WriterGroup::new(config).expect("group")
    }

    #[test]
    fn test_subfield_mask_without_group_header_rejected() {
        let mut config = WriterGroupConfig::new("g", 1, PublisherId::Byte(1));
        config.content_mask = ContentMask::WRITER_GROUP_ID;
        assert!(matches!(
            WriterGroup::new(config),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_model_sourced_field_rejected_at_add_time_in_rt_mode() {
        let mut group = rt_group();
        let mut pds = PublishedDataSet::new("Demo PDS");
        pds.add_field(DataSetField::new(
            "value",
            BuiltInType::UInt32,
            FieldSource::Model(crate::model::NodeIdentity::numeric(1, 1000)),
        ));
        let result = group.add_dataset_writer(DataSetWriterConfig::new("w", 62541), pds);
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
        assert!(group.writers().is_empty());
    }

    #[test]
    fn test_duplicate_writer_id_rejected() {
        let mut group = rt_group();
        let pds = PublishedDataSet::new("a").with_field(static_field("x", Variant::UInt32(1)));
        group
            .add_dataset_writer(DataSetWriterConfig::new("w1", 62541), pds)
            .expect("first add");
        let pds = PublishedDataSet::new("b").with_field(static_field("y", Variant::UInt32(2)));
        assert!(matches!(
            group.add_dataset_writer(DataSetWriterConfig::new("w2", 62541), pds),
            Err(Error::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_mutation_locked_while_frozen() {
        let mut group = rt_group();
        let pds = PublishedDataSet::new("a").with_field(static_field("x", Variant::UInt32(1)));
        group
            .add_dataset_writer(DataSetWriterConfig::new("w", 62541), pds)
            .expect("add");
        group.freeze().expect("freeze");

        let pds = PublishedDataSet::new("b").with_field(static_field("y", Variant::UInt32(2)));
        assert!(matches!(
            group.add_dataset_writer(DataSetWriterConfig::new("w2", 7), pds),
            Err(Error::ConfigurationLocked)
        ));
        assert!(matches!(
            group.remove_dataset_writer(62541),
            Err(Error::ConfigurationLocked)
        ));
        assert!(matches!(
            group.set_content_mask(ContentMask::NONE),
            Err(Error::ConfigurationLocked)
        ));

        group.unfreeze().expect("unfreeze");
        group.remove_dataset_writer(62541).expect("remove after unfreeze");
    }

    #[test]
    fn test_freeze_unfreeze_idempotent() {
        let mut group = rt_group();
        let pds = PublishedDataSet::new("a").with_field(static_field("x", Variant::UInt32(1)));
        group
            .add_dataset_writer(DataSetWriterConfig::new("w", 62541), pds)
            .expect("add");
        group.freeze().expect("freeze");
        group.freeze().expect("freeze again is a no-op");
        group.unfreeze().expect("unfreeze");
        group.unfreeze().expect("unfreeze again is a no-op");
    }

    #[test]
    fn test_freeze_failure_leaves_group_unfrozen() {
        let mut config = WriterGroupConfig::new("g", 1, PublisherId::Byte(1));
        config.rt_level = RtLevel::FixedSize;
        let mut group = WriterGroup::new(config).expect("group");
        let pds =
            PublishedDataSet::new("a").with_field(static_field("stamp", Variant::DateTime(0)));
        group
            .add_dataset_writer(DataSetWriterConfig::new("w", 1), pds)
            .expect("add");

        assert!(matches!(group.freeze(), Err(Error::NotSupported(_))));
        assert!(!group.is_frozen());
        // Still mutable after the failed freeze.
        group.remove_dataset_writer(1).expect("remove");
    }

    #[test]
    fn test_publish_requires_frozen_and_operational() {
        let mut group = rt_group();
        let pds = PublishedDataSet::new("a").with_field(static_field("x", Variant::UInt32(1)));
        group
            .add_dataset_writer(DataSetWriterConfig::new("w", 62541), pds)
            .expect("add");
        // Not operational: no-op even without a channel.
        group.publish_cycle(None).expect("disabled cycle is a no-op");
        group.set_operational();
        // Operational but unfrozen: publishing must not start.
        group.publish_cycle(None).expect("unfrozen cycle is a no-op");
        assert_eq!(group.sequence_number(), 0);
    }
}
