// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ReaderGroup: subscribe-side container and state machine.
//!
//! Incoming buffers are matched to DataSetReaders by the (publisher id,
//! writer group id, dataset writer id) triple. Unmatched traffic is
//! expected on a shared transport and is dropped silently. In fixed-size
//! mode the frozen receive template verifies the header bytes and field
//! values are read at fixed offsets, allocation-free.

use super::reader::{DataSetReader, DataSetReaderConfig};
use super::{Error, Result, RtLevel};
use crate::model::{DataValue, InformationModel, Variant};
use crate::protocol::uadp::{ContentMask, GroupHeader, NetworkMessage};
use crate::protocol::EncodeError;
use crate::rt::{compute_layout, BufferedReceiveMessage};
use crate::transport::Channel;
use std::time::Duration;

/// Configuration of a ReaderGroup.
#[derive(Debug, Clone)]
pub struct ReaderGroupConfig {
    pub name: String,
    pub rt_level: RtLevel,
}

impl ReaderGroupConfig {
    pub fn new(name: &str) -> Self {
        ReaderGroupConfig {
            name: name.to_string(),
            rt_level: RtLevel::None,
        }
    }

    pub fn fixed_size(name: &str) -> Self {
        ReaderGroupConfig {
            name: name.to_string(),
            rt_level: RtLevel::FixedSize,
        }
    }
}

/// Stable handle of a reader within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReaderId(u32);

enum FreezeState {
    Unfrozen,
    /// `buffered` is `None` for rt level `None`.
    Frozen {
        buffered: Option<BufferedReceiveMessage>,
    },
}

/// Subscribe-side group: owns its readers, channel and freeze state.
pub struct ReaderGroup {
    config: ReaderGroupConfig,
    readers: Vec<(ReaderId, DataSetReader)>,
    next_reader_id: u32,
    operational: bool,
    state: FreezeState,
    channel: Option<Box<dyn Channel>>,
}

impl ReaderGroup {
    pub fn new(config: ReaderGroupConfig) -> Result<Self> {
        if config.name.is_empty() {
            return Err(Error::InvalidArgument("group name must not be empty"));
        }
        Ok(ReaderGroup {
            config,
            readers: Vec::new(),
            next_reader_id: 0,
            operational: false,
            state: FreezeState::Unfrozen,
            channel: None,
        })
    }

    pub fn config(&self) -> &ReaderGroupConfig {
        &self.config
    }

    pub fn readers(&self) -> impl Iterator<Item = &DataSetReader> {
        self.readers.iter().map(|(_, r)| r)
    }

    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.state, FreezeState::Frozen { .. })
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    fn ensure_unfrozen(&self) -> Result<()> {
        if self.is_frozen() {
            return Err(Error::ConfigurationLocked);
        }
        Ok(())
    }

    /// Attach the transport channel this group receives from.
    pub fn set_channel(&mut self, channel: Box<dyn Channel>) -> Result<()> {
        self.ensure_unfrozen()?;
        self.channel = Some(channel);
        Ok(())
    }

    pub fn add_dataset_reader(&mut self, config: DataSetReaderConfig) -> Result<ReaderId> {
        self.ensure_unfrozen()?;
        if config.target_variables.len() != config.metadata.fields.len() {
            return Err(Error::ConfigurationError(format!(
                "reader '{}': {} target variables for {} metadata fields",
                config.name,
                config.target_variables.len(),
                config.metadata.fields.len()
            )));
        }
        let id = ReaderId(self.next_reader_id);
        self.next_reader_id += 1;
        log::debug!(
            "[GROUP] reader group '{}': add dataset reader {} ({})",
            self.config.name,
            config.dataset_writer_id,
            config.name
        );
        self.readers.push((id, DataSetReader::new(config)));
        Ok(id)
    }

    pub fn remove_dataset_reader(&mut self, id: ReaderId) -> Result<()> {
        self.ensure_unfrozen()?;
        let index = self
            .readers
            .iter()
            .position(|(rid, _)| *rid == id)
            .ok_or_else(|| {
                Error::ConfigurationError(format!(
                    "no such reader in group '{}'",
                    self.config.name
                ))
            })?;
        self.readers.remove(index);
        Ok(())
    }

    /// Lock the configuration. In fixed-size mode this validates the
    /// shape (exactly one reader, fixed-width field types only) and
    /// builds the receive template; on failure the configuration is left
    /// unchanged and the group stays Unfrozen. Calling on an already
    /// frozen group is a no-op success.
    pub fn freeze(&mut self) -> Result<()> {
        if self.is_frozen() {
            return Ok(());
        }
        let buffered = match self.config.rt_level {
            RtLevel::None => None,
            RtLevel::FixedSize => Some(self.build_receive_template()?),
        };
        self.state = FreezeState::Frozen { buffered };
        log::info!("[GROUP] reader group '{}' frozen", self.config.name);
        Ok(())
    }

    fn build_receive_template(&self) -> Result<BufferedReceiveMessage> {
        if self.readers.len() != 1 {
            return Err(Error::NotImplemented(
                "fixed-size mode supports exactly one dataset reader",
            ));
        }
        let cfg = self.readers[0].1.config();
        let mask = cfg.content_mask;
        let required = ContentMask::PUBLISHER_ID
            | ContentMask::GROUP_HEADER
            | ContentMask::WRITER_GROUP_ID
            | ContentMask::PAYLOAD_HEADER;
        if !mask.contains(required) {
            return Err(Error::ConfigurationError(format!(
                "reader '{}': fixed-size mode requires publisher id, writer group id \
                 and payload header in the content mask",
                cfg.name
            )));
        }

        let layout = compute_layout(mask, Some(cfg.publisher_id.id_type()), &[&cfg.metadata])?;

        let zeros: Vec<Variant> = cfg
            .metadata
            .fields
            .iter()
            .map(|f| Variant::zero(f.built_in_type))
            .collect();
        let template = NetworkMessage {
            publisher_id: Some(cfg.publisher_id),
            group_header: Some(GroupHeader {
                writer_group_id: Some(cfg.writer_group_id),
                group_version: Some(0),
                sequence_number: Some(0),
            }),
            dataset_writer_ids: Some(vec![cfg.dataset_writer_id]),
            messages: vec![crate::protocol::uadp::DataSetMessage::raw_frame(zeros)],
        };
        let mut buf = vec![0u8; layout.total_len];
        let written = template.encode(mask, &mut buf)?;
        if written != layout.total_len {
            return Err(Error::Encode(EncodeError::InvalidParameter(
                "encoded size disagrees with computed layout",
            )));
        }
        BufferedReceiveMessage::new(buf, layout)
    }

    /// Discard the frozen template and unlock the configuration.
    /// Calling on an already unfrozen group is a no-op success.
    pub fn unfreeze(&mut self) -> Result<()> {
        if self.is_frozen() {
            self.state = FreezeState::Unfrozen;
            log::info!("[GROUP] reader group '{}' unfrozen", self.config.name);
        }
        Ok(())
    }

    pub fn set_operational(&mut self) {
        self.operational = true;
        log::info!("[GROUP] reader group '{}' operational", self.config.name);
    }

    pub fn set_disabled(&mut self) {
        self.operational = false;
        log::info!("[GROUP] reader group '{}' disabled", self.config.name);
    }

    /// Process one received buffer: decode, match, write target
    /// variables. Unmatched traffic returns `Ok` without touching any
    /// target variable; malformed traffic returns a decode error the
    /// cycle logs and drops.
    pub fn process(&self, buf: &[u8], model: &mut dyn InformationModel) -> Result<()> {
        if !self.operational {
            log::debug!(
                "[GROUP] reader group '{}' disabled, message dropped",
                self.config.name
            );
            return Ok(());
        }
        match &self.state {
            FreezeState::Frozen {
                buffered: Some(buffered),
            } => self.process_fixed(buffered, buf, model),
            _ => self.process_dynamic(buf, model),
        }
    }

    /// Fixed-size fast path: verify the frozen header template, then
    /// read field bytes straight out of the incoming buffer.
    fn process_fixed(
        &self,
        buffered: &BufferedReceiveMessage,
        buf: &[u8],
        model: &mut dyn InformationModel,
    ) -> Result<()> {
        if !buffered.matches(buf) {
            log::debug!(
                "[GROUP] reader group '{}': unmatched message dropped ({} bytes)",
                self.config.name,
                buf.len()
            );
            return Ok(());
        }
        let reader = self
            .readers
            .first()
            .map(|(_, r)| r)
            .ok_or(Error::InvalidArgument("frozen group lost its reader"))?;
        for slot in 0..buffered.field_count() {
            let value = buffered.read_field(buf, slot)?;
            let field_index = buffered.layout().fields[slot].field_index;
            let target = reader
                .config()
                .target_variables
                .get(field_index)
                .ok_or(Error::InvalidArgument("layout references unknown target"))?;
            model.write_value(&target.node, DataValue::new(value))?;
        }
        log::debug!(
            "[GROUP] reader group '{}': fixed-size message processed seq={:?}",
            self.config.name,
            buffered.sequence_number(buf)
        );
        Ok(())
    }

    /// Dynamic path: full decode, triple match per DataSetMessage.
    fn process_dynamic(&self, buf: &[u8], model: &mut dyn InformationModel) -> Result<()> {
        let decoded = NetworkMessage::decode_with(buf, |writer_id| {
            self.readers
                .iter()
                .find(|(_, r)| Some(r.config().dataset_writer_id) == writer_id)
                .map(|(_, r)| &r.config().metadata)
        })?;
        let writer_ids = decoded.dataset_writer_ids.clone();
        for (i, message) in decoded.messages.iter().enumerate() {
            let writer_id = writer_ids.as_ref().and_then(|ids| ids.get(i).copied());
            match self
                .readers
                .iter()
                .find(|(_, r)| r.matches(&decoded, writer_id))
            {
                Some((_, reader)) => reader.process_message(message, model)?,
                None => {
                    log::debug!(
                        "[GROUP] reader group '{}': no reader matches publisher={:?} \
                         writer={:?}, message dropped",
                        self.config.name,
                        decoded.publisher_id,
                        writer_id
                    );
                }
            }
        }
        Ok(())
    }

    /// One processing cycle: drain the channel, process every delivered
    /// buffer. Decode failures are logged and the offending message
    /// dropped; they never abort the cycle. Returns the number of
    /// successfully processed buffers; a receive timeout yields `Ok(0)`.
    pub fn receive_cycle(
        &mut self,
        timeout: Duration,
        model: &mut dyn InformationModel,
    ) -> Result<usize> {
        let mut channel = self
            .channel
            .take()
            .ok_or(Error::InvalidArgument("reader group has no channel"))?;
        let mut processed = 0usize;
        let received = channel.receive(timeout, &mut |chunk| {
            match self.process(chunk, model) {
                Ok(()) => processed += 1,
                Err(e) => {
                    log::warn!(
                        "[GROUP] reader group '{}': message dropped: {}",
                        self.config.name,
                        e
                    );
                }
            }
        });
        self.channel = Some(channel);
        received?;
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuiltInType, DataSetMetaData, FieldMetaData, NodeIdentity};
    use crate::protocol::uadp::PublisherId;
    use crate::pubsub::reader::TargetVariable;

    fn reader_config(ty: BuiltInType) -> DataSetReaderConfig {
        DataSetReaderConfig {
            name: "DataSetReader Test".to_string(),
            publisher_id: PublisherId::UInt16(2234),
            writer_group_id: 100,
            dataset_writer_id: 62541,
            metadata: DataSetMetaData::new(
                "DataSet Test",
                vec![FieldMetaData::scalar("value", ty)],
            ),
            target_variables: vec![TargetVariable::new(NodeIdentity::numeric(1, 50002))],
            content_mask: ContentMask::PUBLISHER_ID
                | ContentMask::GROUP_HEADER
                | ContentMask::WRITER_GROUP_ID
                | ContentMask::PAYLOAD_HEADER,
        }
    }

    #[test]
    fn test_two_readers_fixed_size_freeze_not_implemented() {
        let mut group = ReaderGroup::new(ReaderGroupConfig::fixed_size("ReaderGroup Test"))
            .expect("group");
        group
            .add_dataset_reader(reader_config(BuiltInType::UInt32))
            .expect("first");
        let second = group
            .add_dataset_reader(reader_config(BuiltInType::UInt32))
            .expect("second");

        assert!(matches!(
            group.freeze(),
            Err(Error::NotImplemented(_))
        ));
        assert!(!group.is_frozen());

        group.remove_dataset_reader(second).expect("remove");
        group.freeze().expect("freeze with one reader");
    }

    #[test]
    fn test_datetime_field_freeze_not_supported() {
        let mut group = ReaderGroup::new(ReaderGroupConfig::fixed_size("ReaderGroup Test"))
            .expect("group");
        group
            .add_dataset_reader(reader_config(BuiltInType::DateTime))
            .expect("add");
        assert!(matches!(group.freeze(), Err(Error::NotSupported(_))));
        assert!(!group.is_frozen());
    }

    #[test]
    fn test_target_count_must_match_metadata() {
        let mut group =
            ReaderGroup::new(ReaderGroupConfig::new("ReaderGroup Test")).expect("group");
        let mut cfg = reader_config(BuiltInType::UInt32);
        cfg.target_variables.clear();
        assert!(matches!(
            group.add_dataset_reader(cfg),
            Err(Error::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_membership_locked_while_frozen() {
        let mut group =
            ReaderGroup::new(ReaderGroupConfig::new("ReaderGroup Test")).expect("group");
        let id = group
            .add_dataset_reader(reader_config(BuiltInType::UInt32))
            .expect("add");
        group.freeze().expect("freeze");
        assert!(matches!(
            group.add_dataset_reader(reader_config(BuiltInType::UInt32)),
            Err(Error::ConfigurationLocked)
        ));
        assert!(matches!(
            group.remove_dataset_reader(id),
            Err(Error::ConfigurationLocked)
        ));
        group.unfreeze().expect("unfreeze");
        group.remove_dataset_reader(id).expect("remove after unfreeze");
    }
}
