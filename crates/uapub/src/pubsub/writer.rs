// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DataSetWriter: binds one PublishedDataSet to a writer id.

use super::dataset::PublishedDataSet;
use super::Result;
use crate::model::InformationModel;
use crate::protocol::uadp::DataSetMessage;

/// Configuration of one DataSetWriter.
#[derive(Debug, Clone)]
pub struct DataSetWriterConfig {
    pub name: String,
    /// Wire identity carried in the payload header.
    pub dataset_writer_id: u16,
}

impl DataSetWriterConfig {
    pub fn new(name: &str, dataset_writer_id: u16) -> Self {
        DataSetWriterConfig {
            name: name.to_string(),
            dataset_writer_id,
        }
    }
}

/// A DataSetWriter and the dataset it publishes.
#[derive(Debug)]
pub struct DataSetWriter {
    config: DataSetWriterConfig,
    dataset: PublishedDataSet,
}

impl DataSetWriter {
    pub(crate) fn new(config: DataSetWriterConfig, dataset: PublishedDataSet) -> Self {
        DataSetWriter { config, dataset }
    }

    pub fn config(&self) -> &DataSetWriterConfig {
        &self.config
    }

    pub fn dataset(&self) -> &PublishedDataSet {
        &self.dataset
    }

    pub(crate) fn dataset_mut(&mut self) -> &mut PublishedDataSet {
        &mut self.dataset
    }

    /// Sample all fields into a Variant-encoded key frame.
    pub(crate) fn sample_key_frame(
        &mut self,
        model: Option<&dyn InformationModel>,
    ) -> Result<DataSetMessage> {
        Ok(DataSetMessage::key_frame(self.dataset.sample_all(model)?))
    }

    /// Sample all fields into a raw fixed-width frame (RT freeze path).
    pub(crate) fn sample_raw_frame(
        &mut self,
        model: Option<&dyn InformationModel>,
    ) -> Result<DataSetMessage> {
        Ok(DataSetMessage::raw_frame(self.dataset.sample_all(model)?))
    }
}
