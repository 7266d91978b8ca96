// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Published datasets and field value sources.

use super::{Error, Result};
use crate::model::{
    BuiltInType, DataSetMetaData, DataValue, FieldMetaData, InformationModel, NodeIdentity,
    Variant,
};
use parking_lot::RwLock;
use std::sync::Arc;

/// Where a published field's current value comes from.
///
/// `Static` and `Callback` resolve without touching the information
/// model and are therefore usable in fixed-size RT mode; `Model` sources
/// go through the address-space read contract and are dynamic-only.
pub enum FieldSource {
    /// Application-owned shared cell, read at sampling time.
    Static(Arc<RwLock<DataValue>>),
    /// External callback producing the current value.
    Callback(Box<dyn FnMut() -> DataValue + Send>),
    /// Address-space attribute, read through the information model.
    Model(NodeIdentity),
}

impl FieldSource {
    /// Whether this source can feed the fixed-size RT publish path.
    pub fn is_rt_capable(&self) -> bool {
        !matches!(self, FieldSource::Model(_))
    }
}

impl std::fmt::Debug for FieldSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldSource::Static(_) => f.write_str("FieldSource::Static"),
            FieldSource::Callback(_) => f.write_str("FieldSource::Callback"),
            FieldSource::Model(node) => write!(f, "FieldSource::Model({})", node),
        }
    }
}

/// One named, typed field of a published dataset.
#[derive(Debug)]
pub struct DataSetField {
    pub name: String,
    pub built_in_type: BuiltInType,
    pub source: FieldSource,
}

impl DataSetField {
    pub fn new(name: &str, built_in_type: BuiltInType, source: FieldSource) -> Self {
        DataSetField {
            name: name.to_string(),
            built_in_type,
            source,
        }
    }

    /// Read the field's current value from its source.
    pub(crate) fn sample(
        &mut self,
        model: Option<&dyn InformationModel>,
    ) -> Result<Variant> {
        let value = match &mut self.source {
            FieldSource::Static(cell) => cell.read().value.clone(),
            FieldSource::Callback(callback) => callback().value,
            FieldSource::Model(node) => {
                let model =
                    model.ok_or(Error::InvalidArgument("field needs an information model"))?;
                model.read_value(node)?.value
            }
        };
        if value.type_id() != self.built_in_type {
            return Err(Error::ConfigurationError(format!(
                "field '{}' sampled {} but is declared {}",
                self.name,
                value.type_id(),
                self.built_in_type
            )));
        }
        Ok(value)
    }
}

/// Named, ordered sequence of field descriptors, owned by its
/// DataSetWriter. Immutable once the owning writer's group is frozen.
#[derive(Debug)]
pub struct PublishedDataSet {
    pub name: String,
    fields: Vec<DataSetField>,
}

impl PublishedDataSet {
    pub fn new(name: &str) -> Self {
        PublishedDataSet {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn add_field(&mut self, field: DataSetField) {
        self.fields.push(field);
    }

    pub fn with_field(mut self, field: DataSetField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[DataSetField] {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [DataSetField] {
        &mut self.fields
    }

    /// Metadata describing this dataset to subscribers.
    pub fn metadata(&self) -> DataSetMetaData {
        DataSetMetaData::new(
            &self.name,
            self.fields
                .iter()
                .map(|f| FieldMetaData::scalar(&f.name, f.built_in_type))
                .collect(),
        )
    }

    /// Sample all fields in order.
    pub(crate) fn sample_all(
        &mut self,
        model: Option<&dyn InformationModel>,
    ) -> Result<Vec<Variant>> {
        self.fields.iter_mut().map(|f| f.sample(model)).collect()
    }
}
