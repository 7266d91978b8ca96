// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-size RT publisher: one UInt32 counter field on writer group 100,
//! dataset writer 62541, published over UDP multicast every 100 ms.
//!
//! Run together with the `subscriber` example on the same host.

use parking_lot::RwLock;
use std::sync::Arc;
use uapub::{
    BuiltInType, DataSetField, DataSetWriterConfig, DataValue, FieldSource, PublishedDataSet,
    PublisherId, Result, RtLevel, UdpChannel, UdpChannelConfig, Variant, WriterGroup,
    WriterGroupConfig,
};

fn main() -> Result<()> {
    env_logger::init();

    let counter = Arc::new(RwLock::new(DataValue::new(Variant::UInt32(0))));

    let mut config = WriterGroupConfig::new("Demo WriterGroup", 100, PublisherId::UInt16(2234));
    config.rt_level = RtLevel::FixedSize;
    let mut group = WriterGroup::new(config)?;

    let dataset = PublishedDataSet::new("Demo PDS").with_field(DataSetField::new(
        "counter",
        BuiltInType::UInt32,
        FieldSource::Static(Arc::clone(&counter)),
    ));
    group.add_dataset_writer(DataSetWriterConfig::new("Demo DataSetWriter", 62541), dataset)?;
    group.set_channel(Box::new(UdpChannel::open(UdpChannelConfig::default())?))?;

    group.freeze()?;
    group.set_operational();
    println!("publishing on opc.udp://224.0.0.22:4840/ (ctrl-c to stop)");

    let interval = group.config().publishing_interval;
    loop {
        group.publish_cycle(None)?;
        let mut value = counter.write();
        if let Variant::UInt32(n) = value.value {
            value.value = Variant::UInt32(n.wrapping_add(1));
        }
        drop(value);
        std::thread::sleep(interval);
    }
}
