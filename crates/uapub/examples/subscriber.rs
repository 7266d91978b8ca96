// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-size RT subscriber matching the `publisher` example: expects
//! publisher 2234 / writer group 100 / dataset writer 62541 and writes
//! the decoded UInt32 into an in-memory target variable.

use std::time::Duration;
use uapub::{
    BuiltInType, ContentMask, DataSetMetaData, DataSetReaderConfig, DataValue, FieldMetaData,
    InformationModel, MemoryModel, NodeIdentity, PublisherId, ReaderGroup, ReaderGroupConfig,
    Result, TargetVariable, UdpChannel, UdpChannelConfig, Variant,
};

fn main() -> Result<()> {
    env_logger::init();

    let target = NodeIdentity::numeric(1, 50002);
    let mut model = MemoryModel::new();
    model.add_node(target.clone(), DataValue::new(Variant::UInt32(0)));

    let mut group = ReaderGroup::new(ReaderGroupConfig::fixed_size("Demo ReaderGroup"))?;
    group.add_dataset_reader(DataSetReaderConfig {
        name: "Demo DataSetReader".to_string(),
        publisher_id: PublisherId::UInt16(2234),
        writer_group_id: 100,
        dataset_writer_id: 62541,
        metadata: DataSetMetaData::new(
            "Demo PDS",
            vec![FieldMetaData::scalar("counter", BuiltInType::UInt32)],
        ),
        target_variables: vec![TargetVariable::new(target.clone())],
        content_mask: ContentMask::PUBLISHER_ID
            | ContentMask::GROUP_HEADER
            | ContentMask::WRITER_GROUP_ID
            | ContentMask::PAYLOAD_HEADER,
    })?;
    group.set_channel(Box::new(UdpChannel::open(UdpChannelConfig::default())?))?;

    group.freeze()?;
    group.set_operational();
    println!("listening on opc.udp://224.0.0.22:4840/ (ctrl-c to stop)");

    loop {
        let processed = group.receive_cycle(Duration::from_millis(500), &mut model)?;
        if processed > 0 {
            let value = model.read_value(&target)?;
            println!("counter = {:?}", value.value);
        }
    }
}
