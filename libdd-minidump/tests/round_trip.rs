// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use byteorder::{LittleEndian, ReadBytesExt};
use libdd_minidump::format::{
    CrashpadInfo, Directory, Header, ModuleCrashpadInfo, ModuleCrashpadInfoLink,
    MINIDUMP_SIGNATURE, MINIDUMP_VERSION,
};
use libdd_minidump::{
    CrashpadInfoWriter, LocationDescriptor, MinidumpFileWriter, ModuleCrashpadInfoListWriter,
    ModuleCrashpadInfoWriter, StreamType, UserStreamWriter,
};
use std::io::{Read, Seek, SeekFrom};

fn find_stream(file: &mut std::fs::File, stream_type: StreamType) -> LocationDescriptor {
    file.seek(SeekFrom::Start(0)).unwrap();
    let header = Header::read_from(file).unwrap();
    assert_eq!(header.signature, MINIDUMP_SIGNATURE);
    assert_eq!(header.version, MINIDUMP_VERSION);

    file.seek(SeekFrom::Start(header.stream_directory_rva.into()))
        .unwrap();
    for _ in 0..header.stream_count {
        let entry = Directory::read_from(file).unwrap();
        if entry.stream_type == stream_type {
            return entry.location;
        }
    }
    panic!("stream {stream_type:?} not found");
}

fn write_crashpad_info(modules: u32) -> std::fs::File {
    let mut list = ModuleCrashpadInfoListWriter::new();
    for index in 0..modules {
        list.add_module(ModuleCrashpadInfoWriter::new(), index * 2)
            .unwrap();
    }
    let mut info = CrashpadInfoWriter::new();
    info.set_module_list(list).unwrap();

    let mut minidump = MinidumpFileWriter::new();
    minidump.set_timestamp(1_700_000_000).unwrap();
    minidump
        .add_stream(Box::new(UserStreamWriter::new(
            StreamType(0x4d44_0001),
            b"before".to_vec(),
        )))
        .unwrap();
    minidump.add_stream(Box::new(info)).unwrap();

    let mut file = tempfile::tempfile().unwrap();
    minidump.write_everything(&mut file).unwrap();
    file
}

#[test]
fn crashpad_info_round_trips() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    for modules in [0, 1, 5] {
        let mut file = write_crashpad_info(modules);
        let location = find_stream(&mut file, StreamType::CRASHPAD_INFO);
        assert_eq!(location.data_size as usize, CrashpadInfo::SIZE);
        assert_eq!(location.rva % 4, 0);

        file.seek(SeekFrom::Start(location.rva.into())).unwrap();
        let info = CrashpadInfo::read_from(&mut file).unwrap();
        assert_eq!(info.version, CrashpadInfo::VERSION);

        let list = info.module_list;
        assert_eq!(
            list.data_size as usize,
            4 + modules as usize * ModuleCrashpadInfoLink::SIZE
        );
        file.seek(SeekFrom::Start(list.rva.into())).unwrap();
        assert_eq!(file.read_u32::<LittleEndian>().unwrap(), modules);

        let links: Vec<_> = (0..modules)
            .map(|_| ModuleCrashpadInfoLink::read_from(&mut file).unwrap())
            .collect();
        for (i, link) in links.iter().enumerate() {
            assert_eq!(link.minidump_module_list_index, i as u32 * 2);
            assert_eq!(link.location.data_size as usize, ModuleCrashpadInfo::SIZE);
            file.seek(SeekFrom::Start(link.location.rva.into())).unwrap();
            let module = ModuleCrashpadInfo::read_from(&mut file).unwrap();
            assert_eq!(module.version, ModuleCrashpadInfo::VERSION);
        }
    }
}

#[test]
fn user_stream_bytes_are_preserved() {
    let mut file = write_crashpad_info(1);
    let location = find_stream(&mut file, StreamType(0x4d44_0001));
    file.seek(SeekFrom::Start(location.rva.into())).unwrap();
    let mut data = vec![0; location.data_size as usize];
    file.read_exact(&mut data).unwrap();
    assert_eq!(data, b"before");
}

#[test]
fn file_length_matches_layout() {
    let mut file = write_crashpad_info(3);
    let mut bytes = Vec::new();
    file.seek(SeekFrom::Start(0)).unwrap();
    file.read_to_end(&mut bytes).unwrap();
    // header, 2 directory entries, "before" padded to 8, info, list with 3 links, 3 modules
    assert_eq!(bytes.len(), 32 + 24 + 8 + 12 + (4 + 36) + 3 * 28);
}
