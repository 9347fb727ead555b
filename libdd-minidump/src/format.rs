// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! On-disk minidump records.
//!
//! Every record is little-endian and packed. `write_to` emits exactly `SIZE` bytes;
//! `read_from` is the matching reader, used to inspect produced files.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{self, Read, Write};

/// A byte offset from the start of the minidump.
pub type Rva = u32;

/// "MDMP" read as a little-endian integer.
pub const MINIDUMP_SIGNATURE: u32 = 0x504d_444d;
pub const MINIDUMP_VERSION: u32 = 42899;

/// The byte range of a record within the minidump.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LocationDescriptor {
    pub data_size: u32,
    pub rva: Rva,
}

impl LocationDescriptor {
    pub const SIZE: usize = 8;

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.data_size)?;
        w.write_u32::<LittleEndian>(self.rva)
    }

    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            data_size: r.read_u32::<LittleEndian>()?,
            rva: r.read_u32::<LittleEndian>()?,
        })
    }
}

/// The type tag of a top-level stream.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamType(pub u32);

impl StreamType {
    pub const UNUSED: Self = Self(0);
    pub const THREAD_LIST: Self = Self(3);
    pub const MODULE_LIST: Self = Self(4);
    pub const MEMORY_LIST: Self = Self(5);
    pub const EXCEPTION: Self = Self(6);
    pub const SYSTEM_INFO: Self = Self(7);
    pub const MISC_INFO: Self = Self(15);
    pub const CRASHPAD_INFO: Self = Self(0x4350_0001);

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::UNUSED => "Unused",
            Self::THREAD_LIST => "ThreadList",
            Self::MODULE_LIST => "ModuleList",
            Self::MEMORY_LIST => "MemoryList",
            Self::EXCEPTION => "Exception",
            Self::SYSTEM_INFO => "SystemInfo",
            Self::MISC_INFO => "MiscInfo",
            Self::CRASHPAD_INFO => "CrashpadInfo",
            _ => return None,
        })
    }
}

impl fmt::Debug for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({:#x})", self.0),
            None => write!(f, "StreamType({:#x})", self.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub signature: u32,
    pub version: u32,
    pub stream_count: u32,
    pub stream_directory_rva: Rva,
    pub checksum: u32,
    pub time_date_stamp: u32,
    pub flags: u64,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            signature: MINIDUMP_SIGNATURE,
            version: MINIDUMP_VERSION,
            stream_count: 0,
            stream_directory_rva: 0,
            checksum: 0,
            time_date_stamp: 0,
            flags: 0,
        }
    }
}

impl Header {
    pub const SIZE: usize = 32;

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.signature)?;
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_u32::<LittleEndian>(self.stream_count)?;
        w.write_u32::<LittleEndian>(self.stream_directory_rva)?;
        w.write_u32::<LittleEndian>(self.checksum)?;
        w.write_u32::<LittleEndian>(self.time_date_stamp)?;
        w.write_u64::<LittleEndian>(self.flags)
    }

    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            signature: r.read_u32::<LittleEndian>()?,
            version: r.read_u32::<LittleEndian>()?,
            stream_count: r.read_u32::<LittleEndian>()?,
            stream_directory_rva: r.read_u32::<LittleEndian>()?,
            checksum: r.read_u32::<LittleEndian>()?,
            time_date_stamp: r.read_u32::<LittleEndian>()?,
            flags: r.read_u64::<LittleEndian>()?,
        })
    }
}

/// One entry of the stream directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directory {
    pub stream_type: StreamType,
    pub location: LocationDescriptor,
}

impl Directory {
    pub const SIZE: usize = 12;

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.stream_type.0)?;
        self.location.write_to(w)
    }

    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            stream_type: StreamType(r.read_u32::<LittleEndian>()?),
            location: LocationDescriptor::read_from(r)?,
        })
    }
}

/// Body of the crashpad info stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CrashpadInfo {
    pub version: u32,
    /// Points at a [`ModuleCrashpadInfoLink`] list, or is empty.
    pub module_list: LocationDescriptor,
}

impl CrashpadInfo {
    pub const SIZE: usize = 12;
    pub const VERSION: u32 = 1;

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.version)?;
        self.module_list.write_to(w)
    }

    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            version: r.read_u32::<LittleEndian>()?,
            module_list: LocationDescriptor::read_from(r)?,
        })
    }
}

/// Size of the count that starts a `ModuleCrashpadInfoList`, before its links.
pub const MODULE_CRASHPAD_INFO_LIST_HEADER_SIZE: usize = 4;

/// Associates a [`ModuleCrashpadInfo`] with an entry of the module list stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ModuleCrashpadInfoLink {
    pub minidump_module_list_index: u32,
    pub location: LocationDescriptor,
}

impl ModuleCrashpadInfoLink {
    pub const SIZE: usize = 12;

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.minidump_module_list_index)?;
        self.location.write_to(w)
    }

    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            minidump_module_list_index: r.read_u32::<LittleEndian>()?,
            location: LocationDescriptor::read_from(r)?,
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ModuleCrashpadInfo {
    pub version: u32,
    pub list_annotations: LocationDescriptor,
    pub simple_annotations: LocationDescriptor,
    pub annotation_objects: LocationDescriptor,
}

impl ModuleCrashpadInfo {
    pub const SIZE: usize = 28;
    pub const VERSION: u32 = 1;

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.version)?;
        self.list_annotations.write_to(w)?;
        self.simple_annotations.write_to(w)?;
        self.annotation_objects.write_to(w)
    }

    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            version: r.read_u32::<LittleEndian>()?,
            list_annotations: LocationDescriptor::read_from(r)?,
            simple_annotations: LocationDescriptor::read_from(r)?,
            annotation_objects: LocationDescriptor::read_from(r)?,
        })
    }
}
