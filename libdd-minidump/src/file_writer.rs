// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::WriterError;
use crate::format::{Directory, Header, StreamType};
use crate::stream::StreamWriter;
use crate::writable::{self, Child, LocationSlot, State, Writable, WritableBase};
use std::io::Write;
use std::rc::Rc;
use tracing::{debug, error};

/// The root of a minidump: the header, immediately followed by the stream directory. The
/// streams are written after the directory, in the order they were added.
pub struct MinidumpFileWriter<'a> {
    base: WritableBase,
    header: Header,
    streams: Vec<Child<'a, dyn StreamWriter + 'a>>,
    directory: Vec<(StreamType, LocationSlot)>,
}

impl Default for MinidumpFileWriter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> MinidumpFileWriter<'a> {
    pub fn new() -> Self {
        Self {
            base: WritableBase::new(),
            header: Header::default(),
            streams: Vec::new(),
            directory: Vec::new(),
        }
    }

    /// Seconds since the epoch at which the dump was taken.
    pub fn set_timestamp(&mut self, time_date_stamp: u32) -> Result<(), WriterError> {
        self.base.ensure_editable("set_timestamp")?;
        self.header.time_date_stamp = time_date_stamp;
        Ok(())
    }

    /// Adds a stream. Each stream type may appear once.
    pub fn add_stream(&mut self, stream: Box<dyn StreamWriter + 'a>) -> Result<(), WriterError> {
        self.push_stream(Child::Owned(stream))
    }

    /// Like [`Self::add_stream`], but the caller keeps ownership of the stream.
    pub fn add_stream_ref(
        &mut self,
        stream: &'a mut (dyn StreamWriter + 'a),
    ) -> Result<(), WriterError> {
        self.push_stream(Child::Borrowed(stream))
    }

    fn push_stream(&mut self, stream: Child<'a, dyn StreamWriter + 'a>) -> Result<(), WriterError> {
        self.base.ensure_editable("add_stream")?;
        let stream_type = stream.get().stream_type();
        if self.directory.iter().any(|(t, _)| *t == stream_type) {
            error!(?stream_type, "Duplicate stream");
            return Err(WriterError::DuplicateStream(stream_type.0));
        }
        debug!(?stream_type, "Adding stream");
        self.streams.push(stream);
        self.directory.push((stream_type, LocationSlot::default()));
        Ok(())
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Freezes, lays out and writes the whole minidump to `sink`, which must be positioned at
    /// the start of the file.
    pub fn write_everything(&mut self, sink: &mut dyn Write) -> Result<(), WriterError> {
        writable::write_everything(self, sink)
    }
}

impl Writable for MinidumpFileWriter<'_> {
    fn base(&self) -> &WritableBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WritableBase {
        &mut self.base
    }

    fn freeze_impl(&mut self) -> Result<(), WriterError> {
        let count = self.streams.len();
        self.header.stream_count =
            u32::try_from(count).map_err(|_| WriterError::SizeOverflow { size: count })?;
        self.header.stream_directory_rva = Header::SIZE as u32;
        for (stream, (_, slot)) in self.streams.iter_mut().zip(&self.directory) {
            stream
                .get_mut()
                .base_mut()
                .register_location_descriptor(Rc::clone(slot))?;
        }
        Ok(())
    }

    fn size_of_object(&self) -> Result<usize, WriterError> {
        Ok(Header::SIZE + self.directory.len() * Directory::SIZE)
    }

    fn children(&mut self) -> Result<Vec<&mut dyn Writable>, WriterError> {
        self.base.ensure_at_least("children", State::Frozen)?;
        Ok(self
            .streams
            .iter_mut()
            .map(|stream| stream.get_mut().as_writable_mut())
            .collect())
    }

    fn write_object(&self, sink: &mut dyn Write) -> Result<(), WriterError> {
        self.header.write_to(sink)?;
        for (stream_type, slot) in &self.directory {
            Directory {
                stream_type: *stream_type,
                location: slot.get(),
            }
            .write_to(sink)?;
        }
        Ok(())
    }
}
