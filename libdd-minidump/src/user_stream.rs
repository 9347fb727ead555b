// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::WriterError;
use crate::format::StreamType;
use crate::stream::StreamWriter;
use crate::writable::{Writable, WritableBase};
use std::io::Write;

/// A stream whose contents are opaque bytes supplied by the embedder.
#[derive(Debug)]
pub struct UserStreamWriter {
    base: WritableBase,
    stream_type: StreamType,
    data: Vec<u8>,
}

impl UserStreamWriter {
    pub fn new(stream_type: StreamType, data: Vec<u8>) -> Self {
        Self {
            base: WritableBase::new(),
            stream_type,
            data,
        }
    }

    pub fn set_data(&mut self, data: Vec<u8>) -> Result<(), WriterError> {
        self.base.ensure_editable("set_data")?;
        self.data = data;
        Ok(())
    }
}

impl Writable for UserStreamWriter {
    fn base(&self) -> &WritableBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WritableBase {
        &mut self.base
    }

    fn size_of_object(&self) -> Result<usize, WriterError> {
        Ok(self.data.len())
    }

    fn write_object(&self, sink: &mut dyn Write) -> Result<(), WriterError> {
        sink.write_all(&self.data)?;
        Ok(())
    }
}

impl StreamWriter for UserStreamWriter {
    fn stream_type(&self) -> StreamType {
        self.stream_type
    }
}
