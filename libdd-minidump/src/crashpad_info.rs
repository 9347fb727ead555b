// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::WriterError;
use crate::format::{CrashpadInfo, LocationDescriptor, StreamType};
use crate::module_crashpad_info::ModuleCrashpadInfoListWriter;
use crate::stream::StreamWriter;
use crate::writable::{Child, LocationSlot, State, Writable, WritableBase};
use std::io::Write;
use std::rc::Rc;

/// The crashpad info stream.
///
/// Its fixed-size record refers to the module list, which is written as a separate record
/// after it. The list may be owned by this writer or borrowed from the caller; either way it
/// is frozen, laid out and written as part of this stream.
pub struct CrashpadInfoWriter<'a> {
    base: WritableBase,
    version: u32,
    module_list_location: LocationSlot,
    module_list: Option<Child<'a, ModuleCrashpadInfoListWriter>>,
}

impl Default for CrashpadInfoWriter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> CrashpadInfoWriter<'a> {
    pub fn new() -> Self {
        Self {
            base: WritableBase::new(),
            version: CrashpadInfo::VERSION,
            module_list_location: LocationSlot::default(),
            module_list: None,
        }
    }

    pub fn set_module_list(
        &mut self,
        module_list: ModuleCrashpadInfoListWriter,
    ) -> Result<(), WriterError> {
        self.base.ensure_editable("set_module_list")?;
        self.module_list = Some(Child::Owned(Box::new(module_list)));
        Ok(())
    }

    /// Like [`Self::set_module_list`], but the caller keeps ownership of the list.
    pub fn set_module_list_ref(
        &mut self,
        module_list: &'a mut ModuleCrashpadInfoListWriter,
    ) -> Result<(), WriterError> {
        self.base.ensure_editable("set_module_list_ref")?;
        self.module_list = Some(Child::Borrowed(module_list));
        Ok(())
    }

    pub fn module_list(&self) -> Option<&ModuleCrashpadInfoListWriter> {
        self.module_list.as_ref().map(Child::get)
    }

    /// Where the module list ended up. Empty until the tree is laid out, or without a list.
    pub fn module_list_location(&self) -> LocationDescriptor {
        self.module_list_location.get()
    }

    /// Whether the stream carries anything worth writing.
    pub fn is_useful(&self) -> bool {
        self.module_list().is_some_and(|list| !list.is_empty())
    }
}

impl Writable for CrashpadInfoWriter<'_> {
    fn base(&self) -> &WritableBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WritableBase {
        &mut self.base
    }

    fn freeze_impl(&mut self) -> Result<(), WriterError> {
        if let Some(module_list) = &mut self.module_list {
            module_list
                .get_mut()
                .base_mut()
                .register_location_descriptor(Rc::clone(&self.module_list_location))?;
        }
        Ok(())
    }

    fn size_of_object(&self) -> Result<usize, WriterError> {
        Ok(CrashpadInfo::SIZE)
    }

    fn children(&mut self) -> Result<Vec<&mut dyn Writable>, WriterError> {
        self.base.ensure_at_least("children", State::Frozen)?;
        Ok(self
            .module_list
            .iter_mut()
            .map(|list| list.get_mut() as &mut dyn Writable)
            .collect())
    }

    fn write_object(&self, sink: &mut dyn Write) -> Result<(), WriterError> {
        CrashpadInfo {
            version: self.version,
            module_list: self.module_list_location.get(),
        }
        .write_to(sink)?;
        Ok(())
    }
}

impl StreamWriter for CrashpadInfoWriter<'_> {
    fn stream_type(&self) -> StreamType {
        StreamType::CRASHPAD_INFO
    }
}
