// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::WriterError;
use crate::format::{
    ModuleCrashpadInfo, ModuleCrashpadInfoLink, MODULE_CRASHPAD_INFO_LIST_HEADER_SIZE,
};
use crate::writable::{LocationSlot, State, Writable, WritableBase};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use std::rc::Rc;

/// Crashpad's per-module record.
#[derive(Debug)]
pub struct ModuleCrashpadInfoWriter {
    base: WritableBase,
    module: ModuleCrashpadInfo,
}

impl ModuleCrashpadInfoWriter {
    pub fn new() -> Self {
        Self {
            base: WritableBase::new(),
            module: ModuleCrashpadInfo {
                version: ModuleCrashpadInfo::VERSION,
                ..Default::default()
            },
        }
    }
}

impl Default for ModuleCrashpadInfoWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Writable for ModuleCrashpadInfoWriter {
    fn base(&self) -> &WritableBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WritableBase {
        &mut self.base
    }

    fn size_of_object(&self) -> Result<usize, WriterError> {
        Ok(ModuleCrashpadInfo::SIZE)
    }

    fn write_object(&self, sink: &mut dyn Write) -> Result<(), WriterError> {
        self.module.write_to(sink)?;
        Ok(())
    }
}

/// A count followed by one link per module; the modules follow the list.
#[derive(Debug, Default)]
pub struct ModuleCrashpadInfoListWriter {
    base: WritableBase,
    modules: Vec<ModuleCrashpadInfoWriter>,
    links: Vec<(u32, LocationSlot)>,
}

impl ModuleCrashpadInfoListWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `module`, describing the entry at `minidump_module_list_index` of the module list
    /// stream.
    pub fn add_module(
        &mut self,
        module: ModuleCrashpadInfoWriter,
        minidump_module_list_index: u32,
    ) -> Result<(), WriterError> {
        self.base.ensure_editable("add_module")?;
        self.modules.push(module);
        self.links
            .push((minidump_module_list_index, LocationSlot::default()));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Writable for ModuleCrashpadInfoListWriter {
    fn base(&self) -> &WritableBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WritableBase {
        &mut self.base
    }

    fn freeze_impl(&mut self) -> Result<(), WriterError> {
        u32::try_from(self.modules.len()).map_err(|_| WriterError::SizeOverflow {
            size: self.modules.len(),
        })?;
        for (module, (_, slot)) in self.modules.iter_mut().zip(&self.links) {
            module
                .base_mut()
                .register_location_descriptor(Rc::clone(slot))?;
        }
        Ok(())
    }

    fn size_of_object(&self) -> Result<usize, WriterError> {
        Ok(MODULE_CRASHPAD_INFO_LIST_HEADER_SIZE + self.links.len() * ModuleCrashpadInfoLink::SIZE)
    }

    fn children(&mut self) -> Result<Vec<&mut dyn Writable>, WriterError> {
        self.base.ensure_at_least("children", State::Frozen)?;
        Ok(self
            .modules
            .iter_mut()
            .map(|m| m as &mut dyn Writable)
            .collect())
    }

    fn write_object(&self, sink: &mut dyn Write) -> Result<(), WriterError> {
        // Count validated by freeze.
        sink.write_u32::<LittleEndian>(self.links.len() as u32)?;
        for (index, slot) in &self.links {
            ModuleCrashpadInfoLink {
                minidump_module_list_index: *index,
                location: slot.get(),
            }
            .write_to(sink)?;
        }
        Ok(())
    }
}
