// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The node tree every minidump record is part of.
//!
//! A node goes through [`State::Editable`], [`State::Frozen`], [`State::Sized`] and
//! [`State::Written`], in that order and exactly once each:
//!
//! * while editable it may be configured;
//! * [`freeze`] locks the whole subtree and lets each node register the forward references
//!   ([`LocationSlot`], [`RvaSlot`]) it embeds into the nodes they point at;
//! * [`will_write_at_offset`] lays the tree out in pre-order, filling in every registered
//!   slot;
//! * [`write`] emits each node's own record followed by its children, in the same order.
//!
//! A node never writes its children inline. Children are separate records placed after their
//! parent, which only refers to them through slots.

use crate::errors::WriterError;
use crate::format::{LocationDescriptor, Rva};
use std::cell::Cell;
use std::io::{self, Read, Write};
use std::rc::Rc;
use tracing::{debug, error};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    #[default]
    Editable,
    Frozen,
    Sized,
    Written,
}

/// A location descriptor embedded in one record that describes another record.
pub type LocationSlot = Rc<Cell<LocationDescriptor>>;
/// An RVA embedded in one record that points at another record.
pub type RvaSlot = Rc<Cell<Rva>>;

/// State shared by every node.
#[derive(Debug, Default)]
pub struct WritableBase {
    state: State,
    leading_padding: usize,
    registered_locations: Vec<LocationSlot>,
    registered_rvas: Vec<RvaSlot>,
}

impl WritableBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Zero bytes written ahead of the record to honor its alignment. Known once sized.
    pub fn leading_padding(&self) -> usize {
        self.leading_padding
    }

    pub fn ensure_state(&self, operation: &'static str, expected: State) -> Result<(), WriterError> {
        if self.state != expected {
            error!(operation, ?expected, actual = ?self.state, "Node is in the wrong state");
            return Err(WriterError::InvalidState {
                operation,
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    pub fn ensure_at_least(
        &self,
        operation: &'static str,
        minimum: State,
    ) -> Result<(), WriterError> {
        if self.state < minimum {
            error!(operation, ?minimum, actual = ?self.state, "Node has not progressed far enough");
            return Err(WriterError::InvalidState {
                operation,
                expected: minimum,
                actual: self.state,
            });
        }
        Ok(())
    }

    pub fn ensure_editable(&self, operation: &'static str) -> Result<(), WriterError> {
        self.ensure_state(operation, State::Editable)
    }

    /// Asks for `slot` to receive this node's size and offset once it is laid out.
    ///
    /// Slots can only be registered before layout starts.
    pub fn register_location_descriptor(&mut self, slot: LocationSlot) -> Result<(), WriterError> {
        self.ensure_not_sized("register_location_descriptor")?;
        self.registered_locations.push(slot);
        Ok(())
    }

    /// Asks for `slot` to receive this node's offset once it is laid out.
    pub fn register_rva(&mut self, slot: RvaSlot) -> Result<(), WriterError> {
        self.ensure_not_sized("register_rva")?;
        self.registered_rvas.push(slot);
        Ok(())
    }

    fn ensure_not_sized(&self, operation: &'static str) -> Result<(), WriterError> {
        if self.state > State::Frozen {
            return self.ensure_state(operation, State::Frozen);
        }
        Ok(())
    }
}

/// A traversal child, either owned by its parent or borrowed from whoever owns it.
///
/// Both are visited the same way; only who drops the node differs.
#[derive(Debug)]
pub enum Child<'a, T: ?Sized> {
    Owned(Box<T>),
    Borrowed(&'a mut T),
}

impl<T: ?Sized> Child<'_, T> {
    pub fn get(&self) -> &T {
        match self {
            Child::Owned(node) => node,
            Child::Borrowed(node) => node,
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        match self {
            Child::Owned(node) => node,
            Child::Borrowed(node) => node,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Child::Owned(_))
    }
}

/// A record of the minidump.
///
/// Implementors provide the record-specific hooks; the state checks and traversal live in
/// [`freeze`], [`will_write_at_offset`] and [`write`].
pub trait Writable {
    fn base(&self) -> &WritableBase;
    fn base_mut(&mut self) -> &mut WritableBase;

    /// Runs once when the node is frozen, before its children are. Registers the node's
    /// forward references into its children.
    fn freeze_impl(&mut self) -> Result<(), WriterError> {
        Ok(())
    }

    /// Size of the node's own record, excluding padding and children. Only called through
    /// [`Writable::object_size`].
    fn size_of_object(&self) -> Result<usize, WriterError>;

    /// [`Writable::size_of_object`], once the node is frozen.
    fn object_size(&self) -> Result<usize, WriterError> {
        self.base().ensure_at_least("object_size", State::Frozen)?;
        self.size_of_object()
    }

    /// The nodes to visit after this one, in output order.
    fn children(&mut self) -> Result<Vec<&mut dyn Writable>, WriterError> {
        self.base().ensure_at_least("children", State::Frozen)?;
        Ok(Vec::new())
    }

    fn alignment(&self) -> usize {
        4
    }

    /// Called with the node's final offset, after its registered slots were filled.
    fn will_write_at_offset_impl(&mut self, _offset: u64) -> Result<(), WriterError> {
        Ok(())
    }

    /// Writes exactly [`Writable::size_of_object`] bytes.
    fn write_object(&self, sink: &mut dyn Write) -> Result<(), WriterError>;
}

/// Freezes `node` and everything under it.
pub fn freeze(node: &mut dyn Writable) -> Result<(), WriterError> {
    node.base().ensure_editable("freeze")?;
    node.base_mut().state = State::Frozen;
    node.freeze_impl()?;
    for child in node.children()? {
        freeze(child)?;
    }
    Ok(())
}

/// Lays `node` and its subtree out starting at `*offset`, leaving `*offset` just past the
/// last byte.
pub fn will_write_at_offset(node: &mut dyn Writable, offset: &mut u64) -> Result<(), WriterError> {
    node.base().ensure_state("will_write_at_offset", State::Frozen)?;

    let alignment = node.alignment().max(1) as u64;
    let padding = (alignment - *offset % alignment) % alignment;
    let local_offset = *offset + padding;
    let size = node.object_size()?;

    let rva = Rva::try_from(local_offset).map_err(|_| {
        error!(offset = local_offset, "Node lies beyond 32-bit range");
        WriterError::OffsetOverflow {
            offset: local_offset,
        }
    })?;
    let data_size = u32::try_from(size).map_err(|_| {
        error!(size, "Node is too large to describe");
        WriterError::SizeOverflow { size }
    })?;
    let end = local_offset + size as u64;

    let base = node.base_mut();
    base.leading_padding = padding as usize;
    let location = LocationDescriptor { data_size, rva };
    for slot in base.registered_locations.drain(..) {
        slot.set(location);
    }
    for slot in base.registered_rvas.drain(..) {
        slot.set(rva);
    }
    base.state = State::Sized;

    node.will_write_at_offset_impl(local_offset)?;
    *offset = end;
    for child in node.children()? {
        will_write_at_offset(child, offset)?;
    }
    Ok(())
}

/// Writes `node` followed by its subtree. The tree must already be laid out.
pub fn write(node: &mut dyn Writable, sink: &mut dyn Write) -> Result<(), WriterError> {
    node.base().ensure_state("write", State::Sized)?;

    let padding = node.base().leading_padding;
    if padding > 0 {
        io::copy(&mut io::repeat(0).take(padding as u64), &mut *sink)?;
    }

    let expected = node.object_size()?;
    let mut counter = CountingWriter {
        inner: &mut *sink,
        written: 0,
    };
    node.write_object(&mut counter)?;
    if counter.written != expected {
        error!(expected, actual = counter.written, "Node wrote an unexpected amount");
        return Err(WriterError::SizeMismatch {
            expected,
            actual: counter.written,
        });
    }
    node.base_mut().state = State::Written;

    for child in node.children()? {
        write(child, sink)?;
    }
    Ok(())
}

/// Freezes, lays out and writes the tree under `root`, placing `root` at offset 0 of `sink`.
///
/// A failure at any point leaves `sink` holding a partial, unusable dump.
pub fn write_everything(root: &mut dyn Writable, sink: &mut dyn Write) -> Result<(), WriterError> {
    freeze(root)?;
    let mut end = 0;
    will_write_at_offset(root, &mut end)?;
    debug!(size = end, "Laid out minidump");
    write(root, sink).inspect_err(|e| error!(error = %e, "Aborted minidump write"))
}

struct CountingWriter<'w> {
    inner: &'w mut dyn Write,
    written: usize,
}

impl Write for CountingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
