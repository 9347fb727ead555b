// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::format::StreamType;
use crate::writable::Writable;

/// Views a node as a plain [`Writable`], including through `dyn StreamWriter`.
pub trait AsWritable {
    fn as_writable_mut(&mut self) -> &mut dyn Writable;
}

impl<T: Writable> AsWritable for T {
    fn as_writable_mut(&mut self) -> &mut dyn Writable {
        self
    }
}

/// A node that is listed in the minidump's stream directory.
pub trait StreamWriter: Writable + AsWritable {
    /// Fixed at construction, so it can be read in any state.
    fn stream_type(&self) -> StreamType;
}
