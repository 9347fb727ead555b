// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::writable::State;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("{operation} requires state {expected:?}, node is {actual:?}")]
    InvalidState {
        operation: &'static str,
        expected: State,
        actual: State,
    },
    #[error("Offset {offset:#x} does not fit in a 32-bit RVA")]
    OffsetOverflow { offset: u64 },
    #[error("Size {size} does not fit in 32 bits")]
    SizeOverflow { size: usize },
    #[error("Stream type {0:#x} was already added")]
    DuplicateStream(u32),
    #[error("Node wrote {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("Failed to write to output: {0}")]
    WriteError(#[from] std::io::Error),
}
