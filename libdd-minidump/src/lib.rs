// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Minidump serialization.
//!
//! A minidump is built as a tree of [`writable::Writable`] nodes rooted at a
//! [`file_writer::MinidumpFileWriter`]. The tree is frozen, laid out so that every
//! forward reference (a [`format::LocationDescriptor`] embedded in some ancestor record)
//! knows where its target lands, and only then written out front to back.

pub mod crashpad_info;
pub mod errors;
pub mod file_writer;
pub mod format;
pub mod module_crashpad_info;
pub mod stream;
pub mod user_stream;
pub mod writable;

pub use crashpad_info::CrashpadInfoWriter;
pub use errors::WriterError;
pub use file_writer::MinidumpFileWriter;
pub use format::{LocationDescriptor, Rva, StreamType};
pub use module_crashpad_info::{ModuleCrashpadInfoListWriter, ModuleCrashpadInfoWriter};
pub use stream::StreamWriter;
pub use user_stream::UserStreamWriter;
pub use writable::{Child, State, Writable, WritableBase};
