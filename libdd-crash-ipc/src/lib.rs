// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Kernel message plumbing for the crash handler.
//!
//! The handler process has to wake up and talk to a crashing process without
//! ever hanging past a fixed instant. [`transport::MessageTransport`] wraps a
//! single send/receive primitive ([`transport::MessageFacility`]) and enforces
//! an absolute [`deadline::MessageDeadline`] across any number of interrupted
//! retries. [`server::MessageServer`] builds the request/reply exchange on top
//! of it.

#[cfg(not(unix))]
compile_error!("libdd-crash-ipc is only supported on unix platforms");

pub mod deadline;
pub mod message;
pub mod platform;
pub mod reply;
pub mod server;
pub mod transport;

pub use deadline::{
    deadline_from_timeout, Clock, MessageDeadline, MonotonicClock, NONBLOCKING, WAIT_INDEFINITELY,
};
pub use message::{
    MessageBuffer, MessageHeader, MessageOptions, MessageReturn, MessageTrailer, PortName,
    PORT_NULL,
};
pub use reply::{
    message_trailer_from_header, mig_reply_error, prepare_mig_reply_from_request,
    set_mig_reply_error,
};
pub use server::{MessageHandler, MessageServer, ServerConfiguration};
pub use transport::{MessageFacility, MessageTransport};
