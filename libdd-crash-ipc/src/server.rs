// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::deadline::Clock;
use crate::message::{MessageBuffer, MessageHeader, MessageOptions, MessageReturn, PortName};
use crate::message::{MessageTrailer, PORT_NULL};
use crate::reply::{
    message_trailer_from_header, mig_reply_error, prepare_mig_reply_from_request,
    set_mig_reply_error, MIG_BAD_ID, MIG_NO_REPLY, MIG_REPLY_ERROR_SIZE,
};
use crate::transport::{MessageFacility, MessageTransport};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_REQUEST_SIZE: u32 = 1024;
/// Upper bound on `max_request_size`; the receive buffer is allocated up front.
pub const MAX_REQUEST_SIZE: u32 = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfiguration {
    /// How long to wait for a request, and then for its reply to be sent, all told.
    timeout: Duration,
    /// Largest request body accepted, header included, trailer excluded.
    max_request_size: u32,
}

impl Default for ServerConfiguration {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
        }
    }
}

impl ServerConfiguration {
    pub fn new(timeout: Option<Duration>, max_request_size: Option<u32>) -> anyhow::Result<Self> {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let max_request_size = max_request_size.unwrap_or(DEFAULT_MAX_REQUEST_SIZE);
        anyhow::ensure!(
            max_request_size as usize >= MessageHeader::SIZE,
            "A request of {max_request_size} bytes cannot hold a message header"
        );
        anyhow::ensure!(
            max_request_size <= MAX_REQUEST_SIZE,
            "Requests of {max_request_size} bytes exceed the {MAX_REQUEST_SIZE} byte limit"
        );
        anyhow::ensure!(
            ceil_millis(timeout) <= u128::from(u32::MAX),
            "Timeout {timeout:?} does not fit in a millisecond message timeout"
        );
        Ok(Self {
            timeout,
            max_request_size,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_request_size(&self) -> u32 {
        self.max_request_size
    }

    fn timeout_ms(&self) -> u32 {
        u32::try_from(ceil_millis(self.timeout)).unwrap_or(u32::MAX)
    }

    /// `max_request_size` as bounded by [`MAX_REQUEST_SIZE`], also for deserialized values.
    fn receive_size(&self) -> u32 {
        self.max_request_size.min(MAX_REQUEST_SIZE) + MessageTrailer::SIZE as u32
    }
}

/// Rounds up so that a sub-millisecond timeout still waits instead of becoming nonblocking.
fn ceil_millis(timeout: Duration) -> u128 {
    timeout.as_nanos().div_ceil(1_000_000)
}

/// A server routine answering one kind of request.
pub trait MessageHandler {
    /// Handles `request`, filling in `reply`.
    ///
    /// `reply` arrives prepared as a `mig_reply_error_t` for `request`. Returns `false` if the
    /// request is not one this handler understands, in which case the reply carries
    /// `MIG_BAD_ID`. Storing `MIG_NO_REPLY` as the reply's return code suppresses the reply.
    fn handle(
        &mut self,
        request: &MessageBuffer,
        trailer: Option<MessageTrailer>,
        reply: &mut MessageBuffer,
    ) -> bool;
}

impl<F> MessageHandler for F
where
    F: FnMut(&MessageBuffer, Option<MessageTrailer>, &mut MessageBuffer) -> bool,
{
    fn handle(
        &mut self,
        request: &MessageBuffer,
        trailer: Option<MessageTrailer>,
        reply: &mut MessageBuffer,
    ) -> bool {
        self(request, trailer, reply)
    }
}

/// Receives a request, dispatches it and sends the reply, all within one deadline.
#[derive(Debug, Clone, Default)]
pub struct MessageServer {
    config: ServerConfiguration,
}

impl MessageServer {
    pub fn new(config: ServerConfiguration) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfiguration {
        &self.config
    }

    /// Serves a single request arriving on `receive_port`.
    ///
    /// Returns the status of the receive if it failed, otherwise that of the reply (or success
    /// when no reply was due).
    pub fn run_once<F, C>(
        &self,
        transport: &mut MessageTransport<F, C>,
        receive_port: PortName,
        handler: &mut impl MessageHandler,
    ) -> MessageReturn
    where
        F: MessageFacility,
        C: Clock,
    {
        let deadline = transport.deadline_from_timeout(self.config.timeout_ms());
        let receive_size = self.config.receive_size();
        let mut request = MessageBuffer::with_capacity(receive_size as usize);

        let mr = transport.message_with_deadline(
            &mut request,
            MessageOptions::RCV_MSG,
            receive_size,
            receive_port,
            deadline,
            PORT_NULL,
            false,
        );
        if !mr.is_success() {
            debug!(status = %mr, receive_port, "No request received");
            return mr;
        }

        let header = request.header();
        let trailer = message_trailer_from_header(&request);
        let mut reply = MessageBuffer::with_capacity(MIG_REPLY_ERROR_SIZE);
        prepare_mig_reply_from_request(&header, &mut reply);
        if !handler.handle(&request, trailer, &mut reply) {
            warn!(id = header.id, "Unrecognized request");
            set_mig_reply_error(&mut reply, MIG_BAD_ID);
        }

        let reply_header = reply.header();
        if reply_header.remote_port == PORT_NULL || mig_reply_error(&reply) == Some(MIG_NO_REPLY)
        {
            return MessageReturn::SUCCESS;
        }

        // The request already consumed the time; still try to hand the reply over.
        transport.message_with_deadline(
            &mut reply,
            MessageOptions::SEND_MSG,
            0,
            PORT_NULL,
            deadline,
            PORT_NULL,
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_defaults() {
        let config = ServerConfiguration::new(None, None).unwrap();
        assert_eq!(config, ServerConfiguration::default());
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.max_request_size(), 1024);
        assert_eq!(config.timeout_ms(), 5000);
    }

    #[test]
    fn configuration_rejects_tiny_requests() {
        assert!(ServerConfiguration::new(None, Some(8)).is_err());
    }

    #[test]
    fn configuration_rejects_huge_requests() {
        assert!(ServerConfiguration::new(None, Some(MAX_REQUEST_SIZE)).is_ok());
        assert!(ServerConfiguration::new(None, Some(MAX_REQUEST_SIZE + 1)).is_err());
        assert!(ServerConfiguration::new(None, Some(u32::MAX)).is_err());
    }

    #[test]
    fn deserialized_request_size_is_capped() {
        let json = r#"{"timeout":{"secs":0,"nanos":1000000},"max_request_size":4294967295}"#;
        let config: ServerConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.receive_size(),
            MAX_REQUEST_SIZE + MessageTrailer::SIZE as u32
        );
    }

    #[test]
    fn sub_millisecond_timeouts_round_up() {
        let config = ServerConfiguration::new(Some(Duration::from_micros(500)), None).unwrap();
        assert_eq!(config.timeout_ms(), 1);
        let config = ServerConfiguration::new(Some(Duration::from_micros(1500)), None).unwrap();
        assert_eq!(config.timeout_ms(), 2);
        let config = ServerConfiguration::new(Some(Duration::ZERO), None).unwrap();
        assert_eq!(config.timeout_ms(), 0);
    }

    #[test]
    fn configuration_rejects_huge_timeouts() {
        let timeout = Duration::from_millis(u64::from(u32::MAX) + 1);
        assert!(ServerConfiguration::new(Some(timeout), None).is_err());
    }

    #[test]
    fn configuration_serializes() {
        let config = ServerConfiguration::new(Some(Duration::from_millis(250)), Some(256)).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: ServerConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
