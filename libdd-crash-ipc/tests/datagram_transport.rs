// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg(unix)]

use libdd_crash_ipc::message::{msgh_bits, MSG_TYPE_COPY_SEND, MSG_TYPE_MAKE_SEND_ONCE};
use libdd_crash_ipc::platform::DatagramFacility;
use libdd_crash_ipc::reply::KERN_SUCCESS;
use libdd_crash_ipc::{
    mig_reply_error, set_mig_reply_error, MessageBuffer, MessageHeader, MessageOptions,
    MessageReturn, MessageServer, MessageTrailer, MessageTransport, ServerConfiguration,
    NONBLOCKING, PORT_NULL,
};
use std::time::Duration;

const PING: i32 = 7300;

fn request(server: u32, client: u32, body: &[u8]) -> MessageBuffer {
    let header = MessageHeader {
        bits: msgh_bits(MSG_TYPE_COPY_SEND, MSG_TYPE_MAKE_SEND_ONCE),
        remote_port: server,
        local_port: client,
        id: PING,
        ..Default::default()
    };
    MessageBuffer::with_body(header, body)
}

#[test]
fn request_and_reply_round_trip() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut transport = MessageTransport::new(DatagramFacility::new());
    let server_port = transport.facility_mut().allocate_port().unwrap();
    let client_port = transport.facility_mut().allocate_port().unwrap();

    let mut message = request(server_port, client_port, b"ping");
    let mr = transport.message_with_deadline(
        &mut message,
        MessageOptions::SEND_MSG,
        0,
        PORT_NULL,
        NONBLOCKING,
        PORT_NULL,
        false,
    );
    assert_eq!(mr, MessageReturn::SUCCESS);

    let config = ServerConfiguration::new(Some(Duration::from_millis(500)), None).unwrap();
    let server = MessageServer::new(config);
    let mut seen = Vec::new();
    let mr = server.run_once(
        &mut transport,
        server_port,
        &mut |request: &MessageBuffer, trailer: Option<MessageTrailer>, reply: &mut MessageBuffer| {
            seen.push((request.header().id, request.body().to_vec(), trailer));
            set_mig_reply_error(reply, KERN_SUCCESS);
            true
        },
    );
    assert_eq!(mr, MessageReturn::SUCCESS);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, PING);
    assert_eq!(seen[0].1, b"ping");
    assert!(seen[0].2.is_some());

    let mut reply = MessageBuffer::with_capacity(128);
    let deadline = transport.deadline_from_timeout(500);
    let mr = transport.message_with_deadline(
        &mut reply,
        MessageOptions::RCV_MSG,
        128,
        client_port,
        deadline,
        PORT_NULL,
        false,
    );
    assert_eq!(mr, MessageReturn::SUCCESS);
    assert_eq!(reply.header().id, PING + 100);
    assert_eq!(reply.header().remote_port, PORT_NULL);
    assert_eq!(mig_reply_error(&reply), Some(KERN_SUCCESS));
}

#[test]
fn unhandled_request_is_answered_with_bad_id() {
    let mut transport = MessageTransport::new(DatagramFacility::new());
    let server_port = transport.facility_mut().allocate_port().unwrap();
    let client_port = transport.facility_mut().allocate_port().unwrap();

    let mut message = request(server_port, client_port, &[]);
    let mr = transport.message_with_deadline(
        &mut message,
        MessageOptions::SEND_MSG,
        0,
        PORT_NULL,
        NONBLOCKING,
        PORT_NULL,
        false,
    );
    assert!(mr.is_success());

    let server = MessageServer::new(ServerConfiguration::default());
    let mr = server.run_once(
        &mut transport,
        server_port,
        &mut |_: &MessageBuffer, _: Option<MessageTrailer>, _: &mut MessageBuffer| false,
    );
    assert_eq!(mr, MessageReturn::SUCCESS);

    let mut reply = MessageBuffer::with_capacity(128);
    let mr = transport.message_with_deadline(
        &mut reply,
        MessageOptions::RCV_MSG,
        128,
        client_port,
        NONBLOCKING,
        PORT_NULL,
        false,
    );
    assert_eq!(mr, MessageReturn::SUCCESS);
    assert_eq!(mig_reply_error(&reply), Some(libdd_crash_ipc::reply::MIG_BAD_ID));
}

#[test]
fn receive_times_out_at_deadline() {
    let mut transport = MessageTransport::new(DatagramFacility::new());
    let port = transport.facility_mut().allocate_port().unwrap();

    let mut message = MessageBuffer::with_capacity(64);
    let deadline = transport.deadline_from_timeout(20);
    let mr = transport.message_with_deadline(
        &mut message,
        MessageOptions::RCV_MSG,
        64,
        port,
        deadline,
        PORT_NULL,
        false,
    );
    assert_eq!(mr, MessageReturn::RCV_TIMED_OUT);
}

#[test]
fn server_times_out_without_requests() {
    let mut transport = MessageTransport::new(DatagramFacility::new());
    let port = transport.facility_mut().allocate_port().unwrap();
    let config = ServerConfiguration::new(Some(Duration::from_millis(10)), Some(256)).unwrap();
    let mr = MessageServer::new(config).run_once(
        &mut transport,
        port,
        &mut |_: &MessageBuffer, _: Option<MessageTrailer>, _: &mut MessageBuffer| true,
    );
    assert_eq!(mr, MessageReturn::RCV_TIMED_OUT);
}

#[test]
fn send_to_unknown_port_is_invalid_dest() {
    let mut transport = MessageTransport::new(DatagramFacility::new());
    let mut message = request(0x9999, PORT_NULL, b"x");
    let mr = transport.message_with_deadline(
        &mut message,
        MessageOptions::SEND_MSG,
        0,
        PORT_NULL,
        NONBLOCKING,
        PORT_NULL,
        false,
    );
    assert_eq!(mr, MessageReturn::SEND_INVALID_DEST);
}

#[test]
fn oversized_request_limit_from_config_file_is_bounded() {
    let mut transport = MessageTransport::new(DatagramFacility::new());
    let port = transport.facility_mut().allocate_port().unwrap();
    let config: ServerConfiguration = serde_json::from_str(
        r#"{"timeout":{"secs":0,"nanos":1000000},"max_request_size":4294967295}"#,
    )
    .unwrap();
    let mr = MessageServer::new(config).run_once(
        &mut transport,
        port,
        &mut |_: &MessageBuffer, _: Option<MessageTrailer>, _: &mut MessageBuffer| true,
    );
    assert_eq!(mr, MessageReturn::RCV_TIMED_OUT);
}
