// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helpers for the reply side of a MIG style request/reply exchange, and for reaching the trailer
//! the kernel appends to received messages.

use crate::message::{
    msgh_bits, msgh_bits_remote, round_msg, MessageBuffer, MessageHeader, MessageTrailer,
    PORT_NULL,
};
use byteorder::{ByteOrder, NativeEndian};

pub const KERN_SUCCESS: i32 = 0;
/// The request's message id was not recognized by the server.
pub const MIG_BAD_ID: i32 = -303;
/// The server routine takes care of the reply itself, or sends none.
pub const MIG_NO_REPLY: i32 = -305;

/// Replies carry the id of their request plus this.
pub const MIG_REPLY_ID_OFFSET: i32 = 100;

const NDR_OFFSET: usize = MessageHeader::SIZE;
const RET_CODE_OFFSET: usize = NDR_OFFSET + 8;

/// `sizeof(mig_reply_error_t)`: header, NDR record, return code.
pub const MIG_REPLY_ERROR_SIZE: usize = RET_CODE_OFFSET + 4;

/// `NDR_record`, describing the sender's data representation.
const NDR_RECORD: [u8; 8] = [
    0, // mig_vers
    0, // if_vers
    0, // reserved1
    0, // mig_encoding
    if cfg!(target_endian = "little") { 1 } else { 0 }, // int_rep
    0, // char_rep
    0, // float_rep
    0, // reserved2
];

/// Initializes `reply` as a `mig_reply_error_t` answering `request`.
///
/// Every field is set except the return code, which belongs to [`set_mig_reply_error`]. A server
/// routine that replies with a larger structure may still have to adjust `size`.
pub fn prepare_mig_reply_from_request(request: &MessageHeader, reply: &mut MessageBuffer) {
    if reply.capacity() < MIG_REPLY_ERROR_SIZE {
        *reply = MessageBuffer::with_capacity(MIG_REPLY_ERROR_SIZE);
    }
    reply.set_header(&MessageHeader {
        bits: msgh_bits(msgh_bits_remote(request.bits), 0),
        size: MIG_REPLY_ERROR_SIZE as u32,
        remote_port: request.remote_port,
        local_port: PORT_NULL,
        voucher_port: PORT_NULL,
        id: request.id.wrapping_add(MIG_REPLY_ID_OFFSET),
    });
    reply.as_bytes_mut()[NDR_OFFSET..RET_CODE_OFFSET].copy_from_slice(&NDR_RECORD);
}

/// Stores `error` as the return code of a reply prepared by [`prepare_mig_reply_from_request`].
pub fn set_mig_reply_error(reply: &mut MessageBuffer, error: i32) {
    NativeEndian::write_i32(
        &mut reply.as_bytes_mut()[RET_CODE_OFFSET..MIG_REPLY_ERROR_SIZE],
        error,
    );
}

/// Reads back the return code of a `mig_reply_error_t`, if the buffer is large enough to hold one.
pub fn mig_reply_error(reply: &MessageBuffer) -> Option<i32> {
    reply
        .as_bytes()
        .get(RET_CODE_OFFSET..MIG_REPLY_ERROR_SIZE)
        .map(NativeEndian::read_i32)
}

/// Returns the trailer that follows a received message's body.
///
/// Only messages that were actually received carry a trailer; for a message built for sending
/// this returns whatever bytes follow its body. The only check made is that the trailer lies
/// within the buffer.
pub fn message_trailer_from_header(message: &MessageBuffer) -> Option<MessageTrailer> {
    let offset = round_msg(message.header().size as usize);
    message
        .as_bytes()
        .get(offset..offset + MessageTrailer::SIZE)
        .map(MessageTrailer::read)
}
