// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::message::{MessageBuffer, MessageOptions, MessageReturn, PortName};
use crate::transport::MessageFacility;
use mach2::message::{mach_msg, mach_msg_header_t};

/// The kernel's own `mach_msg` trap.
#[derive(Debug, Default, Clone, Copy)]
pub struct MachFacility;

impl MessageFacility for MachFacility {
    fn message(
        &mut self,
        message: &mut MessageBuffer,
        options: MessageOptions,
        receive_size: u32,
        receive_port: PortName,
        timeout_ms: u32,
        notify_port: PortName,
    ) -> MessageReturn {
        let send_size = if options.contains(MessageOptions::SEND_MSG) {
            message.header().size
        } else {
            0
        };
        if send_size as usize > message.capacity() {
            return MessageReturn::SEND_INVALID_DATA;
        }
        let receive_size = receive_size.min(message.capacity() as u32);
        // SAFETY: the buffer is 4-byte aligned, at least a header long, and both sizes were
        // clamped to its capacity, so the kernel never reads or writes past it.
        let mr = unsafe {
            mach_msg(
                message.as_mut_ptr().cast::<mach_msg_header_t>(),
                options.bits(),
                send_size,
                receive_size,
                receive_port,
                timeout_ms,
                notify_port,
            )
        };
        MessageReturn(mr)
    }
}
