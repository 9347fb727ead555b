// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A message facility over loopback datagram sockets.
//!
//! Each port is a connected `UnixDatagram` pair: messages sent to the port are written on one
//! end and received from the other. Waiting is done with `poll(2)`, which reports `EINTR`, so
//! interrupted, timed out and completed operations stay distinguishable.

use crate::message::{
    round_msg, MessageBuffer, MessageHeader, MessageOptions, MessageReturn, MessageTrailer,
    PortName,
};
use crate::transport::MessageFacility;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixDatagram;
use tracing::debug;

#[derive(Debug)]
struct Port {
    sender: UnixDatagram,
    receiver: UnixDatagram,
}

#[derive(Debug)]
enum Readiness {
    Ready,
    TimedOut,
    Interrupted,
}

fn wait_for(fd: BorrowedFd<'_>, events: PollFlags, timeout_ms: Option<u32>) -> io::Result<Readiness> {
    let timeout = match timeout_ms {
        None => PollTimeout::NONE,
        Some(ms) => PollTimeout::try_from(ms).unwrap_or(PollTimeout::MAX),
    };
    let mut fds = [PollFd::new(fd, events)];
    match poll(&mut fds, timeout) {
        Ok(0) => Ok(Readiness::TimedOut),
        Ok(_) => Ok(Readiness::Ready),
        Err(Errno::EINTR) => Ok(Readiness::Interrupted),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default)]
pub struct DatagramFacility {
    ports: HashMap<PortName, Port>,
    last_port: PortName,
}

impl DatagramFacility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new port and returns its name. Names are never [`crate::PORT_NULL`].
    pub fn allocate_port(&mut self) -> io::Result<PortName> {
        let (sender, receiver) = UnixDatagram::pair()?;
        sender.set_nonblocking(true)?;
        receiver.set_nonblocking(true)?;
        // Mach port names look like 0x1003, 0x1103, ...
        self.last_port = self.last_port.max(0x1003 - 0x100) + 0x100;
        self.ports.insert(self.last_port, Port { sender, receiver });
        Ok(self.last_port)
    }

    /// Destroys a port; messages queued on it are lost. Returns whether the port existed.
    pub fn deallocate_port(&mut self, name: PortName) -> bool {
        self.ports.remove(&name).is_some()
    }

    fn send(
        &mut self,
        message: &MessageBuffer,
        options: MessageOptions,
        timeout_ms: u32,
    ) -> MessageReturn {
        let header = message.header();
        let size = header.size as usize;
        if size < MessageHeader::SIZE {
            return MessageReturn::SEND_MSG_TOO_SMALL;
        }
        if size > message.capacity() {
            return MessageReturn::SEND_INVALID_DATA;
        }
        let Some(port) = self.ports.get(&header.remote_port) else {
            return MessageReturn::SEND_INVALID_DEST;
        };

        // The receiver sees the reply port as remote and its own port as local.
        let mut delivered = MessageBuffer::with_capacity(size);
        delivered.as_bytes_mut()[..size].copy_from_slice(&message.as_bytes()[..size]);
        delivered.set_header(&MessageHeader {
            remote_port: header.local_port,
            local_port: header.remote_port,
            ..header
        });

        let timeout = options
            .contains(MessageOptions::SEND_TIMEOUT)
            .then_some(timeout_ms);
        match wait_for(port.sender.as_fd(), PollFlags::POLLOUT, timeout) {
            Ok(Readiness::Ready) => {}
            Ok(Readiness::TimedOut) => return MessageReturn::SEND_TIMED_OUT,
            Ok(Readiness::Interrupted) => return MessageReturn::SEND_INTERRUPTED,
            Err(e) => {
                debug!(error = %e, "Polling for send failed");
                return MessageReturn::SEND_INVALID_DEST;
            }
        }

        match port.sender.send(&delivered.as_bytes()[..size]) {
            Ok(n) if n == size => MessageReturn::SUCCESS,
            Ok(_) => MessageReturn::SEND_INVALID_DATA,
            Err(e) if e.kind() == ErrorKind::Interrupted => MessageReturn::SEND_INTERRUPTED,
            Err(e) if e.kind() == ErrorKind::WouldBlock => MessageReturn::SEND_TIMED_OUT,
            Err(e) => {
                debug!(error = %e, "Datagram send failed");
                MessageReturn::SEND_INVALID_DEST
            }
        }
    }

    fn receive(
        &mut self,
        message: &mut MessageBuffer,
        options: MessageOptions,
        receive_size: u32,
        receive_port: PortName,
        timeout_ms: u32,
    ) -> MessageReturn {
        let Some(port) = self.ports.get(&receive_port) else {
            return MessageReturn::RCV_INVALID_NAME;
        };
        let receive_size = (receive_size as usize).min(message.capacity());
        if receive_size < MessageHeader::SIZE + MessageTrailer::SIZE {
            return MessageReturn::RCV_INVALID_DATA;
        }

        let timeout = options
            .contains(MessageOptions::RCV_TIMEOUT)
            .then_some(timeout_ms);
        match wait_for(port.receiver.as_fd(), PollFlags::POLLIN, timeout) {
            Ok(Readiness::Ready) => {}
            Ok(Readiness::TimedOut) => return MessageReturn::RCV_TIMED_OUT,
            Ok(Readiness::Interrupted) => return MessageReturn::RCV_INTERRUPTED,
            Err(e) => {
                debug!(error = %e, "Polling for receive failed");
                return MessageReturn::RCV_INVALID_NAME;
            }
        }

        // One byte more than can be accepted, to notice a datagram that was cut short.
        let mut datagram = vec![0u8; receive_size + 1];
        let n = match port.receiver.recv(&mut datagram) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => return MessageReturn::RCV_INTERRUPTED,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return MessageReturn::RCV_TIMED_OUT,
            Err(e) => {
                debug!(error = %e, "Datagram receive failed");
                return MessageReturn::RCV_INVALID_DATA;
            }
        };
        if n < MessageHeader::SIZE {
            return MessageReturn::RCV_INVALID_DATA;
        }
        let trailer_offset = round_msg(n);
        if trailer_offset + MessageTrailer::SIZE > receive_size {
            return MessageReturn::RCV_TOO_LARGE;
        }

        message.clear();
        let bytes = message.as_bytes_mut();
        bytes[..n].copy_from_slice(&datagram[..n]);
        MessageTrailer {
            trailer_type: MessageTrailer::FORMAT_0,
            trailer_size: MessageTrailer::SIZE as u32,
        }
        .write(&mut bytes[trailer_offset..trailer_offset + MessageTrailer::SIZE]);
        let mut header = message.header();
        header.size = n as u32;
        message.set_header(&header);
        MessageReturn::SUCCESS
    }
}

impl MessageFacility for DatagramFacility {
    fn message(
        &mut self,
        message: &mut MessageBuffer,
        options: MessageOptions,
        receive_size: u32,
        receive_port: PortName,
        timeout_ms: u32,
        _notify_port: PortName,
    ) -> MessageReturn {
        if options.contains(MessageOptions::SEND_MSG) {
            let mr = self.send(message, options, timeout_ms);
            if !mr.is_success() || !options.contains(MessageOptions::RCV_MSG) {
                return mr;
            }
        }
        if options.contains(MessageOptions::RCV_MSG) {
            return self.receive(message, options, receive_size, receive_port, timeout_ms);
        }
        MessageReturn::SUCCESS
    }
}
