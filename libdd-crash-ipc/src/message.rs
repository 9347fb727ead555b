// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The kernel message vocabulary, laid out the way Mach lays it out so that a buffer can be
//! handed to `mach_msg` as is.

use byteorder::{ByteOrder, NativeEndian};
use std::fmt;

pub type PortName = u32;

pub const PORT_NULL: PortName = 0;

/// Port right dispositions carried in [`MessageHeader::bits`].
pub const MSG_TYPE_MOVE_SEND: u32 = 17;
pub const MSG_TYPE_MOVE_SEND_ONCE: u32 = 18;
pub const MSG_TYPE_COPY_SEND: u32 = 19;
pub const MSG_TYPE_MAKE_SEND: u32 = 20;
pub const MSG_TYPE_MAKE_SEND_ONCE: u32 = 21;

const MSGH_BITS_REMOTE_MASK: u32 = 0x0000_001f;
const MSGH_BITS_LOCAL_MASK: u32 = 0x0000_1f00;

pub const fn msgh_bits(remote: u32, local: u32) -> u32 {
    remote | (local << 8)
}

pub const fn msgh_bits_remote(bits: u32) -> u32 {
    bits & MSGH_BITS_REMOTE_MASK
}

pub const fn msgh_bits_local(bits: u32) -> u32 {
    (bits & MSGH_BITS_LOCAL_MASK) >> 8
}

bitflags::bitflags! {
    /// `mach_msg_option_t`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MessageOptions: i32 {
        const SEND_MSG = 0x0000_0001;
        const RCV_MSG = 0x0000_0002;
        const RCV_LARGE = 0x0000_0004;
        const SEND_TIMEOUT = 0x0000_0010;
        const SEND_INTERRUPT = 0x0000_0040;
        const RCV_TIMEOUT = 0x0000_0100;
        const RCV_INTERRUPT = 0x0000_0400;

        // Trailer requests and the rest are passed through untouched.
        const _ = !0;
    }
}

/// `mach_msg_return_t`. Values are returned to callers exactly as the facility produced them.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageReturn(pub i32);

impl MessageReturn {
    pub const SUCCESS: Self = Self(0);
    pub const SEND_INVALID_DATA: Self = Self(0x1000_0002);
    pub const SEND_INVALID_DEST: Self = Self(0x1000_0003);
    pub const SEND_TIMED_OUT: Self = Self(0x1000_0004);
    pub const SEND_INTERRUPTED: Self = Self(0x1000_0007);
    pub const SEND_MSG_TOO_SMALL: Self = Self(0x1000_0008);
    pub const RCV_INVALID_NAME: Self = Self(0x1000_4002);
    pub const RCV_TIMED_OUT: Self = Self(0x1000_4003);
    pub const RCV_TOO_LARGE: Self = Self(0x1000_4004);
    pub const RCV_INTERRUPTED: Self = Self(0x1000_4005);
    pub const RCV_INVALID_DATA: Self = Self(0x1000_4008);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::SUCCESS => "MACH_MSG_SUCCESS",
            Self::SEND_INVALID_DATA => "MACH_SEND_INVALID_DATA",
            Self::SEND_INVALID_DEST => "MACH_SEND_INVALID_DEST",
            Self::SEND_TIMED_OUT => "MACH_SEND_TIMED_OUT",
            Self::SEND_INTERRUPTED => "MACH_SEND_INTERRUPTED",
            Self::SEND_MSG_TOO_SMALL => "MACH_SEND_MSG_TOO_SMALL",
            Self::RCV_INVALID_NAME => "MACH_RCV_INVALID_NAME",
            Self::RCV_TIMED_OUT => "MACH_RCV_TIMED_OUT",
            Self::RCV_TOO_LARGE => "MACH_RCV_TOO_LARGE",
            Self::RCV_INTERRUPTED => "MACH_RCV_INTERRUPTED",
            Self::RCV_INVALID_DATA => "MACH_RCV_INVALID_DATA",
            _ => return None,
        })
    }
}

impl fmt::Display for MessageReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({:#x})", self.0),
            None => write!(f, "{:#x}", self.0),
        }
    }
}

impl fmt::Debug for MessageReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// `mach_msg_header_t`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub bits: u32,
    /// Size of the header and body in bytes, excluding any trailer.
    pub size: u32,
    pub remote_port: PortName,
    pub local_port: PortName,
    pub voucher_port: PortName,
    pub id: i32,
}

impl MessageHeader {
    pub const SIZE: usize = 24;

    fn read(bytes: &[u8]) -> Self {
        Self {
            bits: NativeEndian::read_u32(&bytes[0..4]),
            size: NativeEndian::read_u32(&bytes[4..8]),
            remote_port: NativeEndian::read_u32(&bytes[8..12]),
            local_port: NativeEndian::read_u32(&bytes[12..16]),
            voucher_port: NativeEndian::read_u32(&bytes[16..20]),
            id: NativeEndian::read_i32(&bytes[20..24]),
        }
    }

    fn write(&self, bytes: &mut [u8]) {
        NativeEndian::write_u32(&mut bytes[0..4], self.bits);
        NativeEndian::write_u32(&mut bytes[4..8], self.size);
        NativeEndian::write_u32(&mut bytes[8..12], self.remote_port);
        NativeEndian::write_u32(&mut bytes[12..16], self.local_port);
        NativeEndian::write_u32(&mut bytes[16..20], self.voucher_port);
        NativeEndian::write_i32(&mut bytes[20..24], self.id);
    }
}

/// `mach_msg_trailer_t`, the format-0 trailer every received message carries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MessageTrailer {
    pub trailer_type: u32,
    pub trailer_size: u32,
}

impl MessageTrailer {
    pub const SIZE: usize = 8;
    pub const FORMAT_0: u32 = 0;

    pub(crate) fn read(bytes: &[u8]) -> Self {
        Self {
            trailer_type: NativeEndian::read_u32(&bytes[0..4]),
            trailer_size: NativeEndian::read_u32(&bytes[4..8]),
        }
    }

    pub(crate) fn write(&self, bytes: &mut [u8]) {
        NativeEndian::write_u32(&mut bytes[0..4], self.trailer_type);
        NativeEndian::write_u32(&mut bytes[4..8], self.trailer_size);
    }
}

/// Rounds a message size up to the kernel's natural alignment.
pub const fn round_msg(size: usize) -> usize {
    (size + 3) & !3
}

/// An owned, 4-byte aligned message buffer with the header at offset zero.
///
/// The alignment matches what `mach_msg` expects of a `mach_msg_header_t*`, so the buffer can be
/// handed to the kernel directly.
#[derive(Clone, PartialEq, Eq)]
pub struct MessageBuffer {
    words: Vec<u32>,
}

impl fmt::Debug for MessageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBuffer")
            .field("capacity", &self.capacity())
            .field("header", &self.header())
            .finish()
    }
}

impl MessageBuffer {
    /// Allocates a zeroed buffer of at least `capacity` bytes, and never less than a header.
    pub fn with_capacity(capacity: usize) -> Self {
        let bytes = round_msg(capacity.max(MessageHeader::SIZE));
        Self {
            words: vec![0; bytes / 4],
        }
    }

    /// Builds a message whose body is `body`, with `header.size` filled in.
    pub fn with_body(mut header: MessageHeader, body: &[u8]) -> Self {
        let size = MessageHeader::SIZE + body.len();
        let mut message = Self::with_capacity(size);
        header.size = size as u32;
        message.set_header(&header);
        message.as_bytes_mut()[MessageHeader::SIZE..size].copy_from_slice(body);
        message
    }

    pub fn capacity(&self) -> usize {
        self.words.len() * 4
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: u32 has no padding or invalid bit patterns, and the slice covers exactly the
        // words owned by the vector.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.capacity()) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.capacity();
        // SAFETY: see `as_bytes`; the mutable borrow of `self` makes the view exclusive.
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), len) }
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr().cast()
    }

    pub fn header(&self) -> MessageHeader {
        MessageHeader::read(self.as_bytes())
    }

    pub fn set_header(&mut self, header: &MessageHeader) {
        header.write(self.as_bytes_mut())
    }

    /// The bytes between the header and `header.size`, clamped to the buffer.
    pub fn body(&self) -> &[u8] {
        let end = (self.header().size as usize).clamp(MessageHeader::SIZE, self.capacity());
        &self.as_bytes()[MessageHeader::SIZE..end]
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }
}
