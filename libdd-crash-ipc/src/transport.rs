// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::deadline::{
    deadline_from_timeout, remaining_timeout_ms, Clock, MessageDeadline, MonotonicClock,
    NONBLOCKING, WAIT_INDEFINITELY,
};
use crate::message::{MessageBuffer, MessageOptions, MessageReturn, PortName, PORT_NULL};
use tracing::debug;

/// `MACH_MSG_TIMEOUT_NONE`.
pub const TIMEOUT_NONE: u32 = 0;

/// The single blocking primitive of a kernel message-passing facility.
///
/// One call sends and/or receives one message. `timeout_ms` only applies to the directions whose
/// `*_TIMEOUT` bit is present in `options`; without it the call may block indefinitely. An
/// interrupted wait must be reported as `SEND_INTERRUPTED` / `RCV_INTERRUPTED`, distinct from
/// both success and `*_TIMED_OUT`.
pub trait MessageFacility {
    fn message(
        &mut self,
        message: &mut MessageBuffer,
        options: MessageOptions,
        receive_size: u32,
        receive_port: PortName,
        timeout_ms: u32,
        notify_port: PortName,
    ) -> MessageReturn;
}

impl<F: MessageFacility + ?Sized> MessageFacility for &mut F {
    fn message(
        &mut self,
        message: &mut MessageBuffer,
        options: MessageOptions,
        receive_size: u32,
        receive_port: PortName,
        timeout_ms: u32,
        notify_port: PortName,
    ) -> MessageReturn {
        (**self).message(
            message,
            options,
            receive_size,
            receive_port,
            timeout_ms,
            notify_port,
        )
    }
}

/// Runs message operations against absolute deadlines rather than relative timeouts.
#[derive(Debug)]
pub struct MessageTransport<F, C = MonotonicClock> {
    facility: F,
    clock: C,
}

impl<F: MessageFacility> MessageTransport<F> {
    pub fn new(facility: F) -> Self {
        Self::with_clock(facility, MonotonicClock)
    }
}

impl<F: MessageFacility, C: Clock> MessageTransport<F, C> {
    pub fn with_clock(facility: F, clock: C) -> Self {
        Self { facility, clock }
    }

    pub fn facility(&self) -> &F {
        &self.facility
    }

    pub fn facility_mut(&mut self) -> &mut F {
        &mut self.facility
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn deadline_from_timeout(&self, timeout_ms: u32) -> MessageDeadline {
        deadline_from_timeout(&self.clock, timeout_ms)
    }

    /// Sends and/or receives one message, completing before `deadline`.
    ///
    /// This behaves like the facility's own call, except that:
    ///  - the `SEND_TIMEOUT` and `RCV_TIMEOUT` bits of `options` are ignored, `deadline` alone
    ///    bounds the call and applies to the send and the receive together;
    ///  - the size to send is taken from `message`'s header;
    ///  - `SEND_INTERRUPTED` and `RCV_INTERRUPTED` are retried unless `options` contains
    ///    `SEND_INTERRUPT` or `RCV_INTERRUPT`. Each retry waits only for what is left before
    ///    `deadline`, never for the original timeout again.
    ///
    /// When `deadline` has already passed on entry the operation is still attempted once without
    /// blocking, so anything immediately available is delivered; otherwise the result is
    /// `SEND_TIMED_OUT` or `RCV_TIMED_OUT`. With `run_even_if_expired` the expired deadline is
    /// replaced by [`NONBLOCKING`] up front.
    ///
    /// The facility's status is returned unchanged.
    #[allow(clippy::too_many_arguments)]
    pub fn message_with_deadline(
        &mut self,
        message: &mut MessageBuffer,
        options: MessageOptions,
        receive_size: u32,
        receive_port: PortName,
        deadline: MessageDeadline,
        notify_port: PortName,
        run_even_if_expired: bool,
    ) -> MessageReturn {
        let options = options - (MessageOptions::SEND_TIMEOUT | MessageOptions::RCV_TIMEOUT);

        let mut deadline = deadline;
        if run_even_if_expired
            && deadline != NONBLOCKING
            && deadline != WAIT_INDEFINITELY
            && self.clock.now_nanos() >= deadline
        {
            deadline = NONBLOCKING;
        }

        let send = options.contains(MessageOptions::SEND_MSG);
        let receive = options.contains(MessageOptions::RCV_MSG);
        if send && receive {
            // Send and receive separately, so that an interrupted receive is never retried by
            // sending the message a second time.
            let mr = self.run_until_deadline(
                message,
                options - MessageOptions::RCV_MSG,
                0,
                PORT_NULL,
                deadline,
                notify_port,
            );
            if !mr.is_success() {
                return mr;
            }
            return self.run_until_deadline(
                message,
                options - MessageOptions::SEND_MSG,
                receive_size,
                receive_port,
                deadline,
                notify_port,
            );
        }

        self.run_until_deadline(
            message,
            options,
            receive_size,
            receive_port,
            deadline,
            notify_port,
        )
    }

    fn run_until_deadline(
        &mut self,
        message: &mut MessageBuffer,
        options: MessageOptions,
        receive_size: u32,
        receive_port: PortName,
        deadline: MessageDeadline,
        notify_port: PortName,
    ) -> MessageReturn {
        // Interruptions always surface from the facility, the retry decision is made here.
        let facility_options =
            options | MessageOptions::SEND_INTERRUPT | MessageOptions::RCV_INTERRUPT;

        if deadline == WAIT_INDEFINITELY {
            loop {
                let mr = self.facility.message(
                    message,
                    facility_options,
                    receive_size,
                    receive_port,
                    TIMEOUT_NONE,
                    notify_port,
                );
                if !should_retry(mr, options) {
                    return mr;
                }
                debug!(status = %mr, "Message interrupted, retrying without a deadline");
            }
        }

        let facility_options =
            facility_options | MessageOptions::SEND_TIMEOUT | MessageOptions::RCV_TIMEOUT;
        let mut attempted = false;
        loop {
            let timeout_ms = if deadline == NONBLOCKING {
                0
            } else {
                remaining_timeout_ms(deadline, self.clock.now_nanos())
            };
            if timeout_ms == 0 && attempted {
                // Already tried once past the deadline.
                return timed_out(options);
            }
            attempted = true;

            let mr = self.facility.message(
                message,
                facility_options,
                receive_size,
                receive_port,
                timeout_ms,
                notify_port,
            );
            if !should_retry(mr, options) {
                return mr;
            }
            debug!(
                status = %mr,
                timeout_ms,
                "Message interrupted, retrying with the remaining time"
            );
        }
    }
}

fn should_retry(mr: MessageReturn, options: MessageOptions) -> bool {
    (mr == MessageReturn::SEND_INTERRUPTED && !options.contains(MessageOptions::SEND_INTERRUPT))
        || (mr == MessageReturn::RCV_INTERRUPTED
            && !options.contains(MessageOptions::RCV_INTERRUPT))
}

fn timed_out(options: MessageOptions) -> MessageReturn {
    if options.contains(MessageOptions::SEND_MSG) {
        MessageReturn::SEND_TIMED_OUT
    } else {
        MessageReturn::RCV_TIMED_OUT
    }
}
