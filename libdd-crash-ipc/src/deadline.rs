// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use tracing::error;

/// The instant before which a [`crate::MessageTransport::message_with_deadline`] call should
/// complete.
///
/// A value of this type is either one of the special constants [`NONBLOCKING`] or
/// [`WAIT_INDEFINITELY`], or an absolute point in time, in nanoseconds, on the [`Clock`] that
/// produced it. Deadlines from different clocks must never be compared.
pub type MessageDeadline = u64;

/// The call should not block at all.
pub const NONBLOCKING: MessageDeadline = 0;

/// The call should wait for as long as it takes.
pub const WAIT_INDEFINITELY: MessageDeadline = MessageDeadline::MAX;

pub const NANOS_PER_MILLI: u64 = 1_000_000;

/// A source of monotonic time in nanoseconds.
pub trait Clock {
    fn now_nanos(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_nanos(&self) -> u64 {
        (**self).now_nanos()
    }
}

/// Reported when the monotonic clock cannot be read. Every deadline then reads as already
/// expired, so message calls never block.
const CLOCK_UNAVAILABLE: u64 = WAIT_INDEFINITELY - 1;

/// `CLOCK_MONOTONIC`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now_nanos(&self) -> u64 {
        let ts = match nix::time::clock_gettime(nix::time::ClockId::CLOCK_MONOTONIC) {
            Ok(ts) => ts,
            Err(e) => {
                error!(error = %e, "Failed to read the monotonic clock");
                return CLOCK_UNAVAILABLE;
            }
        };
        (ts.tv_sec() as u64)
            .saturating_mul(1_000_000_000)
            .saturating_add(ts.tv_nsec() as u64)
    }
}

/// Computes the deadline `timeout_ms` milliseconds from now.
///
/// A timeout of `0` yields [`NONBLOCKING`] rather than "now", so that zero always means
/// "don't wait". Any other timeout is clamped below [`WAIT_INDEFINITELY`]: a finite budget
/// never becomes an infinite one.
pub fn deadline_from_timeout(clock: &impl Clock, timeout_ms: u32) -> MessageDeadline {
    if timeout_ms == 0 {
        return NONBLOCKING;
    }
    clock
        .now_nanos()
        .saturating_add(u64::from(timeout_ms) * NANOS_PER_MILLI)
        .min(WAIT_INDEFINITELY - 1)
}

/// Milliseconds left until `deadline`, rounded up so that a sub-millisecond remainder is still
/// waited for. Returns `0` once the deadline has passed.
pub fn remaining_timeout_ms(deadline: MessageDeadline, now: u64) -> u32 {
    let remaining = deadline.saturating_sub(now);
    let ms = remaining.div_ceil(NANOS_PER_MILLI);
    u32::try_from(ms).unwrap_or(u32::MAX)
}


#[cfg(test)]
mod tests {
    use super::test_utils::SimulatedClock;
    use super::*;

    #[test]
    fn zero_timeout_is_nonblocking() {
        let clock = SimulatedClock::starting_at(42 * NANOS_PER_MILLI);
        assert_eq!(deadline_from_timeout(&clock, 0), NONBLOCKING);
    }

    #[test]
    fn timeout_is_relative_to_now() {
        let clock = SimulatedClock::starting_at(1_000);
        assert_eq!(deadline_from_timeout(&clock, 5), 1_000 + 5 * NANOS_PER_MILLI);
        clock.advance(NANOS_PER_MILLI);
        assert_eq!(deadline_from_timeout(&clock, 5), 1_000 + 6 * NANOS_PER_MILLI);
    }

    #[test]
    fn largest_timeout_does_not_overflow() {
        let clock = SimulatedClock::starting_at(u64::MAX - 10);
        let deadline = deadline_from_timeout(&clock, u32::MAX);
        assert_ne!(deadline, WAIT_INDEFINITELY);
        assert_ne!(deadline, NONBLOCKING);

        let clock = SimulatedClock::starting_at(0);
        assert_eq!(
            deadline_from_timeout(&clock, u32::MAX),
            u64::from(u32::MAX) * NANOS_PER_MILLI
        );
    }

    #[test]
    fn monotonic_clock_is_close_to_now() {
        let clock = MonotonicClock;
        let before = clock.now_nanos();
        let deadline = deadline_from_timeout(&clock, 10);
        let after = clock.now_nanos();
        assert!(deadline >= before + 10 * NANOS_PER_MILLI);
        assert!(deadline <= after + 10 * NANOS_PER_MILLI);
    }

    #[test]
    fn unreadable_clock_expires_every_deadline() {
        let clock = SimulatedClock::starting_at(CLOCK_UNAVAILABLE);
        let deadline = deadline_from_timeout(&clock, 1_000);
        assert_ne!(deadline, WAIT_INDEFINITELY);
        assert_eq!(remaining_timeout_ms(deadline, clock.now_nanos()), 0);
    }

    #[test]
    fn remaining_rounds_up() {
        assert_eq!(remaining_timeout_ms(10 * NANOS_PER_MILLI, 0), 10);
        assert_eq!(remaining_timeout_ms(10 * NANOS_PER_MILLI, 1), 10);
        assert_eq!(remaining_timeout_ms(10 * NANOS_PER_MILLI + 1, 0), 11);
        assert_eq!(remaining_timeout_ms(5, 10), 0);
        assert_eq!(remaining_timeout_ms(u64::MAX - 1, 0), u32::MAX);
    }

    #[test]
    fn fuzz_deadline_from_timeout() {
        bolero::check!()
            .with_type::<(u64, u32)>()
            .for_each(|(now, timeout_ms)| {
                let clock = SimulatedClock::starting_at(*now);
                let deadline = deadline_from_timeout(&clock, *timeout_ms);
                if *timeout_ms == 0 {
                    assert_eq!(deadline, NONBLOCKING);
                } else {
                    assert_ne!(deadline, WAIT_INDEFINITELY);
                    assert!(deadline >= (*now).min(WAIT_INDEFINITELY - 1));
                    // The remaining window never exceeds the requested budget.
                    assert!(remaining_timeout_ms(deadline, *now) <= *timeout_ms);
                }
            });
    }
}
