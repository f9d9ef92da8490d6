// Readiness multiplexer emulated on top of level-triggered poll.
//
// SPDX-License-Identifier: Apache-2.0
//
// Written in 2021-2025 by
//     Dr. Maxim Orlovsky <orlovsky@ubideco.org>
//     Alexis Sellier <alexis@cloudhead.io>
//
// Copyright 2022-2025 UBIDECO Labs, InDCS, Lugano, Switzerland. All Rights reserved.
// Copyright 2021-2023 Alexis Sellier <alexis@cloudhead.io>. All Rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except
// in compliance with the License. You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express
// or implied. See the License for the specific language governing permissions and limitations under
// the License.


//! Native level-triggered readiness multiplexer.
//!
//! The native primitive is array-based: it is handed the complete list of descriptors on every
//! call, blocks until at least one of them is ready or the timeout elapses, and reports an outcome
//! per list position. It keeps no state between calls.

#[cfg(feature = "popol")]
pub mod popol;
mod sys;

use std::fmt::{self, Display, Formatter};
use std::io;
use std::ops;
use std::os::unix::io::RawFd;
use std::time::Duration;

pub use sys::SysPoller;

use crate::{Events, WatchEntry};

/// Raw outcome bits reported by the native multiplexer for a single descriptor (`revents` of the
/// `poll` system call).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Outcome(libc::c_short);

impl Outcome {
    pub const NONE: Outcome = Outcome(0);
    pub const READ: Outcome = Outcome(libc::POLLIN);
    pub const PRIORITY: Outcome = Outcome(libc::POLLPRI);
    pub const WRITE: Outcome = Outcome(libc::POLLOUT);
    pub const HANGUP: Outcome = Outcome(libc::POLLHUP);
    pub const ERROR: Outcome = Outcome(libc::POLLERR);
    pub const INVALID: Outcome = Outcome(libc::POLLNVAL);

    pub fn from_raw(bits: libc::c_short) -> Self { Outcome(bits) }
    pub fn into_raw(self) -> libc::c_short { self.0 }

    pub fn is_none(self) -> bool { self.0 == 0 }
    pub fn is_readable(self) -> bool { self.0 & (libc::POLLIN | libc::POLLPRI) != 0 }
    pub fn is_writable(self) -> bool { self.0 & libc::POLLOUT != 0 }
    pub fn has_hangup(self) -> bool { self.0 & libc::POLLHUP != 0 }
    pub fn is_err(self) -> bool { self.0 & libc::POLLERR != 0 }
    pub fn is_invalid(self) -> bool { self.0 & libc::POLLNVAL != 0 }
}

impl ops::BitOr for Outcome {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output { Outcome(self.0 | rhs.0) }
}

impl ops::BitOrAssign for Outcome {
    fn bitor_assign(&mut self, rhs: Self) { self.0 |= rhs.0 }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { write!(f, "{:#b}", self.0) }
}

/// Native request bits for an interest mask.
///
/// Hang-up has no request bit: the native multiplexer reports it unconditionally.
pub(crate) fn request_bits(interest: Events) -> libc::c_short {
    let mut bits = 0;
    if interest.read {
        bits |= libc::POLLIN;
    }
    if interest.write {
        bits |= libc::POLLOUT;
    }
    bits
}

/// Single position of the list handed to the native multiplexer.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PollFd {
    pub fd: RawFd,
    pub interest: Events,
    /// Generation of the watch list registration this position was taken from.
    pub generation: u64,
    /// Filled by the native multiplexer; reset on each call.
    pub outcome: Outcome,
}

impl PollFd {
    pub fn new(fd: RawFd, interest: Events) -> Self {
        PollFd {
            fd,
            interest,
            generation: 0,
            outcome: Outcome::NONE,
        }
    }
}

impl From<&WatchEntry> for PollFd {
    fn from(entry: &WatchEntry) -> Self {
        PollFd {
            generation: entry.generation,
            ..PollFd::new(entry.fd, entry.interest)
        }
    }
}

/// How long a wait may block.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Timeout {
    /// Block for at most the given duration; zero duration polls without blocking.
    After(Duration),
    /// Block until a descriptor becomes ready or the wait is interrupted.
    Never,
}

impl Timeout {
    /// Non-blocking poll.
    pub fn immediate() -> Self { Timeout::After(Duration::ZERO) }

    /// Converts millisecond timeout in the convention of the `poll` system call: negative values
    /// mean blocking indefinitely.
    pub fn from_millis(millis: i32) -> Self {
        match u64::try_from(millis) {
            Ok(millis) => Timeout::After(Duration::from_millis(millis)),
            Err(_) => Timeout::Never,
        }
    }

    /// Millisecond value for the `poll` system call. Sub-millisecond timeouts are rounded up so
    /// that a non-zero timeout never turns into a busy poll.
    pub(crate) fn as_poll_millis(self) -> libc::c_int {
        match self {
            Timeout::Never => -1,
            Timeout::After(span) if span.is_zero() => 0,
            Timeout::After(span) => {
                let millis = span.as_millis().max(1);
                libc::c_int::try_from(millis).unwrap_or(libc::c_int::MAX)
            }
        }
    }
}

impl From<Duration> for Timeout {
    fn from(span: Duration) -> Self { Timeout::After(span) }
}

impl From<Option<Duration>> for Timeout {
    fn from(span: Option<Duration>) -> Self { span.map(Timeout::After).unwrap_or(Timeout::Never) }
}

impl Display for Timeout {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::After(span) => write!(f, "{span:?}"),
            Timeout::Never => f.write_str("never"),
        }
    }
}

/// Level-triggered "wait for readiness over a fixed list" primitive.
pub trait NativePoll: Send + Sync {
    /// Waits until at least one of `fds` is ready or `timeout` elapses, writing the outcome of
    /// each position into [`PollFd::outcome`].
    ///
    /// # Returns
    ///
    /// Number of positions with a non-empty outcome; zero on timeout.
    ///
    /// # Error
    ///
    /// Native failures are returned as-is. A poller reporting interruption by a signal does so
    /// with the [`io::ErrorKind::Interrupted`] kind; a poller which restarts interrupted calls
    /// itself must say so in its documentation.
    fn poll(&self, fds: &mut [PollFd], timeout: Timeout) -> io::Result<usize>;
}

/// Checks whether a descriptor is valid by polling it for read readiness without blocking.
///
/// Interrupted polls are retried.
pub fn check_fd(fd: RawFd) -> io::Result<bool> {
    let mut fds = [PollFd::new(fd, Events::readable())];
    loop {
        match SysPoller.poll(&mut fds, Timeout::immediate()) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
            Ok(_) => return Ok(!fds[0].outcome.is_invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn timeout_millis() {
        assert_eq!(Timeout::from_millis(-1), Timeout::Never);
        assert_eq!(Timeout::from_millis(0), Timeout::immediate());
        assert_eq!(Timeout::from_millis(1500), Timeout::After(Duration::from_millis(1500)));

        assert_eq!(Timeout::Never.as_poll_millis(), -1);
        assert_eq!(Timeout::immediate().as_poll_millis(), 0);
        assert_eq!(Timeout::from(Duration::from_micros(10)).as_poll_millis(), 1);
        assert_eq!(Timeout::from(Duration::from_secs(u64::MAX)).as_poll_millis(), libc::c_int::MAX);
        assert_eq!(Timeout::from(None), Timeout::Never);
    }

    #[test]
    fn outcome_bits() {
        let outcome = Outcome::READ | Outcome::HANGUP;
        assert!(outcome.is_readable());
        assert!(outcome.has_hangup());
        assert!(!outcome.is_writable());
        assert!(!outcome.is_err());
        assert!(Outcome::PRIORITY.is_readable());
        assert!(Outcome::default().is_none());
        assert_eq!(Outcome::from_raw(outcome.into_raw()), outcome);
    }

    #[test]
    fn request() {
        assert_eq!(request_bits(Events::none()), 0);
        assert_eq!(request_bits(Events::hangup()), 0);
        assert_eq!(request_bits(Events::read_write()), libc::POLLIN | libc::POLLOUT);
    }

    #[test]
    fn check_valid_and_unopened() {
        let (a, _b) = UnixStream::pair().unwrap();
        assert!(check_fd(a.as_raw_fd()).unwrap());
        // Never opened, well above any descriptor number a test process reaches
        assert!(!check_fd(999_999).unwrap());
    }
}
