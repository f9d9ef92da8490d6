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


use std::io;
use std::time::Duration;

use crate::native::{NativePoll, Outcome, PollFd, Timeout};

/// Native multiplexer backed by [`popol`] library.
///
/// A fresh set of `popol` sources keyed by list position is built on every call. Unlike
/// [`crate::native::SysPoller`], an empty list returns immediately instead of sleeping for the
/// timeout.
///
/// `popol` restarts a poll interrupted by a signal on its own, so a wait running on this poller
/// never fails with [`crate::Error::Interrupted`]. Use [`crate::native::SysPoller`] when signal
/// delivery must wake the waiter.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Poller;

impl Poller {
    pub fn new() -> Self { Poller }
}

impl NativePoll for Poller {
    fn poll(&self, fds: &mut [PollFd], timeout: Timeout) -> io::Result<usize> {
        let mut sources = popol::Sources::with_capacity(fds.len());
        for (pos, pfd) in fds.iter().enumerate() {
            let mut interest = popol::interest::NONE;
            if pfd.interest.read {
                interest |= popol::interest::READ;
            }
            if pfd.interest.write {
                interest |= popol::interest::WRITE;
            }
            sources.register(pos, &pfd.fd, interest);
        }
        for pfd in fds.iter_mut() {
            pfd.outcome = Outcome::NONE;
        }

        #[cfg(feature = "log")]
        log::trace!(target: "popol", "Polling {} descriptor(s) with timeout {timeout}", fds.len());

        let mut fired = Vec::with_capacity(fds.len());
        // Blocking call
        match sources.poll(&mut fired, popol_timeout(timeout)) {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::TimedOut => {
                #[cfg(feature = "log")]
                log::trace!(target: "popol", "Poll timed out with zero events generated");
                return Ok(0);
            }
            Err(err) => return Err(err),
        }

        let mut ready = 0;
        for event in fired {
            let mut outcome = Outcome::NONE;
            if event.is_readable() {
                outcome |= Outcome::READ;
            }
            if event.is_writable() {
                outcome |= Outcome::WRITE;
            }
            if event.is_hangup() {
                outcome |= Outcome::HANGUP;
            }
            if event.is_error() {
                outcome |= Outcome::ERROR;
            }
            if event.is_invalid() {
                outcome |= Outcome::INVALID;
            }
            if let Some(pfd) = fds.get_mut(event.key) {
                #[cfg(feature = "log")]
                log::trace!(target: "popol", "Got outcome {outcome} for {}", pfd.fd);
                pfd.outcome = outcome;
                ready += 1;
            }
        }
        Ok(ready)
    }
}

/// Converts the timeout into the one `popol` takes, rounded and clamped the same way as for the
/// `poll` system call, since `popol` narrows milliseconds to `c_int` without a bound check.
fn popol_timeout(timeout: Timeout) -> popol::Timeout {
    match timeout.as_poll_millis() {
        ms if ms < 0 => popol::Timeout::Never,
        ms => popol::Timeout::After(Duration::from_millis(ms as u64)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::sync::Arc;

    use super::*;
    use crate::{Ctl, Events, ReadySet, Registry};

    #[test]
    fn readable_by_position() {
        let (mut a, b) = UnixStream::pair().unwrap();
        let (_c, d) = UnixStream::pair().unwrap();
        let mut fds = [
            PollFd::new(d.as_raw_fd(), Events::readable()),
            PollFd::new(b.as_raw_fd(), Events::readable()),
        ];
        a.write_all(b"ping").unwrap();
        assert_eq!(Poller.poll(&mut fds, Timeout::from_millis(1000)).unwrap(), 1);
        assert!(fds[0].outcome.is_none());
        assert!(fds[1].outcome.is_readable());
    }

    #[test]
    fn times_out() {
        let (_a, b) = UnixStream::pair().unwrap();
        let mut fds = [PollFd::new(b.as_raw_fd(), Events::readable())];
        assert_eq!(Poller.poll(&mut fds, Timeout::from_millis(10)).unwrap(), 0);
        assert!(fds[0].outcome.is_none());
    }

    #[test]
    fn hangup_and_invalid() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut fds = [
            PollFd::new(b.as_raw_fd(), Events::readable()),
            PollFd::new(999_999, Events::readable()),
        ];
        drop(a);
        assert_eq!(Poller.poll(&mut fds, Timeout::from_millis(1000)).unwrap(), 2);
        assert!(fds[0].outcome.has_hangup());
        assert!(fds[1].outcome.is_invalid());
        assert!(!fds[1].outcome.is_readable());
    }

    #[test]
    fn timeout_clamped() {
        assert!(matches!(
            popol_timeout(Timeout::After(Duration::from_micros(10))),
            popol::Timeout::After(span) if span == Duration::from_millis(1)
        ));
        assert!(matches!(
            popol_timeout(Timeout::After(Duration::from_secs(u64::MAX))),
            popol::Timeout::After(span) if span == Duration::from_millis(libc::c_int::MAX as u64)
        ));
        assert!(matches!(
            popol_timeout(Timeout::immediate()),
            popol::Timeout::After(span) if span.is_zero()
        ));
        assert!(matches!(popol_timeout(Timeout::Never), popol::Timeout::Never));
    }

    #[test]
    fn readyset_level_triggered() {
        let rs = ReadySet::with(Arc::new(Registry::default()), Poller);
        let id = rs.create().unwrap();
        let (mut a, b) = UnixStream::pair().unwrap();
        rs.control(id, Ctl::Add(b.as_raw_fd(), Events::readable())).unwrap();

        let mut events = vec![];
        assert_eq!(rs.wait(id, &mut events, 16, Timeout::from_millis(10)).unwrap(), 0);

        a.write_all(b"ping").unwrap();
        for _ in 0..2 {
            assert_eq!(rs.wait(id, &mut events, 16, Timeout::from_millis(1000)).unwrap(), 1);
            assert_eq!(events[0].fd, b.as_raw_fd());
            assert_eq!(events[0].events, Events::readable());
        }

        drop(a);
        assert_eq!(rs.wait(id, &mut events, 16, Timeout::from_millis(1000)).unwrap(), 1);
        assert!(events[0].events.is_hangup());
        assert!(rs.watch_list(id).unwrap().is_empty());
    }
}
