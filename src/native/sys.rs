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

use crate::native::{request_bits, NativePoll, Outcome, PollFd, Timeout};

/// Native multiplexer calling the `poll` system call directly.
///
/// The list of `pollfd` structures is rebuilt from the given positions on every call.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct SysPoller;

impl SysPoller {
    pub fn new() -> Self { SysPoller }
}

impl NativePoll for SysPoller {
    fn poll(&self, fds: &mut [PollFd], timeout: Timeout) -> io::Result<usize> {
        let mut list = fds
            .iter()
            .map(|pfd| libc::pollfd {
                fd: pfd.fd,
                events: request_bits(pfd.interest),
                revents: 0,
            })
            .collect::<Vec<_>>();

        #[cfg(feature = "log")]
        log::trace!(target: "poll", "Polling {} descriptor(s) with timeout {timeout}", list.len());

        // Blocking call
        let res = unsafe {
            libc::poll(list.as_mut_ptr(), list.len() as libc::nfds_t, timeout.as_poll_millis())
        };
        if res < 0 {
            let err = io::Error::last_os_error();
            #[cfg(feature = "log")]
            log::trace!(target: "poll", "Poll has failed: {err}");
            return Err(err);
        }

        for (pfd, native) in fds.iter_mut().zip(&list) {
            pfd.outcome = Outcome::from_raw(native.revents);
        }

        #[cfg(feature = "log")]
        log::trace!(target: "poll", "Poll resulted in {res} ready descriptor(s)");

        Ok(res as usize)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::Events;

    #[test]
    fn readable_and_writable() {
        let (mut a, b) = UnixStream::pair().unwrap();
        let mut fds = [
            PollFd::new(b.as_raw_fd(), Events::readable()),
            PollFd::new(a.as_raw_fd(), Events::writable()),
        ];
        assert_eq!(SysPoller.poll(&mut fds, Timeout::immediate()).unwrap(), 1);
        assert!(fds[0].outcome.is_none());
        assert!(fds[1].outcome.is_writable());

        a.write_all(b"ping").unwrap();
        assert_eq!(SysPoller.poll(&mut fds, Timeout::immediate()).unwrap(), 2);
        assert!(fds[0].outcome.is_readable());
    }

    #[test]
    fn times_out() {
        let (_a, b) = UnixStream::pair().unwrap();
        let mut fds = [PollFd::new(b.as_raw_fd(), Events::readable())];
        let start = Instant::now();
        assert_eq!(SysPoller.poll(&mut fds, Duration::from_millis(50).into()).unwrap(), 0);
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert!(fds[0].outcome.is_none());
    }

    #[test]
    fn hangup() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut fds = [PollFd::new(b.as_raw_fd(), Events::readable())];
        drop(a);
        assert_eq!(SysPoller.poll(&mut fds, Timeout::immediate()).unwrap(), 1);
        assert!(fds[0].outcome.has_hangup());
    }
}
