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


//! Platform services the ready-set runtime relies on besides the readiness primitive.

use std::io;
use std::time::Duration;

/// Blocking sleep on a native timed-wait facility.
pub trait TimedSleep {
    /// Blocks the calling thread for `span`.
    ///
    /// # Returns
    ///
    /// Time left to sleep if the wait was interrupted early, zero otherwise.
    fn sleep(&self, span: Duration) -> io::Result<Duration>;
}

/// [`TimedSleep`] implementation using `nanosleep`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Nanosleep;

impl TimedSleep for Nanosleep {
    fn sleep(&self, span: Duration) -> io::Result<Duration> {
        let req = libc::timespec {
            tv_sec: libc::time_t::try_from(span.as_secs()).unwrap_or(libc::time_t::MAX),
            tv_nsec: span.subsec_nanos() as libc::c_long,
        };
        let mut rem = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        if unsafe { libc::nanosleep(&req, &mut rem) } == 0 {
            return Ok(Duration::ZERO);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
        Ok(Duration::new(rem.tv_sec.max(0) as u64, rem.tv_nsec.max(0) as u32))
    }
}

/// Lookup of the executable path of a process.
pub trait ExePath {
    /// Writes NUL-terminated executable path of process `pid` into `buf`.
    ///
    /// # Returns
    ///
    /// Path length, not counting the terminating NUL.
    ///
    /// # Error
    ///
    /// Errors with `ENAMETOOLONG` if the path and its terminator don't fit into `buf`.
    fn exe_path(&self, pid: libc::pid_t, buf: &mut [u8]) -> io::Result<usize>;
}

/// [`ExePath`] implementation reading the `/proc` filesystem.
#[cfg(any(target_os = "linux", target_os = "android"))]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct ProcFs;

#[cfg(any(target_os = "linux", target_os = "android"))]
impl ExePath for ProcFs {
    fn exe_path(&self, pid: libc::pid_t, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::unix::ffi::OsStrExt;

        let path = std::fs::read_link(format!("/proc/{pid}/exe"))?;
        let path = path.as_os_str().as_bytes();
        if path.len() >= buf.len() {
            return Err(io::Error::from_raw_os_error(libc::ENAMETOOLONG));
        }
        buf[..path.len()].copy_from_slice(path);
        buf[path.len()] = 0;
        Ok(path.len())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn sleep_full_span() {
        let start = Instant::now();
        assert_eq!(Nanosleep.sleep(Duration::from_millis(10)).unwrap(), Duration::ZERO);
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn own_exe_path() {
        use std::os::unix::ffi::OsStrExt;

        let pid = std::process::id() as libc::pid_t;
        let mut buf = [0u8; 4096];
        let len = ProcFs.exe_path(pid, &mut buf).unwrap();
        let exe = std::fs::read_link("/proc/self/exe").unwrap();
        assert_eq!(&buf[..len], exe.as_os_str().as_bytes());
        assert_eq!(buf[len], 0);

        let mut short = vec![0u8; len];
        let err = ProcFs.exe_path(pid, &mut short).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENAMETOOLONG));
    }
}
