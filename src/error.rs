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
use std::os::unix::io::RawFd;

use crate::InstanceHandle;

/// Errors of the ready-set operations.
///
/// No operation retries on any of these errors; the retry policy belongs to the caller.
#[derive(Debug, Display, Error)]
#[display(doc_comments)]
pub enum Error {
    /// watch list of instance {0} is full ({1} descriptors).
    CapacityExceeded(InstanceHandle, usize),

    /// descriptor {0} is already watched by the instance.
    AlreadyWatched(RawFd),

    /// descriptor {0} is not watched by the instance.
    NotWatched(RawFd),

    /// all {0} ready-set instances are already allocated.
    InstanceLimitExceeded(usize),

    /// ready-set instance {0} is not known to the registry.
    UnknownInstance(InstanceHandle),

    /// {0} is not a valid file descriptor.
    InvalidDescriptor(RawFd),

    /// maximum number of wait results must be greater than zero.
    ZeroMaxResults,

    /// native readiness wait was interrupted by a signal.
    Interrupted,

    /// native readiness primitive has failed. Details: {0}
    Native(io::Error),

    /// unable to allocate resources for a new ready-set instance.
    ResourceInit,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::Interrupted => Error::Interrupted,
            _ => Error::Native(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interruption_is_distinct() {
        let err = Error::from(io::Error::from(io::ErrorKind::Interrupted));
        assert!(matches!(err, Error::Interrupted));

        let err = Error::from(io::Error::from_raw_os_error(libc::EBADF));
        assert!(matches!(err, Error::Native(ref e) if e.raw_os_error() == Some(libc::EBADF)));
    }

    #[test]
    fn display() {
        assert!(Error::AlreadyWatched(5).to_string().contains("descriptor 5 is already watched"));
        assert!(Error::CapacityExceeded(InstanceHandle::from(2), 16)
            .to_string()
            .contains("instance 2 is full (16 descriptors)"));
    }
}
