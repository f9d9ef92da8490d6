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

use std::fmt::{self, Display, Formatter};
use std::ops;
use std::os::unix::io::RawFd;

/// Single kind of readiness which may be reported for a descriptor.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Io {
    Read,
    Write,
    HangUp,
}

/// Set of readiness kinds. Used both as an interest mask registered for a descriptor and as the
/// set of events reported by a wait.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub struct Events {
    /// Descriptor has data to read.
    pub read: bool,
    /// Descriptor is ready for write operations.
    pub write: bool,
    /// Peer has hung up, or the descriptor is in an error state.
    ///
    /// Hang-ups are always reported by the native multiplexer, whether they were part of the
    /// interest mask or not.
    pub hangup: bool,
}

impl Events {
    pub const fn none() -> Self {
        Self {
            read: false,
            write: false,
            hangup: false,
        }
    }

    pub const fn readable() -> Self {
        Self {
            read: true,
            write: false,
            hangup: false,
        }
    }

    pub const fn writable() -> Self {
        Self {
            read: false,
            write: true,
            hangup: false,
        }
    }

    pub const fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            hangup: false,
        }
    }

    pub const fn hangup() -> Self {
        Self {
            read: false,
            write: false,
            hangup: true,
        }
    }

    pub fn is_none(self) -> bool { !self.read && !self.write && !self.hangup }
    pub fn is_readable(self) -> bool { self.read }
    pub fn is_writable(self) -> bool { self.write }
    pub fn is_hangup(self) -> bool { self.hangup }

    /// Checks whether all kinds from `other` are present in `self`.
    pub fn contains(self, other: Events) -> bool { (self & other) == other }
}

impl ops::BitOr for Events {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self {
            read: self.read || rhs.read,
            write: self.write || rhs.write,
            hangup: self.hangup || rhs.hangup,
        }
    }
}

impl ops::BitOrAssign for Events {
    fn bitor_assign(&mut self, rhs: Self) { *self = *self | rhs }
}

impl ops::BitAnd for Events {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self {
            read: self.read && rhs.read,
            write: self.write && rhs.write,
            hangup: self.hangup && rhs.hangup,
        }
    }
}

impl From<Io> for Events {
    fn from(io: Io) -> Self {
        match io {
            Io::Read => Events::readable(),
            Io::Write => Events::writable(),
            Io::HangUp => Events::hangup(),
        }
    }
}

impl Iterator for Events {
    type Item = Io;

    fn next(&mut self) -> Option<Self::Item> {
        if self.hangup {
            self.hangup = false;
            Some(Io::HangUp)
        } else if self.write {
            self.write = false;
            Some(Io::Write)
        } else if self.read {
            self.read = false;
            Some(Io::Read)
        } else {
            None
        }
    }
}

impl Display for Events {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("none");
        }
        let mut sep = "";
        for (set, name) in [(self.read, "read"), (self.write, "write"), (self.hangup, "hangup")] {
            if set {
                write!(f, "{sep}{name}")?;
                sep = "|";
            }
        }
        Ok(())
    }
}

/// Descriptor reported ready by a wait, together with the readiness kinds it was reported for.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ReadyEvent {
    pub fd: RawFd,
    pub events: Events,
}

impl Display for ReadyEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { write!(f, "{}: {}", self.fd, self.events) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Events::none().to_string(), "none");
        assert_eq!(Events::readable().to_string(), "read");
        assert_eq!((Events::read_write() | Events::hangup()).to_string(), "read|write|hangup");
        assert_eq!((Events::writable() | Events::hangup()).to_string(), "write|hangup");
    }

    #[test]
    fn combine() {
        let ev = Events::readable() | Events::hangup();
        assert!(ev.contains(Events::readable()));
        assert!(ev.contains(Events::hangup()));
        assert!(!ev.contains(Events::writable()));
        assert_eq!(ev & Events::read_write(), Events::readable());

        let mut ev = Events::none();
        ev |= Io::Write.into();
        assert_eq!(ev, Events::writable());
    }

    #[test]
    fn iterate() {
        let kinds = (Events::read_write() | Events::hangup()).collect::<Vec<_>>();
        assert_eq!(kinds, vec![Io::HangUp, Io::Write, Io::Read]);
        assert_eq!(Events::none().count(), 0);
    }
}
