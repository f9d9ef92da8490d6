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


//! Translation of native outcomes into the ready-set event vocabulary.

use crate::native::Outcome;
use crate::Events;

/// Maps native outcome of a watched descriptor to the events reported to the caller.
///
/// Read and write readiness are reported only when they are part of the `interest` mask. Native
/// hang-up, error and invalid-descriptor conditions all map to [`Events::hangup`] and are reported
/// regardless of the interest: each of them means the descriptor can't be usefully waited on
/// anymore.
pub fn translate(outcome: Outcome, interest: Events) -> Events {
    Events {
        read: interest.read && outcome.is_readable(),
        write: interest.write && outcome.is_writable(),
        hangup: outcome.has_hangup() || outcome.is_err() || outcome.is_invalid(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness() {
        let all = Events::read_write();
        assert_eq!(translate(Outcome::READ, all), Events::readable());
        assert_eq!(translate(Outcome::PRIORITY, all), Events::readable());
        assert_eq!(translate(Outcome::WRITE, all), Events::writable());
        assert_eq!(translate(Outcome::READ | Outcome::WRITE, all), Events::read_write());
        assert_eq!(translate(Outcome::NONE, all), Events::none());
    }

    #[test]
    fn masked_by_interest() {
        assert_eq!(translate(Outcome::READ | Outcome::WRITE, Events::writable()), Events::writable());
        assert!(translate(Outcome::READ, Events::hangup()).is_none());
    }

    #[test]
    fn hangup_always_reported() {
        for outcome in [Outcome::HANGUP, Outcome::ERROR, Outcome::INVALID] {
            assert_eq!(translate(outcome, Events::none()), Events::hangup());
        }
        assert_eq!(
            translate(Outcome::READ | Outcome::HANGUP, Events::readable()),
            Events::readable() | Events::hangup()
        );
    }
}
