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

//! Capacity bounds and behavioral policies of a [`crate::Registry`].
//!
//! All bounds are fixed at the moment the registry is constructed; neither the number of instances
//! nor the size of a watch list grows afterwards.

/// Default maximum number of ready-set instances a single registry may hold.
pub const MAX_INSTANCES: usize = 256;

/// Number of table slots in a watch list. One slot is reserved, so the usable capacity of a
/// watch list with the default configuration is `MAX_ITEMS_PER_INSTANCE - 1`.
pub const MAX_ITEMS_PER_INSTANCE: usize = 1024;

/// What a wait does with a descriptor for which the native layer reported a hang-up.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Display)]
pub enum HangupPolicy {
    /// Descriptor is removed from the watch list of the instance as a part of producing the wait
    /// result. Subsequent waits do not report it unless it is added again.
    #[default]
    #[display("auto-remove")]
    AutoRemove,

    /// Descriptor stays registered and keeps being reported on every wait until the caller
    /// removes it.
    #[display("retain")]
    Retain,
}

/// Configuration of a [`crate::Registry`] and of all instances it creates.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Config {
    /// Maximum number of instances.
    pub max_instances: usize,
    /// Maximum number of descriptors watched by a single instance.
    pub max_items: usize,
    /// What a wait does with descriptors reported as hung up.
    pub hangup: HangupPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_instances: MAX_INSTANCES,
            max_items: MAX_ITEMS_PER_INSTANCE - 1,
            hangup: HangupPolicy::AutoRemove,
        }
    }
}

impl Config {
    pub fn new() -> Self { Self::default() }

    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_hangup_policy(mut self, policy: HangupPolicy) -> Self {
        self.hangup = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::new();
        assert_eq!(config.max_instances, 256);
        assert_eq!(config.max_items, 1023);
        assert_eq!(config.hangup, HangupPolicy::AutoRemove);
        assert_eq!(config.hangup.to_string(), "auto-remove");
    }

    #[test]
    fn builder() {
        let config = Config::new()
            .with_max_instances(3)
            .with_max_items(8)
            .with_hangup_policy(HangupPolicy::Retain);
        assert_eq!(config.max_instances, 3);
        assert_eq!(config.max_items, 8);
        assert_eq!(config.hangup, HangupPolicy::Retain);
    }
}
