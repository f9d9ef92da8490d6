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


#![deny(
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case,
    unused_mut,
    unused_imports,
    dead_code,
    //missing_docs
)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Descriptor-keyed, event-driven readiness multiplexer ([`ReadySet`]) emulated on top of a
//! simpler, array-based, level-triggered readiness primitive ([`native::NativePoll`], `poll`
//! system call by default) which must be handed the whole watch list on each call.
//!
//! A caller creates instances, registers, modifies and removes interest in file descriptors for
//! each of them with [`ReadySet::control`] and blocks in [`ReadySet::wait`] until some become
//! ready. Each instance keeps a bounded [`WatchList`]; all instances are kept in a [`Registry`],
//! so a descriptor closed outside the ready-set can be purged from every instance with
//! [`ReadySet::notify_closed`].
//!
//! Delivery is level-triggered: a descriptor is reported on every wait for as long as its
//! condition holds. Descriptors reported as hung up are removed from the instance automatically,
//! unless the registry is configured with [`HangupPolicy::Retain`].
//!
//! All ready-set objects are passive and thread-safe: they may be called from any number of
//! threads, on the same or different instances.

#[macro_use]
extern crate amplify;

mod config;
mod error;
mod events;
pub mod native;
pub mod os;
mod readyset;
mod registry;
pub mod translate;
mod watchlist;

pub use config::{Config, HangupPolicy, MAX_INSTANCES, MAX_ITEMS_PER_INSTANCE};
pub use error::Error;
pub use events::{Events, Io, ReadyEvent};
pub use native::{NativePoll, Timeout};
pub use readyset::{Ctl, ReadySet};
pub use registry::{InstanceHandle, Registry};
pub use watchlist::{WatchEntry, WatchList};
