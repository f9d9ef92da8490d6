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


//! Ready-set instance lifecycle API: create, control, wait and close notification.

#![allow(unused_variables)] // because we need them for feature-gated logger

use std::os::unix::io::{IntoRawFd, OwnedFd, RawFd};
use std::sync::Arc;

use crate::native::{NativePoll, PollFd, SysPoller, Timeout};
use crate::translate::translate;
use crate::{Error, Events, HangupPolicy, InstanceHandle, ReadyEvent, Registry, WatchList};

/// Control operation on the watch list of a ready-set instance.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum Ctl {
    /// Start watching a descriptor for the given interest.
    #[display("add({0}, {1})")]
    Add(RawFd, Events),

    /// Replace interest of an already watched descriptor.
    #[display("modify({0}, {1})")]
    Modify(RawFd, Events),

    /// Stop watching a descriptor. Deleting a descriptor which is not watched is a no-op.
    #[display("delete({0})")]
    Delete(RawFd),
}

impl Ctl {
    pub fn fd(self) -> RawFd {
        match self {
            Ctl::Add(fd, _) | Ctl::Modify(fd, _) | Ctl::Delete(fd) => fd,
        }
    }
}

/// Descriptor-keyed readiness multiplexer emulated on top of a [`NativePoll`] primitive.
///
/// The ready-set is a passive object: it doesn't run threads of its own and may be shared between
/// any number of caller threads, which can concurrently control and wait on the same or different
/// instances.
///
/// Instances are allocated from the [`Registry`] provided at construction; several ready-sets
/// (for instance, with different native backends) may share one registry.
#[derive(Debug)]
pub struct ReadySet<P: NativePoll = SysPoller> {
    registry: Arc<Registry>,
    poller: P,
}

impl Default for ReadySet<SysPoller> {
    fn default() -> Self { ReadySet::new() }
}

impl ReadySet<SysPoller> {
    /// Creates ready-set calling `poll` system call directly and using the process-wide
    /// [`Registry::global`].
    pub fn new() -> Self { ReadySet::with(Registry::global(), SysPoller) }
}

impl<P: NativePoll> ReadySet<P> {
    /// Creates ready-set using provided registry and native multiplexer.
    pub fn with(registry: Arc<Registry>, poller: P) -> Self { ReadySet { registry, poller } }

    pub fn registry(&self) -> &Arc<Registry> { &self.registry }

    pub fn poller(&self) -> &P { &self.poller }

    /// Creates a new ready-set instance with an empty watch list.
    ///
    /// # Error
    ///
    /// Errors with [`Error::InstanceLimitExceeded`] when the registry is exhausted and with
    /// [`Error::ResourceInit`] when the instance can't be allocated.
    pub fn create(&self) -> Result<InstanceHandle, Error> { self.registry.create_instance() }

    /// Provides access to the watch list of an instance.
    pub fn watch_list(&self, instance: InstanceHandle) -> Result<Arc<WatchList>, Error> {
        self.registry.get(instance)
    }

    /// Applies a control operation to the watch list of an instance.
    ///
    /// # Error
    ///
    /// - [`Error::UnknownInstance`] if the instance handle is not known to the registry;
    /// - [`Error::InvalidDescriptor`] for negative descriptor values;
    /// - [`Error::AlreadyWatched`] or [`Error::CapacityExceeded`] for [`Ctl::Add`];
    /// - [`Error::NotWatched`] for [`Ctl::Modify`] of a descriptor which is not watched.
    pub fn control(&self, instance: InstanceHandle, ctl: Ctl) -> Result<(), Error> {
        let list = self.registry.get(instance)?;
        if ctl.fd() < 0 {
            return Err(Error::InvalidDescriptor(ctl.fd()));
        }

        #[cfg(feature = "log")]
        log::trace!(target: "readyset", "Instance {instance}: {ctl}");

        match ctl {
            Ctl::Add(fd, interest) => list.add(fd, interest),
            Ctl::Modify(fd, interest) => list.modify(fd, interest),
            Ctl::Delete(fd) => {
                if !list.remove(fd) {
                    #[cfg(feature = "log")]
                    log::debug!(target: "readyset", "Instance {instance} does not watch {fd}");
                }
                Ok(())
            }
        }
    }

    /// Waits for readiness of the descriptors watched by an instance.
    ///
    /// Ready descriptors are written into `events`, replacing its previous content, in the order
    /// of the instance watch list, at most `max_results` of them. Delivery is level-triggered: a
    /// descriptor is reported on every wait for as long as its condition holds.
    ///
    /// Descriptors reported with [`Events::hangup`] are removed from the watch list when the
    /// registry is configured with [`HangupPolicy::AutoRemove`]. Only the registration the wait
    /// has polled is removed: if the descriptor was deleted and added again while the wait was
    /// blocked, the new registration stays.
    ///
    /// # Blocking
    ///
    /// Blocks for up to `timeout`. The watch list is snapshotted before blocking and its lock is not
    /// held while blocked, so the instance may be concurrently controlled from other threads;
    /// such changes are seen by the next wait.
    ///
    /// # Returns
    ///
    /// Number of ready descriptors written into `events`; zero if the timeout has elapsed.
    ///
    /// # Error
    ///
    /// Errors with [`Error::Interrupted`] if the native wait was interrupted by a signal and with
    /// [`Error::Native`] on other native failures; neither is retried. Whether a signal interrupts
    /// the wait depends on the poller: [`SysPoller`] reports it, while the `popol` backend
    /// restarts the poll.
    pub fn wait(
        &self,
        instance: InstanceHandle,
        events: &mut Vec<ReadyEvent>,
        max_results: usize,
        timeout: impl Into<Timeout>,
    ) -> Result<usize, Error> {
        events.clear();
        if max_results == 0 {
            return Err(Error::ZeroMaxResults);
        }
        let list = self.registry.get(instance)?;
        let timeout = timeout.into();

        let mut fds = list.snapshot_for_wait().iter().map(PollFd::from).collect::<Vec<_>>();

        #[cfg(feature = "log")]
        log::trace!(target: "readyset",
            "Instance {instance} waits on {} descriptor(s) with timeout {timeout}", fds.len()
        );

        // Blocking call
        let ready = self.poller.poll(&mut fds, timeout)?;
        if ready == 0 {
            #[cfg(feature = "log")]
            log::trace!(target: "readyset", "Instance {instance} wait timed out");
            return Ok(0);
        }

        let auto_remove = self.registry.config().hangup == HangupPolicy::AutoRemove;
        let mut hung_up = Vec::new();
        for pfd in fds.iter().filter(|pfd| !pfd.outcome.is_none()) {
            if events.len() == max_results {
                break;
            }
            let fired = translate(pfd.outcome, pfd.interest);
            if fired.is_none() {
                continue;
            }

            #[cfg(feature = "log")]
            log::trace!(target: "readyset", "Descriptor {} is ready for `{fired}` (native {})",
                pfd.fd, pfd.outcome
            );

            if fired.hangup && auto_remove {
                hung_up.push((pfd.fd, pfd.generation));
            }
            events.push(ReadyEvent {
                fd: pfd.fd,
                events: fired,
            });
        }

        if !hung_up.is_empty() {
            let removed = list.remove_registrations(&hung_up);
            #[cfg(feature = "log")]
            log::debug!(target: "readyset",
                "Instance {instance} removed {removed} hung up descriptor(s) {hung_up:?}"
            );
        }

        Ok(events.len())
    }

    /// Notifies the ready-set that a descriptor was closed outside of it, purging the descriptor
    /// from every instance of the registry.
    pub fn notify_closed(&self, fd: RawFd) {
        let purged = self.registry.purge_descriptor_everywhere(fd);
        #[cfg(feature = "log")]
        log::trace!(target: "readyset", "Closed descriptor {fd} was watched by {purged} instance(s)");
    }

    /// Purges the descriptor from every instance and then closes it.
    ///
    /// The purge happens first, so by the time the descriptor number may be reused by the system no
    /// instance refers to it.
    pub fn close(&self, fd: OwnedFd) -> Result<(), Error> {
        let fd = fd.into_raw_fd();
        self.notify_closed(fd);
        if unsafe { libc::close(fd) } < 0 {
            return Err(Error::Native(std::io::Error::last_os_error()));
        }
        Ok(())
    }
}
