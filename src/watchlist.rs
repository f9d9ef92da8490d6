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


//! Per-instance watch table.
//!
//! The table is an ordered sequence of `(descriptor, interest)` entries. Entry order is part of the
//! contract: entries are appended on [`WatchList::add`], [`WatchList::modify`] updates an entry in
//! place and removal shifts the survivors down, preserving their relative order. Waits report ready
//! descriptors in table order.
//!
//! Each registration is tagged with a generation taken from a per-table counter bumped on every
//! add. A wait removing hung up descriptors matches on both descriptor and generation, so it never
//! removes a registration made after its snapshot was taken.

use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{Error, Events, InstanceHandle};

/// Descriptor registered for readiness notification together with its interest mask.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct WatchEntry {
    pub fd: RawFd,
    pub interest: Events,
    /// Registration generation; unique within the watch list, kept by [`WatchList::modify`].
    pub generation: u64,
}

/// Bounded, mutex-guarded table of watched descriptors owned by a single ready-set instance.
///
/// No two entries share a descriptor, and the table never holds more than [`Self::capacity`]
/// entries. Every read or mutation of the table happens under its lock; the lock is never held
/// by the table across a blocking call.
#[derive(Debug)]
pub struct WatchList {
    id: InstanceHandle,
    capacity: usize,
    entries: Mutex<Vec<WatchEntry>>,
    generation: AtomicU64,
}

impl WatchList {
    /// Allocates an empty watch list able to hold up to `capacity` descriptors.
    ///
    /// # Error
    ///
    /// Errors with [`Error::ResourceInit`] if the table storage can't be allocated.
    pub(crate) fn with_capacity(id: InstanceHandle, capacity: usize) -> Result<Self, Error> {
        let mut entries = Vec::new();
        entries.try_reserve_exact(capacity).map_err(|_| Error::ResourceInit)?;
        Ok(WatchList {
            id,
            capacity,
            entries: Mutex::new(entries),
            generation: AtomicU64::new(0),
        })
    }

    /// Handle of the instance owning this watch list.
    pub fn id(&self) -> InstanceHandle { self.id }

    /// Maximum number of descriptors the watch list can hold.
    pub fn capacity(&self) -> usize { self.capacity }

    pub fn len(&self) -> usize { self.lock().len() }

    pub fn is_empty(&self) -> bool { self.lock().is_empty() }

    pub fn contains(&self, fd: RawFd) -> bool { self.lock().iter().any(|entry| entry.fd == fd) }

    /// Returns interest mask registered for the descriptor, if it is watched.
    pub fn interest(&self, fd: RawFd) -> Option<Events> {
        self.lock().iter().find(|entry| entry.fd == fd).map(|entry| entry.interest)
    }

    /// Starts watching a descriptor.
    ///
    /// Capacity and duplicate checks and the insertion happen under a single lock acquisition.
    ///
    /// # Error
    ///
    /// Errors with [`Error::CapacityExceeded`] if the watch list is full and with
    /// [`Error::AlreadyWatched`] if the descriptor is already present. The table is left unchanged
    /// in both cases.
    pub fn add(&self, fd: RawFd, interest: Events) -> Result<(), Error> {
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            #[cfg(feature = "log")]
            log::warn!(target: "watchlist", "Instance {} is full, rejecting descriptor {fd}", self.id);
            return Err(Error::CapacityExceeded(self.id, self.capacity));
        }
        if entries.iter().any(|entry| entry.fd == fd) {
            return Err(Error::AlreadyWatched(fd));
        }

        #[cfg(feature = "log")]
        log::trace!(target: "watchlist", "Instance {} starts watching {fd} for `{interest}`", self.id);

        // Bumped under the table lock, so generations follow insertion order
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        entries.push(WatchEntry {
            fd,
            interest,
            generation,
        });
        Ok(())
    }

    /// Replaces interest mask of an already watched descriptor without changing its position.
    ///
    /// # Error
    ///
    /// Errors with [`Error::NotWatched`] if the descriptor is absent.
    pub fn modify(&self, fd: RawFd, interest: Events) -> Result<(), Error> {
        let mut entries = self.lock();
        let entry = entries.iter_mut().find(|entry| entry.fd == fd).ok_or(Error::NotWatched(fd))?;

        #[cfg(feature = "log")]
        log::trace!(target: "watchlist",
            "Instance {} changes interest on {fd} from `{}` to `{interest}`", self.id, entry.interest
        );

        entry.interest = interest;
        Ok(())
    }

    /// Stops watching a descriptor.
    ///
    /// A missing descriptor is a normal outcome: removal may race with a purge or with an
    /// automatic hang-up removal. Calling it again for the same descriptor is a no-op.
    ///
    /// # Returns
    ///
    /// Whether the descriptor was present.
    pub fn remove(&self, fd: RawFd) -> bool {
        let mut entries = self.lock();
        Self::remove_locked(&mut entries, fd)
    }

    /// Removes the given `(descriptor, generation)` registrations under a single lock acquisition.
    /// A descriptor which was removed and added again since has a newer generation and is kept.
    ///
    /// # Returns
    ///
    /// Number of registrations which were present and got removed.
    pub(crate) fn remove_registrations(&self, registrations: &[(RawFd, u64)]) -> usize {
        let mut entries = self.lock();
        registrations
            .iter()
            .filter(|(fd, generation)| {
                let Some(pos) = entries
                    .iter()
                    .position(|entry| entry.fd == *fd && entry.generation == *generation)
                else {
                    return false;
                };
                entries.remove(pos);
                true
            })
            .count()
    }

    /// Copies the live entries which are to be handed to the native multiplexer.
    ///
    /// The copy is taken under the lock, so it is consistent with respect to concurrent mutations;
    /// mutations which happen after it was taken are visible only to the next snapshot.
    pub fn snapshot_for_wait(&self) -> Vec<WatchEntry> { self.lock().clone() }

    fn remove_locked(entries: &mut Vec<WatchEntry>, fd: RawFd) -> bool {
        let Some(pos) = entries.iter().position(|entry| entry.fd == fd) else {
            return false;
        };
        // Shifts the tail, keeping survivors in their original order
        entries.remove(pos);
        true
    }

    // All mutations are single-step operations on the vector, so a panic in another thread can't
    // leave the table in an inconsistent state and poisoning is safe to ignore.
    fn lock(&self) -> MutexGuard<'_, Vec<WatchEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
