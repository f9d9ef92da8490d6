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


//! Process-wide bookkeeping of ready-set instances.
//!
//! The registry allocates instances and makes each of them discoverable for the rest of the
//! registry lifetime, which is what allows a descriptor closed outside the ready-set API to be
//! purged from every instance still referencing it.

use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use amplify::Wrapper;

use crate::{Config, Error, WatchList};

/// Opaque handle to a ready-set instance.
///
/// A handle is a reference into the registry slot owning the instance watch list; it never
/// transfers ownership.
#[derive(Wrapper, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, From)]
#[wrapper(Display)]
pub struct InstanceHandle(usize);

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

/// Registry of all live ready-set instances.
///
/// Instance storage is initialized lazily, exactly once, on the first instance creation; threads
/// racing on the first use all observe the completed initialization.
///
/// # Locking
///
/// The registry lock is held only for instance creation, lookup and purge iteration. It is never
/// acquired while an instance lock is held; purge takes instance locks one at a time while holding
/// the registry lock.
#[derive(Debug)]
pub struct Registry {
    config: Config,
    instances: OnceLock<Mutex<Vec<Arc<WatchList>>>>,
}

impl Default for Registry {
    fn default() -> Self { Registry::new(Config::default()) }
}

impl Registry {
    /// Constructs registry with capacity bounds and policies fixed by `config`.
    pub const fn new(config: Config) -> Self {
        Registry {
            config,
            instances: OnceLock::new(),
        }
    }

    /// Registry shared by the whole process, using the default [`Config`].
    pub fn global() -> Arc<Registry> { GLOBAL.get_or_init(|| Arc::new(Registry::default())).clone() }

    pub fn config(&self) -> Config { self.config }

    /// Checks whether the instance storage was already initialized.
    pub fn is_initialized(&self) -> bool { self.instances.get().is_some() }

    /// Number of instances created so far.
    pub fn len(&self) -> usize {
        self.instances.get().map(|instances| Self::lock(instances).len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Allocates and registers a new instance with an empty watch list.
    ///
    /// # Error
    ///
    /// Errors with [`Error::InstanceLimitExceeded`] if the registry already holds
    /// [`Config::max_instances`] instances and with [`Error::ResourceInit`] if the instance storage
    /// can't be allocated.
    pub fn create_instance(&self) -> Result<InstanceHandle, Error> {
        let mut instances = Self::lock(self.instances());
        if instances.len() >= self.config.max_instances {
            #[cfg(feature = "log")]
            log::warn!(target: "registry",
                "Unable to create ready-set instance: all {} instances are in use",
                self.config.max_instances
            );
            return Err(Error::InstanceLimitExceeded(self.config.max_instances));
        }

        let id = InstanceHandle::from_inner(instances.len());
        let list = WatchList::with_capacity(id, self.config.max_items)?;
        instances.try_reserve(1).map_err(|_| Error::ResourceInit)?;
        instances.push(Arc::new(list));

        #[cfg(feature = "log")]
        log::debug!(target: "registry", "Created ready-set instance {id}");

        Ok(id)
    }

    /// Looks up the watch list of an instance.
    ///
    /// # Error
    ///
    /// Errors with [`Error::UnknownInstance`] if the handle was not issued by this registry.
    pub fn get(&self, id: InstanceHandle) -> Result<Arc<WatchList>, Error> {
        let Some(instances) = self.instances.get() else {
            return Err(Error::UnknownInstance(id));
        };
        Self::lock(instances).get(id.into_inner()).cloned().ok_or(Error::UnknownInstance(id))
    }

    /// Removes the descriptor from the watch list of every registered instance.
    ///
    /// Must be called whenever a watched descriptor gets closed, since the native multiplexer
    /// would otherwise be handed a stale descriptor on the next wait. Purging a descriptor no
    /// instance watches is a no-op.
    ///
    /// # Returns
    ///
    /// Number of instances the descriptor was removed from.
    pub fn purge_descriptor_everywhere(&self, fd: RawFd) -> usize {
        let Some(instances) = self.instances.get() else {
            return 0;
        };
        let purged = Self::lock(instances).iter().filter(|list| list.remove(fd)).count();

        #[cfg(feature = "log")]
        {
            if purged > 0 {
                log::debug!(target: "registry", "Descriptor {fd} purged from {purged} instance(s)");
            }
        }

        purged
    }

    fn instances(&self) -> &Mutex<Vec<Arc<WatchList>>> {
        self.instances.get_or_init(|| {
            #[cfg(feature = "log")]
            log::debug!(target: "registry",
                "Initializing ready-set registry for up to {} instances", self.config.max_instances
            );
            Mutex::new(empty!())
        })
    }

    // Instances are only ever appended, so a poisoned lock still guards a valid table.
    fn lock(instances: &Mutex<Vec<Arc<WatchList>>>) -> MutexGuard<'_, Vec<Arc<WatchList>>> {
        instances.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::thread;

    use super::*;
    use crate::Events;

    #[test]
    fn lazy_init() {
        let registry = Registry::default();
        assert!(!registry.is_initialized());
        assert!(registry.is_empty());
        assert_eq!(registry.purge_descriptor_everywhere(1), 0);
        assert!(matches!(registry.get(InstanceHandle::from(0)), Err(Error::UnknownInstance(_))));
        assert!(!registry.is_initialized());

        let id = registry.create_instance().unwrap();
        assert!(registry.is_initialized());
        assert_eq!(id, InstanceHandle::from(0));
        assert!(registry.get(id).unwrap().is_empty());
    }

    #[test]
    fn concurrent_first_use() {
        let registry = Arc::new(Registry::default());
        let threads = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    (0..4).map(|_| registry.create_instance().unwrap()).collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();
        let ids = threads
            .into_iter()
            .flat_map(|thread| thread.join().unwrap())
            .map(InstanceHandle::into_inner)
            .collect::<BTreeSet<_>>();
        assert_eq!(ids, (0..32).collect::<BTreeSet<_>>());
        assert_eq!(registry.len(), 32);
    }

    #[test]
    fn instance_limit() {
        let registry = Registry::new(Config::new().with_max_instances(2));
        registry.create_instance().unwrap();
        registry.create_instance().unwrap();
        assert!(matches!(registry.create_instance(), Err(Error::InstanceLimitExceeded(2))));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn instance_capacity_from_config() {
        let registry = Registry::new(Config::new().with_max_items(3));
        let list = registry.get(registry.create_instance().unwrap()).unwrap();
        assert_eq!(list.capacity(), 3);
    }

    #[test]
    fn purge_everywhere() {
        let registry = Registry::default();
        let lists = (0..4)
            .map(|_| registry.get(registry.create_instance().unwrap()).unwrap())
            .collect::<Vec<_>>();
        for list in &lists[..3] {
            list.add(9, Events::readable()).unwrap();
            list.add(10, Events::writable()).unwrap();
        }
        lists[3].add(10, Events::readable()).unwrap();

        assert_eq!(registry.purge_descriptor_everywhere(9), 3);
        for list in &lists {
            assert!(!list.contains(9));
            assert!(list.contains(10));
        }
        assert_eq!(registry.purge_descriptor_everywhere(9), 0);
    }

    #[test]
    fn global_is_shared() {
        assert!(Arc::ptr_eq(&Registry::global(), &Registry::global()));
    }
}
