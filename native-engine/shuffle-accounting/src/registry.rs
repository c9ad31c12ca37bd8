// Copyright 2022 The Blaze Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Driver-side registry realizing the `Registered` / `Read` /
//! `Unregistered` states of the `MapStatus` lifecycle (spec section on
//! state machines). Writers take an exclusive lock only for the
//! duration of the registration/unregistration mutation; readers take
//! a shared lock and clone a snapshot out, so lookups never block on
//! each other.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{Result, ShuffleAccountingError};
use crate::map_status::{MapId, MapStatus};

pub type ShuffleId = u64;

#[derive(Default)]
pub struct ShuffleStatusRegistry {
    inner: RwLock<HashMap<ShuffleId, Vec<MapStatus>>>,
}

impl ShuffleStatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, shuffle_id: ShuffleId, statuses: Vec<MapStatus>) {
        log::debug!("registering {} map statuses for shuffle {shuffle_id}", statuses.len());
        self.inner.write().insert(shuffle_id, statuses);
    }

    pub fn unregister(&self, shuffle_id: ShuffleId) -> Option<Vec<MapStatus>> {
        log::debug!("unregistering shuffle {shuffle_id}");
        self.inner.write().remove(&shuffle_id)
    }

    /// Snapshot of every status registered for `shuffle_id`.
    pub fn statuses(&self, shuffle_id: ShuffleId) -> Result<Vec<MapStatus>> {
        self.inner
            .read()
            .get(&shuffle_id)
            .cloned()
            .ok_or(ShuffleAccountingError::UnknownShuffle(shuffle_id))
    }

    pub fn status_for_map(&self, shuffle_id: ShuffleId, map_id: MapId) -> Result<MapStatus> {
        let guard = self.inner.read();
        let statuses = guard
            .get(&shuffle_id)
            .ok_or(ShuffleAccountingError::UnknownShuffle(shuffle_id))?;
        statuses
            .iter()
            .find(|s| s.map_id() == map_id)
            .cloned()
            .ok_or(ShuffleAccountingError::UnknownMap { shuffle_id, map_id })
    }

    pub fn is_registered(&self, shuffle_id: ShuffleId) -> bool {
        self.inner.read().contains_key(&shuffle_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::map_status::LocationId;

    fn status(map_id: MapId) -> MapStatus {
        MapStatus::new(LocationId::new("host:1"), map_id, &[1, 2, 3], &CoordinatorConfig::default())
    }

    #[test]
    fn register_then_read_then_unregister() {
        let registry = ShuffleStatusRegistry::new();
        registry.register(1, vec![status(0), status(1)]);
        assert!(registry.is_registered(1));
        assert_eq!(registry.statuses(1).unwrap().len(), 2);
        assert!(registry.status_for_map(1, 1).is_ok());

        let removed = registry.unregister(1).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!registry.is_registered(1));
    }

    #[test]
    fn unknown_shuffle_is_an_error() {
        let registry = ShuffleStatusRegistry::new();
        assert!(matches!(
            registry.statuses(99),
            Err(ShuffleAccountingError::UnknownShuffle(99))
        ));
    }

    #[test]
    fn unknown_map_is_an_error() {
        let registry = ShuffleStatusRegistry::new();
        registry.register(1, vec![status(0)]);
        assert!(matches!(
            registry.status_for_map(1, 42),
            Err(ShuffleAccountingError::UnknownMap { shuffle_id: 1, map_id: 42 })
        ));
    }
}
