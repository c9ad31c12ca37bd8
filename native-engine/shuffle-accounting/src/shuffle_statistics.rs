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

//! Reduces the `MapStatus`es of a single shuffle into one
//! `ShuffleSizeVector`.

use crate::map_status::MapStatus;
use crate::types::ShuffleSizeVector;

pub struct ShuffleStatistics;

impl ShuffleStatistics {
    /// Sums `get_size(j)` across all given statuses for each pre-shuffle
    /// id `j` in `0..n`. Statuses are summed in ascending `map_id` order
    /// so the result is bit-exact across executions regardless of the
    /// order they were collected in.
    pub fn total(statuses: &[MapStatus], n: usize) -> ShuffleSizeVector {
        let mut ordered: Vec<&MapStatus> = statuses.iter().collect();
        ordered.sort_by_key(|s| s.map_id());

        let mut totals = vec![0u64; n];
        for status in ordered {
            for (j, total) in totals.iter_mut().enumerate() {
                *total = total.saturating_add(status.get_size(j));
            }
        }
        ShuffleSizeVector::new(totals)
    }
}
