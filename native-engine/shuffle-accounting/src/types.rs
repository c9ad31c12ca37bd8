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

use std::ops::{Index, Range};

/// Per-partition total byte size for a single shuffle, derived by
/// summing `MapStatus::get_size` across every map task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleSizeVector(Vec<u64>);

impl ShuffleSizeVector {
    pub fn new(totals: Vec<u64>) -> Self {
        Self(totals)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    pub fn sum(&self) -> u128 {
        self.0.iter().map(|&v| v as u128).sum()
    }
}

impl Index<usize> for ShuffleSizeVector {
    type Output = u64;
    fn index(&self, i: usize) -> &u64 {
        &self.0[i]
    }
}

/// Ordered start indices defining contiguous post-shuffle partition
/// ranges over a pre-shuffle id space of size N.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostShufflePlan {
    starts: Vec<usize>,
}

impl PostShufflePlan {
    pub fn new(starts: Vec<usize>) -> Self {
        debug_assert!(!starts.is_empty(), "a plan always has at least one partition");
        debug_assert_eq!(starts[0], 0, "a plan always starts at pre-shuffle id 0");
        debug_assert!(
            starts.windows(2).all(|w| w[0] < w[1]),
            "start indices must be strictly increasing"
        );
        Self { starts }
    }

    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    pub fn num_partitions(&self) -> usize {
        self.starts.len()
    }

    /// The pre-shuffle id range covered by post-shuffle partition
    /// `partition`, given the total pre-shuffle count `n`.
    pub fn range(&self, partition: usize, n: usize) -> Range<usize> {
        let start = self.starts[partition];
        let end = self.starts.get(partition + 1).copied().unwrap_or(n);
        start..end
    }
}
