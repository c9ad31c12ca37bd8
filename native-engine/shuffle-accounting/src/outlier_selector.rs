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

//! Stateless policy deciding which blocks a `HighlyCompressedStatus`
//! stores exactly, kept independent of `MapStatus` so it is unit
//! testable on its own.
//!
//! Resolves the spec's one open ordering question explicitly: the
//! accurate-threshold rule dominates. A block at or above
//! `accurate_block_threshold` is always stored exactly; the skew rule
//! only ever promotes *additional* blocks that are below that
//! threshold but large relative to the average.
//!
//! The outlier cap applies only to those skew-only blocks. Accurate
//! blocks are never capped -- falling one back to `avg_size` would
//! underestimate it, which callers depending on "never underestimated"
//! (e.g. skew-join packing) cannot tolerate.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::bitset::EmptyBlockSet;
use crate::config::CoordinatorConfig;
use crate::size_codec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlierSize {
    /// Stored losslessly -- required for blocks at or above
    /// `accurate_block_threshold`, since later logic must never
    /// underestimate them.
    Exact(u64),
    /// Stored via the one-byte codec -- used for skew-only outliers
    /// below the accurate threshold.
    Approx(u8),
}

impl OutlierSize {
    pub fn get(&self) -> u64 {
        match self {
            OutlierSize::Exact(v) => *v,
            OutlierSize::Approx(b) => size_codec::decompress(*b),
        }
    }
}

pub struct OutlierSelection {
    pub avg_size: u64,
    pub empty_blocks: EmptyBlockSet,
    /// Pre-shuffle index -> stored size, for every retained outlier.
    pub outliers: BTreeMap<u32, OutlierSize>,
}

pub struct OutlierSelector;

impl OutlierSelector {
    /// Applies steps 1-7 of the `HighlyCompressedStatus` construction
    /// algorithm to a raw per-block size vector.
    pub fn select(sizes: &[u64], config: &CoordinatorConfig) -> OutlierSelection {
        let n = sizes.len();

        let empty_indices: Vec<u32> = sizes
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s == 0)
            .map(|(i, _)| i as u32)
            .collect();
        let num_empty = empty_indices.len();
        let empty_blocks = EmptyBlockSet::from_indices(empty_indices, n);

        // average over ALL non-empty blocks (outliers included), used
        // only to derive the skew threshold -- see step 2/3 of the spec.
        let sum_nonempty: u128 = sizes.iter().filter(|&&s| s > 0).map(|&s| s as u128).sum();
        let nonempty_count = n - num_empty;
        let avg_nonempty = (sum_nonempty / (nonempty_count.max(1) as u128)) as u64;

        // the accurate set is never capped: dropping one of these would
        // fall it back to `avg_size`, underestimating it, which the
        // spec's invariant (get_size(i) >= sizes[i] for accurate blocks)
        // forbids outright. Only skew-only blocks -- smaller than the
        // accurate threshold -- are subject to the cap.
        let accurate: BTreeSet<usize> = sizes
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s >= config.accurate_block_threshold)
            .map(|(i, _)| i)
            .collect();
        let skew_threshold = config.skew_factor * avg_nonempty as f64;
        let skew_candidate: BTreeSet<usize> = sizes
            .iter()
            .enumerate()
            .filter(|&(i, &s)| !accurate.contains(&i) && s > 0 && (s as f64) > skew_threshold)
            .map(|(i, _)| i)
            .collect();

        let cap = config.outlier_cap(n);
        let skew_final: BTreeSet<usize> = if skew_candidate.len() > cap {
            // retain the largest-by-size members; ties broken by
            // ascending index for determinism.
            let mut ranked: Vec<usize> = skew_candidate.into_iter().collect();
            ranked.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]).then(a.cmp(&b)));
            ranked.truncate(cap);
            ranked.into_iter().collect()
        } else {
            skew_candidate
        };
        let final_outliers: BTreeSet<usize> = accurate.into_iter().chain(skew_final).collect();

        // re-derive avgSize from exactly the blocks it will apply to:
        // non-empty, non-outlier indices (spec invariant: "avgSize
        // equals the truncated mean of original sizes over {i: v[i]>0
        // and i not in outliers}").
        let mut sum_remaining: u128 = 0;
        let mut count_remaining: u64 = 0;
        for (i, &s) in sizes.iter().enumerate() {
            if s > 0 && !final_outliers.contains(&i) {
                sum_remaining += s as u128;
                count_remaining += 1;
            }
        }
        let avg_size = if count_remaining > 0 {
            (sum_remaining / count_remaining as u128) as u64
        } else {
            0
        };

        let mut outliers = BTreeMap::new();
        for i in final_outliers {
            let size = sizes[i];
            let stored = if size >= config.accurate_block_threshold {
                OutlierSize::Exact(size)
            } else {
                OutlierSize::Approx(size_codec::compress(size))
            };
            outliers.insert(i as u32, stored);
        }

        OutlierSelection {
            avg_size,
            empty_blocks,
            outliers,
        }
    }
}
